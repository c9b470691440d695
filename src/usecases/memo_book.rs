//! Memo Book Use Case - Timestamped Notes per Video
//!
//! Memos are text entries keyed by video id. Each memo remembers the
//! playback position it was written at, so the list can be shown in
//! playback order and clicking one seeks the player back to it.
//!
//! Video metadata (title, channel, url) lives on the group and is
//! refreshed whenever the page reports it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::domain::entry::{Entry, EntryValue};
use crate::domain::error::StoreError;
use crate::domain::group::{GroupMeta, RecordGroup, Retention};
use crate::ports::kv_store::KeyValueStore;
use crate::ports::messaging::{MessageChannel, Request, Response, VideoInfo};
use crate::usecases::record_store::RecordStore;
use crate::usecases::retry::{RetryPolicy, send_with_retry};

/// Title used when the page could not report one.
pub const UNTITLED: &str = "Untitled";

/// Memo operations over a record store and the player page.
pub struct MemoBook<S: KeyValueStore, C: MessageChannel> {
  store: Arc<RecordStore<S>>,
  channel: Arc<C>,
  retry: RetryPolicy,
}

impl<S: KeyValueStore, C: MessageChannel> MemoBook<S, C> {
  /// Create a memo book over `store`, talking to the player via `channel`.
  pub fn new(store: Arc<RecordStore<S>>, channel: Arc<C>, retry: RetryPolicy) -> Self {
    Self { store, channel, retry }
  }

  /// Add a memo at the current playback position.
  ///
  /// Blank text is rejected before the player is asked anything.
  /// Missing video info does not block the memo; the group is titled
  /// `Untitled` until a later sync.
  #[instrument(skip(self, text))]
  pub async fn add(&self, video_id: &str, text: &str) -> Result<Entry, StoreError> {
    let text = non_blank(text)?;

    let current_time = match self.request(&Request::GetTime).await? {
      Response::Time { current_time } => current_time,
      other => return Err(unexpected("getTime", &other)),
    };
    let info = self.fetch_video_info().await;

    let entry = Entry::memo(text, Utc::now(), Some(current_time));
    let stored = entry.clone();
    let group = self
      .store
      .update(video_id, move |group| {
        match info {
          Some(info) => group.meta.refresh_from(&meta_of(&info)),
          None => group.meta.fill_gaps(&GroupMeta {
            title: Some(UNTITLED.to_string()),
            ..GroupMeta::default()
          }),
        }
        group.push(stored, Retention::Unbounded);
        Ok(true)
      })
      .await?;

    info!(
      video_id = %video_id,
      offset_secs = current_time,
      memos = group.len(),
      "Memo added"
    );
    Ok(entry)
  }

  /// Replace a memo's text.
  ///
  /// # Errors
  /// `InvalidInput` if the text is blank or no memo has `memo_id`.
  #[instrument(skip(self, text))]
  pub async fn edit(&self, video_id: &str, memo_id: &str, text: &str) -> Result<Entry, StoreError> {
    let text = non_blank(text)?.to_string();

    let group = self
      .store
      .update(video_id, |group| {
        let memo = group
          .entries
          .iter_mut()
          .find(|e| e.id.as_deref() == Some(memo_id))
          .ok_or_else(|| StoreError::InvalidInput(format!("no memo {memo_id} for video {video_id}")))?;
        memo.value = EntryValue::Text(text);
        Ok(true)
      })
      .await?;

    debug!(video_id = %video_id, memo_id = %memo_id, "Memo edited");
    group
      .entries
      .into_iter()
      .find(|e| e.id.as_deref() == Some(memo_id))
      .ok_or_else(|| StoreError::InvalidInput(format!("memo {memo_id} vanished during edit")))
  }

  /// Delete a memo. Deleting the last memo removes the video's group.
  ///
  /// Returns whether a memo was removed.
  #[instrument(skip(self))]
  pub async fn delete(&self, video_id: &str, memo_id: &str) -> Result<bool, StoreError> {
    let mut removed = false;
    let group = self
      .store
      .update(video_id, |group| {
        let before = group.len();
        group.entries.retain(|e| e.id.as_deref() != Some(memo_id));
        removed = group.len() != before;
        Ok(removed)
      })
      .await?;

    if removed && group.is_empty() {
      self.store.remove(video_id).await?;
    }
    Ok(removed)
  }

  /// Refresh the stored video metadata.
  ///
  /// Videos without memos are not written; returns whether a group was
  /// updated.
  #[instrument(skip(self, info), fields(title = %info.title))]
  pub async fn sync_video_info(&self, video_id: &str, info: &VideoInfo) -> Result<bool, StoreError> {
    let meta = meta_of(info);
    let mut synced = false;
    self
      .store
      .update(video_id, |group| {
        if group.is_empty() {
          return Ok(false);
        }
        group.meta.refresh_from(&meta);
        synced = true;
        Ok(true)
      })
      .await?;

    if synced {
      debug!(video_id = %video_id, "Video info synced");
    }
    Ok(synced)
  }

  /// Memos for a video, in playback order.
  pub async fn memos(&self, video_id: &str) -> Result<Vec<Entry>, StoreError> {
    let mut memos: Vec<Entry> = self
      .store
      .get(video_id)
      .await?
      .entries
      .into_iter()
      .filter(|e| e.text().is_some())
      .collect();
    memos.sort_by(|a, b| {
      a.offset_secs
        .unwrap_or_default()
        .total_cmp(&b.offset_secs.unwrap_or_default())
    });
    Ok(memos)
  }

  /// Video group with its metadata.
  pub async fn group(&self, video_id: &str) -> Result<RecordGroup, StoreError> {
    self.store.get(video_id).await
  }

  /// Seek the player to `offset_secs`.
  pub async fn seek(&self, offset_secs: f64) -> Result<(), StoreError> {
    match self.request(&Request::SeekTo { time: offset_secs }).await? {
      Response::Failure { error } => Err(StoreError::Channel(error)),
      _ => Ok(()),
    }
  }

  /// Ask the page for video info once. Empty titles count as unavailable.
  pub async fn fetch_video_info(&self) -> Option<VideoInfo> {
    match send_with_retry(self.channel.as_ref(), &Request::GetVideoInfo, &RetryPolicy::once()).await {
      Ok(Response::VideoInfo(info)) if !info.title.trim().is_empty() => Some(info),
      Ok(other) => {
        debug!(response = ?other, "Video info not available yet");
        None
      }
      Err(e) => {
        warn!(error = %e, "Video info request failed");
        None
      }
    }
  }

  /// Handle a request pushed by the page.
  ///
  /// Only `updateVideoInfo` is addressed to the memo book.
  pub async fn handle(&self, request: Request) -> Result<Response, StoreError> {
    match request {
      Request::UpdateVideoInfo { video_id, info } => {
        self.sync_video_info(&video_id, &info).await?;
        Ok(Response::Ack)
      }
      other => Err(StoreError::InvalidInput(format!("memo book does not handle {other:?}"))),
    }
  }

  async fn request(&self, request: &Request) -> Result<Response, StoreError> {
    send_with_retry(self.channel.as_ref(), request, &self.retry)
      .await
      .map_err(|e| StoreError::Channel(format!("{e:#}")))
  }
}

/// Group metadata carried by a video info report.
fn meta_of(info: &VideoInfo) -> GroupMeta {
  let present = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
  GroupMeta {
    title: present(&info.title),
    channel: present(&info.channel),
    url: present(&info.url),
    lowest: None,
  }
}

fn non_blank(text: &str) -> Result<&str, StoreError> {
  let text = text.trim();
  if text.is_empty() {
    return Err(StoreError::InvalidInput("memo text is empty".into()));
  }
  Ok(text)
}

fn unexpected(action: &str, response: &Response) -> StoreError {
  StoreError::Channel(format!("unexpected reply to {action}: {response:?}"))
}
