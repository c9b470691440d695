//! Video change detection.
//!
//! The player page navigates between videos without reloading, so the
//! watcher compares each reported location with the last video id it
//! saw. On a change it waits for the page to show a title, then syncs
//! the video info into that video's memo group.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::error::StoreError;
use crate::ports::kv_store::KeyValueStore;
use crate::ports::messaging::{MessageChannel, VideoInfo};
use crate::usecases::memo_book::MemoBook;
use crate::usecases::signal::{WaitOptions, wait_for};

/// Video id from a watch URL (`...?v=<id>`), if it has one.
pub fn video_id_from_url(url: &str) -> Option<&str> {
  let query = url.split_once('?')?.1;
  let query = query.split('#').next().unwrap_or(query);
  query
    .split('&')
    .filter_map(|pair| pair.split_once('='))
    .find(|(name, _)| *name == "v")
    .map(|(_, id)| id)
    .filter(|id| !id.is_empty())
}

/// Last video seen on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSession {
  /// Id of the most recently reported video.
  pub last_video_id: Option<String>,
}

impl WatchSession {
  /// Record a location. Returns the video id only when it changed.
  pub fn on_location(&mut self, url: &str) -> Option<String> {
    let id = video_id_from_url(url)?;
    if self.last_video_id.as_deref() == Some(id) {
      return None;
    }
    self.last_video_id = Some(id.to_string());
    Some(id.to_string())
  }
}

/// Keeps memo group metadata in step with what the page is playing.
pub struct VideoWatcher<S: KeyValueStore, C: MessageChannel> {
  book: Arc<MemoBook<S, C>>,
  session: WatchSession,
  wait: WaitOptions,
}

impl<S: KeyValueStore, C: MessageChannel> VideoWatcher<S, C> {
  /// Create a watcher with a fresh session.
  pub fn new(book: Arc<MemoBook<S, C>>, wait: WaitOptions) -> Self {
    Self {
      book,
      session: WatchSession::default(),
      wait,
    }
  }

  /// Current session state.
  pub const fn session(&self) -> &WatchSession {
    &self.session
  }

  /// Handle a location report from the page.
  ///
  /// Returns the synced video info on a video change, `None` when the
  /// video did not change or its title never appeared.
  #[instrument(skip(self))]
  pub async fn on_location(&mut self, url: &str) -> Result<Option<VideoInfo>, StoreError> {
    let Some(video_id) = self.session.on_location(url) else {
      return Ok(None);
    };

    let book: &MemoBook<S, C> = &self.book;
    let Some(info) = wait_for(move || book.fetch_video_info(), self.wait).await else {
      warn!(video_id = %video_id, "Video title did not appear");
      return Ok(None);
    };

    let synced = self.book.sync_video_info(&video_id, &info).await?;
    info!(video_id = %video_id, title = %info.title, synced, "Video changed");
    Ok(Some(info))
  }
}
