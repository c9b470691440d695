//! Messaging Port - Cross-Context Request/Response Interface
//!
//! Popup and page contexts talk through single request/response round
//! trips. Requests form a closed set tagged by `action` and are decoded
//! once at the boundary; the transport itself never retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error::StoreError;

/// Video metadata reported by the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
  /// Video title (empty while the page is still loading).
  pub title: String,
  /// Channel name.
  #[serde(default)]
  pub channel: String,
  /// Canonical watch URL.
  #[serde(default)]
  pub url: String,
}

/// Price as scraped from a product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceReading {
  /// Display text, e.g. `"12,345원"`.
  pub price_text: String,
  /// Product title.
  pub product_title: String,
  /// Product page URL (the group key).
  pub product_url: String,
}

/// Every action one context can ask of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
  /// Scrape the current product price.
  GetPrices,
  /// Current media playback position.
  GetTime,
  /// Seek the media element to `time` seconds.
  SeekTo {
    /// Target position in seconds.
    time: f64,
  },
  /// Title/channel/url of the current video.
  GetVideoInfo,
  /// Page noticed a new video and reports its metadata.
  #[serde(rename_all = "camelCase")]
  UpdateVideoInfo {
    /// Video whose memo group should be refreshed.
    video_id: String,
    /// Fresh metadata.
    info: VideoInfo,
  },
}

impl Request {
  /// Decode an untyped payload into a request.
  pub fn decode(payload: &Value) -> Result<Self, StoreError> {
    serde_json::from_value(payload.clone())
      .map_err(|e| StoreError::InvalidInput(format!("unrecognized request: {e}")))
  }
}

/// Replies, one shape per request kind plus a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Response {
  /// Reply to `GetPrices`.
  Prices(PriceReading),
  /// Reply to `GetTime`.
  #[serde(rename_all = "camelCase")]
  Time {
    /// Playback position in seconds.
    current_time: f64,
  },
  /// Reply to `GetVideoInfo`.
  VideoInfo(VideoInfo),
  /// Request handled, nothing to report.
  Ack,
  /// The receiver ran but could not do what was asked.
  Failure {
    /// Receiver's explanation.
    error: String,
  },
}

/// Trait for the cross-context transport.
#[async_trait]
pub trait MessageChannel: Send + Sync + 'static {
  /// One request/response round trip. Errors mean no receiver answered.
  async fn send(&self, request: &Request) -> anyhow::Result<Response>;

  /// Reload the receiving context (used between retry attempts).
  async fn reload(&self) -> anyhow::Result<()>;
}
