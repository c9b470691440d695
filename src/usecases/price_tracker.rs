//! Price Tracker Use Case - Scrape and Record Product Prices
//!
//! Asks the product page for its current price and appends it to the
//! product's history (keyed by URL). A page without a recognizable
//! price element is reported as `ScrapeTargetMissing` and nothing is
//! recorded.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::domain::entry::Entry;
use crate::domain::error::StoreError;
use crate::domain::group::{GroupMeta, RecordGroup};
use crate::domain::price::parse_price;
use crate::ports::kv_store::KeyValueStore;
use crate::ports::messaging::{MessageChannel, PriceReading, Request, Response};
use crate::usecases::record_store::RecordStore;
use crate::usecases::retry::{RetryPolicy, send_with_retry};

/// Result of one observation.
#[derive(Debug, Clone)]
pub struct Observation {
  /// Product URL the price was recorded under.
  pub url: String,
  /// What the page reported.
  pub reading: PriceReading,
  /// The product's history after the append.
  pub group: RecordGroup,
}

/// Records scraped prices into a record store.
pub struct PriceTracker<S: KeyValueStore, C: MessageChannel> {
  store: Arc<RecordStore<S>>,
  channel: Arc<C>,
  retry: RetryPolicy,
}

impl<S: KeyValueStore, C: MessageChannel> PriceTracker<S, C> {
  /// Create a tracker over `store`, talking to the page via `channel`.
  pub fn new(store: Arc<RecordStore<S>>, channel: Arc<C>, retry: RetryPolicy) -> Self {
    Self { store, channel, retry }
  }

  /// Scrape the current page and append its price.
  ///
  /// # Errors
  /// - `Channel` if the page never answered
  /// - `ScrapeTargetMissing` if it answered without a usable price
  /// - `InvalidInput` if it reported no product URL
  /// - `Storage` if the append failed
  #[instrument(skip(self))]
  pub async fn observe(&self) -> Result<Observation, StoreError> {
    let response = send_with_retry(self.channel.as_ref(), &Request::GetPrices, &self.retry)
      .await
      .map_err(|e| StoreError::Channel(format!("{e:#}")))?;

    let reading = match response {
      Response::Prices(reading) => reading,
      Response::Failure { error } => {
        warn!(error = %error, "Page reported no price");
        return Err(StoreError::ScrapeTargetMissing(error));
      }
      other => {
        return Err(StoreError::Channel(format!("unexpected reply to getPrices: {other:?}")));
      }
    };

    let Some(amount) = parse_price(&reading.price_text) else {
      return Err(StoreError::ScrapeTargetMissing(format!(
        "price text has no digits: {:?}",
        reading.price_text
      )));
    };
    let url = reading.product_url.trim().to_string();
    if url.is_empty() {
      return Err(StoreError::InvalidInput("page reported an empty product URL".into()));
    }

    let meta = GroupMeta {
      title: Some(reading.product_title.clone()).filter(|t| !t.trim().is_empty()),
      url: Some(url.clone()),
      ..GroupMeta::default()
    };
    let group = self
      .store
      .append_observed(&url, Entry::price(amount, Utc::now()), &meta)
      .await?;

    info!(
      url = %url,
      price = %amount,
      lowest = ?group.lowest(),
      entries = group.len(),
      "Price recorded"
    );
    Ok(Observation { url, reading, group })
  }

  /// Stored history for `url`.
  pub async fn history(&self, url: &str) -> Result<RecordGroup, StoreError> {
    self.store.get(url).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use anyhow::Result;
  use async_trait::async_trait;
  use rust_decimal_macros::dec;

  use crate::adapters::persistence::MemoryKvStore;
  use crate::domain::group::Retention;
  use crate::usecases::record_store::StoreOptions;

  struct FixedPage(Response);

  #[async_trait]
  impl MessageChannel for FixedPage {
    async fn send(&self, _request: &Request) -> Result<Response> {
      Ok(self.0.clone())
    }

    async fn reload(&self) -> Result<()> {
      Ok(())
    }
  }

  fn tracker(page: Response) -> PriceTracker<MemoryKvStore, FixedPage> {
    let store = RecordStore::new(
      Arc::new(MemoryKvStore::new()),
      StoreOptions {
        retention: Retention::Capped(30),
        serialize_appends: true,
      },
    );
    PriceTracker::new(Arc::new(store), Arc::new(FixedPage(page)), RetryPolicy::once())
  }

  fn reading(text: &str) -> Response {
    Response::Prices(PriceReading {
      price_text: text.into(),
      product_title: "Electric kettle".into(),
      product_url: "https://shop.example/p/1".into(),
    })
  }

  #[tokio::test]
  async fn test_observe_records_price_and_title() {
    let tracker = tracker(reading("12,345원"));
    let observation = tracker.observe().await.unwrap();

    assert_eq!(observation.group.lowest(), Some(dec!(12345)));
    let history = tracker.history("https://shop.example/p/1").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.meta.title.as_deref(), Some("Electric kettle"));
  }

  #[tokio::test]
  async fn test_failure_reply_is_scrape_target_missing() {
    let tracker = tracker(Response::Failure {
      error: "price element not found".into(),
    });
    let err = tracker.observe().await.unwrap_err();
    assert!(matches!(err, StoreError::ScrapeTargetMissing(_)));
  }

  #[tokio::test]
  async fn test_digitless_price_records_nothing() {
    let tracker = tracker(reading("품절"));
    assert!(matches!(
      tracker.observe().await.unwrap_err(),
      StoreError::ScrapeTargetMissing(_)
    ));
    assert!(tracker.history("https://shop.example/p/1").await.unwrap().is_empty());
  }
}
