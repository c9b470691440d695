//! Signal waiting: poll a check until it yields a value or time runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config::SignalConfig;

/// Poll timing for `wait_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
  /// Give up after this long.
  pub timeout: Duration,
  /// Delay between checks.
  pub interval: Duration,
}

impl Default for WaitOptions {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(10),
      interval: Duration::from_secs(1),
    }
  }
}

impl From<&SignalConfig> for WaitOptions {
  fn from(config: &SignalConfig) -> Self {
    Self {
      timeout: Duration::from_millis(config.timeout_ms),
      interval: Duration::from_millis(config.interval_ms),
    }
  }
}

/// Run `check` until it returns `Some`, at most until `options.timeout`.
///
/// The check always runs at least once. Timing out is not an error;
/// callers decide what a missing signal means.
pub async fn wait_for<T, F, Fut>(mut check: F, options: WaitOptions) -> Option<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Option<T>>,
{
  let deadline = Instant::now() + options.timeout;

  loop {
    if let Some(value) = check().await {
      return Some(value);
    }
    if Instant::now() + options.interval > deadline {
      debug!(timeout_ms = options.timeout.as_millis(), "Signal wait timed out");
      return None;
    }
    sleep(options.interval).await;
  }
}
