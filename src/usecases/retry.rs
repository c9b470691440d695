//! Retry Policy - Bounded Retries for Cross-Context Requests
//!
//! A request to another context can fail because nothing is listening
//! yet (the page script has not loaded). Callers retry a bounded number
//! of times, optionally reloading the receiver in between. The record
//! store never retries; only the messaging layer does.

use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::ports::messaging::{MessageChannel, Request, Response};

/// How often and how patiently to retry a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Total attempts including the first.
  pub max_attempts: u32,
  /// Wait after each failed attempt.
  pub delay: Duration,
  /// Reload the receiving context before the next attempt.
  pub reload_before_retry: bool,
  /// Wait after a reload so the receiver can register.
  pub reload_settle: Duration,
}

impl RetryPolicy {
  /// Single attempt, no waiting.
  pub const fn once() -> Self {
    Self {
      max_attempts: 1,
      delay: Duration::ZERO,
      reload_before_retry: false,
      reload_settle: Duration::ZERO,
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      delay: Duration::from_secs(1),
      reload_before_retry: true,
      reload_settle: Duration::from_secs(1),
    }
  }
}

impl From<&RetryConfig> for RetryPolicy {
  fn from(config: &RetryConfig) -> Self {
    Self {
      max_attempts: config.max_attempts.max(1),
      delay: Duration::from_millis(config.delay_ms),
      reload_before_retry: config.reload_before_retry,
      reload_settle: Duration::from_millis(config.reload_settle_ms),
    }
  }
}

/// Send `request`, retrying transport failures per `policy`.
///
/// A `Response::Failure` is a real answer and is returned as-is; only
/// transport errors (no receiver) are retried. Reload failures are
/// logged and do not abort the retry loop.
///
/// # Errors
/// The last transport error once every attempt has failed.
pub async fn send_with_retry<C>(channel: &C, request: &Request, policy: &RetryPolicy) -> Result<Response>
where
  C: MessageChannel + ?Sized,
{
  let attempts = policy.max_attempts.max(1);
  let mut last_error = None;

  for attempt in 1..=attempts {
    if attempt > 1 {
      tokio::time::sleep(policy.delay).await;

      if policy.reload_before_retry {
        match channel.reload().await {
          Ok(()) => debug!(attempt, "Receiver reloaded"),
          Err(e) => warn!(attempt, error = %e, "Receiver reload failed"),
        }
        tokio::time::sleep(policy.reload_settle).await;
      }
    }

    match channel.send(request).await {
      Ok(response) => {
        if attempt > 1 {
          debug!(attempt, ?request, "Request succeeded after retry");
        }
        return Ok(response);
      }
      Err(e) => {
        warn!(attempt, max_attempts = attempts, ?request, error = %e, "Request failed");
        last_error = Some(e);
      }
    }
  }

  match last_error {
    Some(e) => Err(e.context(format!("no response after {attempts} attempts"))),
    None => bail!("no attempts were made"),
  }
}
