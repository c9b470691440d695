//! Configuration Module - TOML-based Store Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! Retention caps, retry policy and wait timings are externalized
//! here - nothing is hardcoded in the use-case layer.

pub mod loader;

use serde::Deserialize;

/// Top-level configuration.
///
/// Every section has defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Record store behaviour and location.
  #[serde(default)]
  pub store: StoreConfig,
  /// Cross-context retry policy.
  #[serde(default)]
  pub retry: RetryConfig,
  /// Signal wait timings.
  #[serde(default)]
  pub signal: SignalConfig,
  /// Snapshot export settings.
  #[serde(default)]
  pub export: ExportConfig,
  /// Logging output.
  #[serde(default)]
  pub logging: LoggingConfig,
}

/// Record store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
  /// JSON file backing the key-value store.
  #[serde(default = "default_data_file")]
  pub data_file: String,
  /// Price history cap per group (e.g. 30). Absent = unbounded. Memo
  /// groups are never capped.
  #[serde(default)]
  pub retention_cap: Option<usize>,
  /// Serialize appends per key (closes the last-write-wins race).
  #[serde(default = "default_true")]
  pub serialize_appends: bool,
}

/// Retry policy for cross-context requests.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
  /// Total attempts including the first.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  /// Delay after a failed attempt (milliseconds).
  #[serde(default = "default_delay_ms")]
  pub delay_ms: u64,
  /// Reload the receiving context before retrying.
  #[serde(default = "default_true")]
  pub reload_before_retry: bool,
  /// Wait after a reload before retrying (milliseconds).
  #[serde(default = "default_delay_ms")]
  pub reload_settle_ms: u64,
}

/// Poll-until-signal timings.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
  /// Give up after this long (milliseconds).
  #[serde(default = "default_signal_timeout_ms")]
  pub timeout_ms: u64,
  /// Poll interval (milliseconds).
  #[serde(default = "default_delay_ms")]
  pub interval_ms: u64,
}

/// Snapshot export configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
  /// Directory export files are written to.
  #[serde(default = "default_export_dir")]
  pub dir: String,
  /// File name prefix, e.g. `price-history` or `youtube-memos`.
  #[serde(default = "default_subject")]
  pub subject: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Emit JSON lines instead of human-readable output.
  #[serde(default = "default_true")]
  pub json: bool,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      data_file: default_data_file(),
      retention_cap: None,
      serialize_appends: true,
    }
  }
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: default_max_attempts(),
      delay_ms: default_delay_ms(),
      reload_before_retry: true,
      reload_settle_ms: default_delay_ms(),
    }
  }
}

impl Default for SignalConfig {
  fn default() -> Self {
    Self {
      timeout_ms: default_signal_timeout_ms(),
      interval_ms: default_delay_ms(),
    }
  }
}

impl Default for ExportConfig {
  fn default() -> Self {
    Self {
      dir: default_export_dir(),
      subject: default_subject(),
    }
  }
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      json: true,
    }
  }
}

// Default value functions for serde

fn default_data_file() -> String {
  "data/records.json".to_string()
}

fn default_true() -> bool {
  true
}

fn default_max_attempts() -> u32 {
  3
}

fn default_delay_ms() -> u64 {
  1_000
}

fn default_signal_timeout_ms() -> u64 {
  10_000
}

fn default_export_dir() -> String {
  "exports".to_string()
}

fn default_subject() -> String {
  "records".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}
