//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    data_file = %config.store.data_file,
    retention_cap = ?config.store.retention_cap,
    serialize_appends = config.store.serialize_appends,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-zero retention cap when one is set
/// - At least one retry attempt
/// - Poll interval no longer than the wait timeout
/// - Non-empty paths and export subject
fn validate_config(config: &AppConfig) -> Result<()> {
  // Store validation
  anyhow::ensure!(
    !config.store.data_file.trim().is_empty(),
    "store.data_file must not be empty"
  );
  if let Some(cap) = config.store.retention_cap {
    anyhow::ensure!(cap > 0, "store.retention_cap must be positive, got {}", cap);
  }

  // Retry validation
  anyhow::ensure!(
    config.retry.max_attempts >= 1,
    "retry.max_attempts must be at least 1, got {}",
    config.retry.max_attempts
  );

  // Signal validation
  anyhow::ensure!(
    config.signal.interval_ms > 0,
    "signal.interval_ms must be positive"
  );
  anyhow::ensure!(
    config.signal.interval_ms <= config.signal.timeout_ms,
    "signal.interval_ms ({}) must not exceed signal.timeout_ms ({})",
    config.signal.interval_ms,
    config.signal.timeout_ms
  );

  // Export validation
  anyhow::ensure!(
    !config.export.subject.trim().is_empty(),
    "export.subject must not be empty"
  );
  anyhow::ensure!(
    !config.export.subject.contains(['/', '\\']),
    "export.subject must not contain path separators"
  );

  Ok(())
}
