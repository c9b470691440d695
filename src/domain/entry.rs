//! Entry types — single dated observations.
//!
//! An entry is either a price point (exact decimal) or a text memo.
//! Two entries are duplicates when both their timestamp and their
//! content are equal; identical timestamps with different content are
//! distinct observations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a tracked subject (product URL or video id).
pub type GroupKey = String;

/// Observed value carried by an entry.
///
/// Flattened into the entry on the wire, so a price point reads
/// `{"timestamp": .., "price": ..}` and a memo `{"timestamp": .., "text": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryValue {
    /// Numeric observation (a scraped price).
    Price(Decimal),
    /// Free-text observation (a memo).
    Text(String),
}

/// One timestamped observation inside a record group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Stable identifier (memos only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// When the observation was made.
    pub timestamp: DateTime<Utc>,
    /// What was observed.
    #[serde(flatten)]
    pub value: EntryValue,
    /// Media playback position in seconds the memo refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_secs: Option<f64>,
}

/// De-duplication identity: `(timestamp, content)`.
///
/// A memo's timestamp is its playback position, so memos that carry an
/// offset are identified by `(offset, text)` regardless of when or under
/// which id they were written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryIdentity {
    position: IdentityPosition,
    content: IdentityContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityPosition {
    At(DateTime<Utc>),
    /// `f64` bits of the playback offset (`-0.0` folded into `0.0`).
    Offset(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityContent {
    Price(Decimal),
    Text(String),
}

impl Entry {
    /// A price point observed at `timestamp`. Identity is implicit.
    pub fn price(amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            timestamp,
            value: EntryValue::Price(amount),
            offset_secs: None,
        }
    }

    /// A memo with a freshly generated id.
    pub fn memo(text: impl Into<String>, timestamp: DateTime<Utc>, offset_secs: Option<f64>) -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            timestamp,
            value: EntryValue::Text(text.into()),
            offset_secs,
        }
    }

    /// Identity used by merge de-duplication.
    ///
    /// Prices are normalized so `100` and `100.00` compare equal.
    pub fn identity(&self) -> EntryIdentity {
        let (position, content) = match &self.value {
            EntryValue::Price(amount) => (
                IdentityPosition::At(self.timestamp),
                IdentityContent::Price(amount.normalize()),
            ),
            EntryValue::Text(text) => {
                let position = match self.offset_secs {
                    Some(offset) => IdentityPosition::Offset((offset + 0.0).to_bits()),
                    None => IdentityPosition::At(self.timestamp),
                };
                (position, IdentityContent::Text(text.clone()))
            }
        };
        EntryIdentity { position, content }
    }

    /// Numeric value, if this is a price point.
    pub fn amount(&self) -> Option<Decimal> {
        match self.value {
            EntryValue::Price(amount) => Some(amount),
            EntryValue::Text(_) => None,
        }
    }

    /// Text content, if this is a memo.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            EntryValue::Text(text) => Some(text),
            EntryValue::Price(_) => None,
        }
    }
}
