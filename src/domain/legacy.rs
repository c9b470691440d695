//! Legacy layouts — decoding older persisted and exported shapes.
//!
//! Three shapes predate the current `{entries, ..meta}` group:
//! - flat price history: `{title, prices: [{price, timestamp}], lowestPrice}`
//!   stored under the product URL
//! - memo list: `[{id, text, timestamp: seconds, videoInfo}]` stored under
//!   the video id (also the `memos` container of v1 exports)
//! - enveloped price history: one `priceHistory` key holding
//!   `[{price, timestamp, productTitle, productUrl}]` for every product
//!
//! Every decoder here is pure; `RecordStore::migrate_legacy` does the I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::entry::{Entry, EntryValue, GroupKey};
use super::error::StoreError;
use super::group::{GroupMeta, RecordGroup};

/// Store key under which the enveloped price history lives.
pub const ENVELOPE_KEY: &str = "priceHistory";

/// Which persisted shape a stored value has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `{entries: [..], ..meta}`.
    Current,
    /// `{title, prices, lowestPrice}`.
    FlatPrice,
    /// `[{id, text, timestamp, videoInfo}]`.
    MemoList,
    /// Anything else.
    Unknown,
}

/// Classify a stored value without decoding it.
pub fn classify(value: &Value) -> Layout {
    match value {
        Value::Object(map) if map.contains_key("entries") => Layout::Current,
        Value::Object(map) if map.contains_key("prices") => Layout::FlatPrice,
        Value::Array(_) => Layout::MemoList,
        _ => Layout::Unknown,
    }
}

/// Decode a stored or exported group value in any supported layout.
pub fn decode_group(value: &Value) -> Result<RecordGroup, StoreError> {
    match classify(value) {
        Layout::Current => serde_json::from_value(value.clone())
            .map_err(|e| StoreError::malformed(format!("invalid record group: {e}"))),
        Layout::FlatPrice => decode_flat_price(value),
        Layout::MemoList => decode_memo_list(value),
        Layout::Unknown => Err(StoreError::malformed(
            "value is neither a record group, a price history nor a memo list",
        )),
    }
}

/// Split the enveloped price history into one group per product URL.
pub fn split_enveloped(value: &Value) -> Result<BTreeMap<GroupKey, RecordGroup>, StoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::malformed("enveloped history must be an array"))?;

    let mut grouped: BTreeMap<GroupKey, (Vec<Entry>, GroupMeta)> = BTreeMap::new();
    for item in items {
        let obj = as_object(item, "enveloped price point")?;
        let url = str_field(obj, "productUrl")
            .ok_or_else(|| StoreError::malformed("enveloped price point without productUrl"))?;
        let entry = price_point(obj)?;

        let slot = grouped.entry(url.to_string()).or_default();
        slot.0.push(entry);
        // Later points carry the freshest title.
        if let Some(title) = str_field(obj, "productTitle") {
            slot.1.title = Some(title.to_string());
        }
        slot.1.url = Some(url.to_string());
    }

    Ok(grouped
        .into_iter()
        .map(|(key, (entries, meta))| {
            let mut group = RecordGroup::from_entries(entries, meta);
            group.sort_chronological();
            (key, group)
        })
        .collect())
}

fn decode_flat_price(value: &Value) -> Result<RecordGroup, StoreError> {
    let obj = as_object(value, "price history")?;
    let prices = obj
        .get("prices")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::malformed("price history `prices` must be an array"))?;

    let entries = prices
        .iter()
        .map(|point| price_point(as_object(point, "price point")?))
        .collect::<Result<Vec<_>, _>>()?;

    // `lowestPrice` was initialised to Infinity, which JSON stores as null.
    let meta = GroupMeta {
        title: str_field(obj, "title").map(str::to_string),
        lowest: obj.get("lowestPrice").and_then(decimal_of),
        ..GroupMeta::default()
    };
    Ok(RecordGroup::from_entries(entries, meta))
}

fn decode_memo_list(value: &Value) -> Result<RecordGroup, StoreError> {
    let items = value
        .as_array()
        .ok_or_else(|| StoreError::malformed("memo list must be an array"))?;

    let mut meta = GroupMeta::default();
    let mut entries = Vec::with_capacity(items.len());

    for item in items {
        let obj = as_object(item, "memo")?;
        let text = str_field(obj, "text")
            .ok_or_else(|| StoreError::malformed("memo without text"))?;

        // Memo ids were creation times in epoch milliseconds. Id-less
        // memos are placed at their playback offset past the epoch.
        let id = obj.get("id").filter(|v| !v.is_null());
        let offset_secs = obj.get("timestamp").and_then(Value::as_f64);
        let created = id
            .and_then(Value::as_f64)
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64))
            .or_else(|| {
                offset_secs.and_then(|secs| DateTime::<Utc>::from_timestamp_millis((secs * 1000.0) as i64))
            })
            .unwrap_or_default();

        entries.push(Entry {
            id: id.map(id_string),
            timestamp: created,
            value: EntryValue::Text(text.to_string()),
            offset_secs,
        });

        if meta.title.is_none() {
            if let Some(info) = obj.get("videoInfo").and_then(Value::as_object) {
                meta.title = str_field(info, "title").map(str::to_string);
                meta.channel = str_field(info, "channel")
                    .filter(|c| !c.is_empty())
                    .map(str::to_string);
                meta.url = str_field(info, "url").map(str::to_string);
            }
        }
    }

    let mut group = RecordGroup::from_entries(entries, meta);
    group.sort_chronological();
    Ok(group)
}

fn price_point(obj: &Map<String, Value>) -> Result<Entry, StoreError> {
    let amount = obj
        .get("price")
        .and_then(decimal_of)
        .ok_or_else(|| StoreError::malformed("price point without a numeric price"))?;
    let timestamp = str_field(obj, "timestamp")
        .ok_or_else(|| StoreError::malformed("price point without timestamp"))?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| StoreError::malformed(format!("bad timestamp {timestamp:?}: {e}")))?
        .with_timezone(&Utc);
    Ok(Entry::price(amount, timestamp))
}

fn decimal_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, StoreError> {
    value
        .as_object()
        .ok_or_else(|| StoreError::malformed(format!("{what} must be an object")))
}

fn str_field<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    obj.get(field).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_classify_layouts() {
        assert_eq!(classify(&json!({"entries": []})), Layout::Current);
        assert_eq!(classify(&json!({"title": "t", "prices": []})), Layout::FlatPrice);
        assert_eq!(classify(&json!([])), Layout::MemoList);
        assert_eq!(classify(&json!("bookmarks")), Layout::Unknown);
    }

    #[test]
    fn test_decode_flat_price_with_infinite_lowest() {
        let value = json!({
            "title": "Air fryer",
            "prices": [
                {"price": 89000, "timestamp": "2024-03-02T09:00:00.000Z"},
                {"price": 84000, "timestamp": "2024-03-01T09:00:00.000Z"}
            ],
            "lowestPrice": null
        });
        let group = decode_group(&value).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.meta.title.as_deref(), Some("Air fryer"));
        assert_eq!(group.lowest(), Some(dec!(84000)));
    }

    #[test]
    fn test_decode_memo_list() {
        let value = json!([
            {
                "id": 1_700_000_123_456_u64,
                "text": "chorus",
                "timestamp": 61.5,
                "videoInfo": {"title": "Live set", "channel": "", "url": "https://www.youtube.com/watch?v=abc"}
            },
            {"id": 1_700_000_000_000_u64, "text": "intro", "timestamp": 3}
        ]);
        let group = decode_group(&value).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.entries[0].text(), Some("intro"));
        assert_eq!(group.entries[1].offset_secs, Some(61.5));
        assert_eq!(group.entries[1].id.as_deref(), Some("1700000123456"));
        assert_eq!(group.meta.title.as_deref(), Some("Live set"));
        assert_eq!(group.meta.channel, None);
    }

    #[test]
    fn test_idless_memos_keep_distinct_positions() {
        let value = json!([
            {"text": "y", "timestamp": 50},
            {"text": "y", "timestamp": 10}
        ]);
        let group = decode_group(&value).unwrap();
        assert_eq!(group.len(), 2);
        assert_ne!(group.entries[0].timestamp, group.entries[1].timestamp);
        assert_eq!(group.entries[0].offset_secs, Some(10.0));
        assert_ne!(group.entries[0].identity(), group.entries[1].identity());
    }

    #[test]
    fn test_decode_memo_without_text_is_malformed() {
        let err = decode_group(&json!([{"timestamp": 4}])).unwrap_err();
        assert!(matches!(err, StoreError::MalformedSnapshot(_)));
    }

    #[test]
    fn test_split_enveloped_groups_by_url() {
        let value = json!([
            {"price": 100, "timestamp": "2024-01-01T00:00:00Z", "productTitle": "A", "productUrl": "u1"},
            {"price": 200, "timestamp": "2024-01-01T00:00:00Z", "productTitle": "B", "productUrl": "u2"},
            {"price": 90, "timestamp": "2024-01-02T00:00:00Z", "productTitle": "A v2", "productUrl": "u1"}
        ]);
        let groups = split_enveloped(&value).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["u1"].len(), 2);
        assert_eq!(groups["u1"].lowest(), Some(dec!(90)));
        assert_eq!(groups["u1"].meta.title.as_deref(), Some("A v2"));
        assert_eq!(groups["u2"].meta.url.as_deref(), Some("u2"));
    }
}
