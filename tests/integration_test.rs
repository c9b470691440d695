//! Integration Tests - End-to-end Record Store Testing
//!
//! Tests the interaction between usecases, ports, and adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use mockall::predicate::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use recordkeep::adapters::persistence::{JsonFileKvStore, MemoryKvStore};
use recordkeep::domain::entry::Entry;
use recordkeep::domain::error::{StorageError, StoreError};
use recordkeep::domain::group::{GroupMeta, RecordGroup, Retention};
use recordkeep::domain::snapshot::{ImportMode, Snapshot};
use recordkeep::ports::kv_store::{KeyValueStore, StoredItems};
use recordkeep::ports::messaging::{MessageChannel, PriceReading, Request, Response};
use recordkeep::usecases::price_tracker::PriceTracker;
use recordkeep::usecases::record_store::{RecordStore, StoreOptions};
use recordkeep::usecases::retry::{RetryPolicy, send_with_retry};

// ---- Mock Definitions ----

mock! {
    pub Kv {}

    #[async_trait::async_trait]
    impl KeyValueStore for Kv {
        async fn get(&self, keys: &[String]) -> Result<StoredItems, StorageError>;
        async fn get_all(&self) -> Result<StoredItems, StorageError>;
        async fn set(&self, items: StoredItems) -> Result<(), StorageError>;
        async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;
        async fn clear(&self) -> Result<(), StorageError>;
        async fn is_healthy(&self) -> bool;
    }
}

mock! {
    pub Channel {}

    #[async_trait::async_trait]
    impl MessageChannel for Channel {
        async fn send(&self, request: &Request) -> anyhow::Result<Response>;
        async fn reload(&self) -> anyhow::Result<()>;
    }
}

// ---- Helpers ----

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn capped(cap: usize) -> StoreOptions {
    StoreOptions {
        retention: Retention::Capped(cap),
        serialize_appends: true,
    }
}

fn memory_store(options: StoreOptions) -> (Arc<MemoryKvStore>, RecordStore<MemoryKvStore>) {
    let kv = Arc::new(MemoryKvStore::new());
    (Arc::clone(&kv), RecordStore::new(kv, options))
}

fn texts(group: &RecordGroup) -> Vec<(DateTime<Utc>, &str)> {
    group
        .entries
        .iter()
        .filter_map(|e| e.text().map(|t| (e.timestamp, t)))
        .collect()
}

// ---- Retention and running minimum ----

#[tokio::test]
async fn test_price_history_cap_scenario() {
    let (_, store) = memory_store(capped(30));
    let key = "https://shop.example/p/1";

    for i in 0..31 {
        store
            .append(key, Entry::price(dec!(100) + Decimal::from(i), at(i)))
            .await
            .unwrap();
    }

    let group = store.get(key).await.unwrap();
    assert_eq!(group.len(), 30);
    let amounts: Vec<Decimal> = group.entries.iter().filter_map(Entry::amount).collect();
    assert!(!amounts.contains(&dec!(100)), "oldest entry should be evicted");
    assert_eq!(amounts.first(), Some(&dec!(101)));
    assert_eq!(amounts.last(), Some(&dec!(130)));
    // Running minimum survives eviction.
    assert_eq!(group.lowest(), Some(dec!(100)));
}

#[tokio::test]
async fn test_running_minimum_tracks_every_append() {
    let (_, store) = memory_store(capped(30));
    let prices = [dec!(500), dec!(420), dec!(450), dec!(399), dec!(610)];

    for (i, price) in prices.iter().enumerate() {
        let group = store
            .append("p", Entry::price(*price, at(i as i64)))
            .await
            .unwrap();
        let expected = prices[..=i].iter().min().copied();
        assert_eq!(group.lowest(), expected);
    }
}

// ---- Import / export ----

#[tokio::test]
async fn test_export_then_replace_is_idempotent() {
    let (_, store) = memory_store(capped(3));
    for i in 0..5 {
        store
            .append_observed(
                "https://shop.example/p/1",
                Entry::price(dec!(1000) - Decimal::from(i * 10), at(i)),
                &GroupMeta {
                    title: Some("Kettle".into()),
                    ..GroupMeta::default()
                },
            )
            .await
            .unwrap();
    }
    store.append("abc", Entry::memo("intro", at(1), Some(4.0))).await.unwrap();
    store.append("abc", Entry::memo("intro", at(2), Some(9.5))).await.unwrap();

    let before = store.export_snapshot().await.unwrap();
    store.import_snapshot(before.clone(), ImportMode::Replace).await.unwrap();
    let after = store.export_snapshot().await.unwrap();

    assert_eq!(after.groups, before.groups);
}

#[tokio::test]
async fn test_destructive_replace_import() {
    let (_, store) = memory_store(StoreOptions::default());
    store.append("A", Entry::memo("foo", at(1), None)).await.unwrap();
    store.append("B", Entry::memo("other", at(1), None)).await.unwrap();

    let incoming = RecordGroup::from_entries(vec![Entry::memo("bar", at(2), None)], GroupMeta::default());
    let snapshot = Snapshot::new(BTreeMap::from([("A".to_string(), incoming)]));
    let report = store.import_snapshot(snapshot, ImportMode::Replace).await.unwrap();

    assert_eq!(report.groups, 1);
    assert_eq!(texts(&store.get("A").await.unwrap()), vec![(at(2), "bar")]);
    assert!(store.get("B").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_resets_running_minimum() {
    let (_, store) = memory_store(capped(30));
    store.append("p", Entry::price(dec!(5), at(0))).await.unwrap();

    let incoming = RecordGroup::from_entries(
        vec![Entry::price(dec!(80), at(1)), Entry::price(dec!(70), at(2))],
        GroupMeta::default(),
    );
    let snapshot = Snapshot::new(BTreeMap::from([("p".to_string(), incoming)]));
    store.import_snapshot(snapshot, ImportMode::Replace).await.unwrap();

    assert_eq!(store.get("p").await.unwrap().lowest(), Some(dec!(70)));
}

#[tokio::test]
async fn test_malformed_import_leaves_store_unchanged() {
    let (kv, store) = memory_store(StoreOptions::default());
    store.append("A", Entry::memo("foo", at(1), None)).await.unwrap();
    let before = kv.dump().await;

    let err = store
        .import_value(&json!({"not_a_valid_envelope": true}), ImportMode::Merge)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::MalformedSnapshot(_)));
    assert_eq!(kv.dump().await, before);
}

#[tokio::test]
async fn test_merge_deduplicates_by_timestamp_and_content() {
    let (_, store) = memory_store(StoreOptions::default());
    store.append("K", Entry::memo("x", at(1), None)).await.unwrap();
    store.append("K", Entry::memo("y", at(2), None)).await.unwrap();
    store.append("untouched", Entry::memo("keep", at(0), None)).await.unwrap();

    let incoming = RecordGroup::from_entries(
        vec![Entry::memo("x", at(1), None), Entry::memo("z", at(3), None)],
        GroupMeta::default(),
    );
    let snapshot = Snapshot::new(BTreeMap::from([("K".to_string(), incoming)]));
    store.import_snapshot(snapshot, ImportMode::Merge).await.unwrap();

    assert_eq!(
        texts(&store.get("K").await.unwrap()),
        vec![(at(1), "x"), (at(2), "y"), (at(3), "z")]
    );
    assert_eq!(store.get("untouched").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_merge_keeps_same_timestamp_different_content() {
    let (_, store) = memory_store(StoreOptions::default());
    store.append("K", Entry::memo("x", at(1), None)).await.unwrap();

    let incoming = RecordGroup::from_entries(vec![Entry::memo("other", at(1), None)], GroupMeta::default());
    let snapshot = Snapshot::new(BTreeMap::from([("K".to_string(), incoming)]));
    store.import_snapshot(snapshot, ImportMode::Merge).await.unwrap();

    assert_eq!(store.get("K").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_v1_memo_export_merges() {
    let (_, store) = memory_store(StoreOptions::default());
    let payload = json!({
        "version": "1.0",
        "exportDate": "2024-03-01T10:00:00.000Z",
        "memos": {
            "abc123": [
                {
                    "id": 1_709_287_200_000_i64,
                    "text": "great explanation",
                    "timestamp": 125.4,
                    "videoInfo": {"title": "Ownership", "channel": "Rustacean", "url": "https://www.youtube.com/watch?v=abc123"}
                }
            ]
        }
    });

    let report = store.import_value(&payload, ImportMode::Merge).await.unwrap();
    assert_eq!(report.entries, 1);

    let group = store.get("abc123").await.unwrap();
    assert_eq!(group.meta.title.as_deref(), Some("Ownership"));
    assert_eq!(group.entries[0].offset_secs, Some(125.4));
    assert_eq!(group.entries[0].id.as_deref(), Some("1709287200000"));
}

#[tokio::test]
async fn test_v1_memo_reimport_with_new_id_is_deduplicated() {
    let (_, store) = memory_store(StoreOptions::default());
    let first = json!({"version": "1.0", "memos": {"abc": [{"id": 1000, "text": "x", "timestamp": 43}]}});
    let second = json!({"version": "1.0", "memos": {"abc": [{"id": 2000.5, "text": "x", "timestamp": 43}]}});

    store.import_value(&first, ImportMode::Merge).await.unwrap();
    store.import_value(&second, ImportMode::Merge).await.unwrap();

    let group = store.get("abc").await.unwrap();
    assert_eq!(group.len(), 1);
    assert_eq!(group.entries[0].offset_secs, Some(43.0));
}

#[tokio::test]
async fn test_v1_memos_without_ids_stay_distinct() {
    let (_, store) = memory_store(StoreOptions::default());
    let payload = json!({"version": "1.0", "memos": {"abc": [
        {"text": "y", "timestamp": 10},
        {"text": "y", "timestamp": 50}
    ]}});

    store.import_value(&payload, ImportMode::Merge).await.unwrap();
    store.import_value(&payload, ImportMode::Merge).await.unwrap();

    let group = store.get("abc").await.unwrap();
    let offsets: Vec<_> = group.entries.iter().map(|e| e.offset_secs).collect();
    assert_eq!(offsets, vec![Some(10.0), Some(50.0)]);
}

// ---- Concurrent append race ----

async fn race(serialize_appends: bool) -> usize {
    let kv = Arc::new(MemoryKvStore::new().with_latency(Duration::from_millis(20)));
    let store = RecordStore::new(
        kv,
        StoreOptions {
            retention: Retention::Unbounded,
            serialize_appends,
        },
    );

    let (a, b) = tokio::join!(
        store.append("K", Entry::memo("e1", at(1), None)),
        store.append("K", Entry::memo("e2", at(2), None)),
    );
    a.unwrap();
    b.unwrap();
    store.get("K").await.unwrap().len()
}

#[tokio::test(start_paused = true)]
async fn test_unserialized_appends_lose_a_write() {
    assert_eq!(race(false).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_serialized_appends_keep_both() {
    assert_eq!(race(true).await, 2);
}

// ---- Storage errors ----

#[tokio::test]
async fn test_storage_error_propagates_without_retry() {
    let mut kv = MockKv::new();
    kv.expect_get()
        .times(1)
        .returning(|_| Ok(StoredItems::new()));
    kv.expect_set()
        .times(1)
        .returning(|_| Err(StorageError::new("quota exceeded")));

    let store = RecordStore::new(Arc::new(kv), StoreOptions::default());
    let err = store.append("K", Entry::memo("x", at(0), None)).await.unwrap_err();

    match err {
        StoreError::Storage(e) => assert_eq!(e.message(), "quota exceeded"),
        other => panic!("expected storage error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_absent_key_is_not_an_error() {
    let mut kv = MockKv::new();
    kv.expect_get()
        .withf(|keys: &[String]| keys.len() == 1 && keys[0] == "missing")
        .returning(|_| Ok(StoredItems::new()));

    let store = RecordStore::new(Arc::new(kv), StoreOptions::default());
    assert!(store.get("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_import_stops_on_clear_failure() {
    let mut kv = MockKv::new();
    kv.expect_clear()
        .times(1)
        .returning(|| Err(StorageError::new("backend gone")));
    kv.expect_set().never();

    let store = RecordStore::new(Arc::new(kv), StoreOptions::default());
    let group = RecordGroup::from_entries(vec![Entry::memo("x", at(0), None)], GroupMeta::default());
    let snapshot = Snapshot::new(BTreeMap::from([("K".to_string(), group)]));

    let err = store.import_snapshot(snapshot, ImportMode::Replace).await.unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));
}

// ---- Messaging retry ----

#[tokio::test(start_paused = true)]
async fn test_retry_reloads_between_attempts() {
    let mut channel = MockChannel::new();
    let mut failures = 2;
    channel
        .expect_send()
        .with(eq(Request::GetTime))
        .times(3)
        .returning(move |_| {
            if failures > 0 {
                failures -= 1;
                anyhow::bail!("could not establish connection");
            }
            Ok(Response::Time { current_time: 7.0 })
        });
    channel.expect_reload().times(2).returning(|| Ok(()));

    let response = send_with_retry(&channel, &Request::GetTime, &RetryPolicy::default())
        .await
        .unwrap();
    assert_eq!(response, Response::Time { current_time: 7.0 });
}

#[tokio::test(start_paused = true)]
async fn test_retry_without_reload() {
    let mut channel = MockChannel::new();
    channel
        .expect_send()
        .times(2)
        .returning(|_| anyhow::bail!("no receiver"));
    channel.expect_reload().never();

    let policy = RetryPolicy {
        max_attempts: 2,
        reload_before_retry: false,
        ..RetryPolicy::default()
    };
    assert!(send_with_retry(&channel, &Request::GetPrices, &policy).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_price_tracker_reports_unreachable_page() {
    let mut channel = MockChannel::new();
    channel
        .expect_send()
        .times(3)
        .returning(|_| anyhow::bail!("receiving end does not exist"));
    channel.expect_reload().times(2).returning(|| Ok(()));

    let (kv, store) = memory_store(capped(30));
    let tracker = PriceTracker::new(Arc::new(store), Arc::new(channel), RetryPolicy::default());

    assert!(matches!(tracker.observe().await, Err(StoreError::Channel(_))));
    assert!(kv.dump().await.is_empty());
}

#[tokio::test]
async fn test_price_tracker_appends_to_capped_history() {
    let mut channel = MockChannel::new();
    channel.expect_send().with(eq(Request::GetPrices)).returning(|_| {
        Ok(Response::Prices(PriceReading {
            price_text: "₩ 27,900".into(),
            product_title: "Mechanical keyboard".into(),
            product_url: "https://shop.example/p/kb".into(),
        }))
    });

    let (_, store) = memory_store(capped(2));
    let store = Arc::new(store);
    let tracker = PriceTracker::new(Arc::clone(&store), Arc::new(channel), RetryPolicy::once());

    for _ in 0..3 {
        tracker.observe().await.unwrap();
    }
    let group = store.get("https://shop.example/p/kb").await.unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group.lowest(), Some(dec!(27900)));
    assert_eq!(group.meta.url.as_deref(), Some("https://shop.example/p/kb"));
}

// ---- File-backed store ----

#[tokio::test]
async fn test_json_file_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");

    {
        let kv = Arc::new(JsonFileKvStore::open(&path).await.unwrap());
        let store = RecordStore::new(kv, capped(30));
        store.append("p", Entry::price(dec!(19.99), at(0))).await.unwrap();
        store.append("p", Entry::price(dec!(17.50), at(1))).await.unwrap();
    }

    let kv = Arc::new(JsonFileKvStore::open(&path).await.unwrap());
    let store = RecordStore::new(kv, capped(30));
    let group = store.get("p").await.unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group.lowest(), Some(dec!(17.50)));

    store.clear().await.unwrap();
    assert!(store.list().await.unwrap().is_empty());
}
