//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces. Each use case is a
//! self-contained operation over the record store.
//!
//! Use cases:
//! - `RecordStore`: keyed groups, retention, running minimum, import/export
//! - `PriceTracker`: scrape the product page and record its price
//! - `MemoBook`: timestamped memos per video
//! - `ImportFlow`: snapshot files in and out, with a merge/replace prompt
//! - `VideoWatcher`: keep memo metadata in step with the playing video
//! - `retry` / `signal`: bounded retries and poll-until-ready waits

pub mod import_flow;
pub mod memo_book;
pub mod price_tracker;
pub mod record_store;
pub mod retry;
pub mod signal;
pub mod video_watch;
