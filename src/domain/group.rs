//! Record groups — ordered entries plus denormalized metadata.
//!
//! A group is created implicitly on first observation for a key and is
//! only mutated by appending or by merge. Capped groups evict from the
//! chronological front; the running minimum never increases on append.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::Entry;

/// Length bound applied to a group after every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Retention {
    /// History group: keep at most this many entries, oldest dropped first.
    Capped(usize),
    /// Memo group: no bound.
    #[default]
    Unbounded,
}

impl Retention {
    /// Map an optional configured cap onto a policy.
    pub const fn from_cap(cap: Option<usize>) -> Self {
        match cap {
            Some(cap) => Self::Capped(cap),
            None => Self::Unbounded,
        }
    }
}

/// Denormalized metadata stored alongside the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMeta {
    /// Product title or video title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Video channel name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Page the observations were taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Running minimum over every price ever appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowest: Option<Decimal>,
}

impl GroupMeta {
    /// Overwrite descriptive fields with any the fresh observation carries.
    ///
    /// `lowest` is left alone; it only moves through `RecordGroup::push`.
    pub fn refresh_from(&mut self, fresh: &Self) {
        if fresh.title.is_some() {
            self.title.clone_from(&fresh.title);
        }
        if fresh.channel.is_some() {
            self.channel.clone_from(&fresh.channel);
        }
        if fresh.url.is_some() {
            self.url.clone_from(&fresh.url);
        }
    }

    /// Fill descriptive gaps from another group's metadata, keeping ours.
    pub fn fill_gaps(&mut self, other: &Self) {
        if self.title.is_none() {
            self.title.clone_from(&other.title);
        }
        if self.channel.is_none() {
            self.channel.clone_from(&other.channel);
        }
        if self.url.is_none() {
            self.url.clone_from(&other.url);
        }
    }
}

/// Ordered entries for one group key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordGroup {
    /// Observations, insertion order until sorted.
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Title, channel, url, lowest.
    #[serde(flatten)]
    pub meta: GroupMeta,
}

impl RecordGroup {
    /// Build a group from entries, deriving the running minimum from them.
    pub fn from_entries(entries: Vec<Entry>, meta: GroupMeta) -> Self {
        let mut group = Self { entries, meta };
        group.meta.lowest = min_opt(group.meta.lowest, group.entries_minimum());
        group
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry is a memo.
    pub fn holds_memos(&self) -> bool {
        self.entries.iter().any(|entry| entry.text().is_some())
    }

    /// Running minimum, if any price has been observed.
    pub const fn lowest(&self) -> Option<Decimal> {
        self.meta.lowest
    }

    /// Append one observation, then enforce retention.
    ///
    /// The running minimum is updated before eviction, so a minimum that
    /// falls out of a capped window is still remembered.
    pub fn push(&mut self, entry: Entry, retention: Retention) {
        if let Some(amount) = entry.amount() {
            self.meta.lowest = min_opt(self.meta.lowest, Some(amount));
        }
        self.entries.push(entry);
        self.apply_retention(retention);
    }

    /// Drop the chronologically oldest entries while over the cap.
    pub fn apply_retention(&mut self, retention: Retention) {
        let Retention::Capped(cap) = retention else {
            return;
        };
        if self.entries.len() <= cap {
            return;
        }
        self.sort_chronological();
        let excess = self.entries.len() - cap;
        self.entries.drain(..excess);
    }

    /// Stable sort by timestamp ascending.
    pub fn sort_chronological(&mut self) {
        self.entries.sort_by_key(|entry| entry.timestamp);
    }

    /// Union with `incoming`, de-duplicated by `(timestamp, content)`.
    ///
    /// Existing entries come first so their ids survive a collision.
    /// Metadata keeps our descriptive fields and fills gaps from
    /// `incoming`; the running minimum covers both sides.
    pub fn merge(&self, incoming: &Self) -> Self {
        let mut seen = HashSet::with_capacity(self.entries.len() + incoming.entries.len());
        let mut entries = Vec::with_capacity(self.entries.len() + incoming.entries.len());

        for entry in self.entries.iter().chain(&incoming.entries) {
            if seen.insert(entry.identity()) {
                entries.push(entry.clone());
            }
        }

        let mut meta = self.meta.clone();
        meta.fill_gaps(&incoming.meta);
        meta.lowest = min_opt(self.meta.lowest, incoming.meta.lowest);

        let mut merged = Self::from_entries(entries, meta);
        merged.sort_chronological();
        merged
    }

    /// Normalize a group that is about to overwrite the stored one wholesale.
    ///
    /// Sorted, trimmed to retention, and the running minimum reset to what
    /// the incoming group itself declares or contains.
    pub fn into_replacement(mut self, retention: Retention) -> Self {
        self.sort_chronological();
        self.meta.lowest = min_opt(self.meta.lowest, self.entries_minimum());
        self.apply_retention(retention);
        self
    }

    /// Minimum price among the entries currently held.
    pub fn entries_minimum(&self) -> Option<Decimal> {
        self.entries.iter().filter_map(Entry::amount).min()
    }
}

fn min_opt(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}
