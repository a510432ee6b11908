//! Streaming aggregation of resolved pauses.
//!
//! The fold is commutative and associative (count: sum, total: sum,
//! max: max), so summaries built from separate files or chunks can be merged
//! in any order and equal the summary of the concatenated input.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::event_kind::EventKind;
use crate::reconcile::ResolvedInterval;
use crate::trigger::Trigger;

/// Which categorical dimension summaries are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Trigger,
    Kind,
}

/// Summaries keyed by different dimensions cannot be combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot merge a summary grouped by {other:?} into one grouped by {this:?}")]
pub struct GroupingMismatch {
    pub this: GroupBy,
    pub other: GroupBy,
}

/// Summary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SummaryKey {
    Kind(EventKind),
    Trigger(Trigger),
    /// Pauses whose log line names no trigger.
    Untriggered,
}

impl SummaryKey {
    pub fn of(interval: &ResolvedInterval, group_by: GroupBy) -> Self {
        match group_by {
            GroupBy::Kind => Self::Kind(interval.kind),
            GroupBy::Trigger => interval
                .trigger
                .clone()
                .map_or(Self::Untriggered, Self::Trigger),
        }
    }
}

impl fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => write!(f, "{kind}"),
            Self::Trigger(trigger) => write!(f, "{trigger}"),
            Self::Untriggered => f.write_str("(none)"),
        }
    }
}

impl Serialize for SummaryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Count, total and maximum pause time for one key.
///
/// Only ever grows during an aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub key: SummaryKey,
    pub count: u64,
    #[serde(rename = "total_ms", serialize_with = "crate::duration_ms::serialize")]
    pub total: Duration,
    #[serde(rename = "max_ms", serialize_with = "crate::duration_ms::serialize")]
    pub max: Duration,
}

impl SummaryRecord {
    pub const fn new(key: SummaryKey) -> Self {
        Self {
            key,
            count: 0,
            total: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn add(&mut self, duration: Duration) {
        self.count += 1;
        self.total += duration;
        self.max = self.max.max(duration);
    }

    pub fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.total += other.total;
        self.max = self.max.max(other.max);
    }

    /// Mean pause, or zero for an empty record.
    pub fn mean(&self) -> Duration {
        u32::try_from(self.count)
            .ok()
            .filter(|&n| n > 0)
            .map_or(Duration::ZERO, |n| self.total / n)
    }
}

/// Summary records for one aggregation run, keyed per [`GroupBy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    group_by: GroupBy,
    #[serde(serialize_with = "serialize_records")]
    records: BTreeMap<SummaryKey, SummaryRecord>,
}

fn serialize_records<S: Serializer>(
    records: &BTreeMap<SummaryKey, SummaryRecord>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(records.values())
}

impl Summary {
    pub const fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            records: BTreeMap::new(),
        }
    }

    pub const fn group_by(&self) -> GroupBy {
        self.group_by
    }

    /// Folds one interval in, creating its record on first sight.
    pub fn record(&mut self, interval: &ResolvedInterval) {
        self.add(SummaryKey::of(interval, self.group_by), interval.duration);
    }

    pub fn add(&mut self, key: SummaryKey, duration: Duration) {
        self.records
            .entry(key)
            .or_insert_with_key(|key| SummaryRecord::new(key.clone()))
            .add(duration);
    }

    /// Merges another summary built with the same grouping.
    ///
    /// Leaves `self` untouched when the groupings differ.
    pub fn merge(&mut self, other: &Self) -> Result<(), GroupingMismatch> {
        if self.group_by != other.group_by {
            return Err(GroupingMismatch {
                this: self.group_by,
                other: other.group_by,
            });
        }
        for (key, record) in &other.records {
            self.records
                .entry(key.clone())
                .or_insert_with(|| SummaryRecord::new(key.clone()))
                .merge(record);
        }
        Ok(())
    }

    pub fn get(&self, key: &SummaryKey) -> Option<&SummaryRecord> {
        self.records.get(key)
    }

    /// Records in key order.
    pub fn records(&self) -> impl Iterator<Item = &SummaryRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of pauses across all keys.
    pub fn total_count(&self) -> u64 {
        self.records.values().map(|r| r.count).sum()
    }
}

impl Default for Summary {
    fn default() -> Self {
        Self::new(GroupBy::default())
    }
}
