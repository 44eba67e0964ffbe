//! Core types for the store monitor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a store on the node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StoreId(pub u32);

impl fmt::Debug for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreId({})", self.0)
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a range within a store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RangeId(pub u64);

impl fmt::Debug for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeId({})", self.0)
    }
}

impl fmt::Display for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptor for a single range: its identifier and key span.
///
/// Only `range_id` is consulted by the monitor (for scan deduplication);
/// the key bounds are carried through for downstream exporters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDescriptor {
    pub range_id: RangeId,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
}

impl RangeDescriptor {
    pub fn new(
        range_id: RangeId,
        start_key: impl Into<Vec<u8>>,
        end_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            range_id,
            start_key: start_key.into(),
            end_key: end_key.into(),
        }
    }
}

/// MVCC statistics for a set of ranges.
///
/// Forms a commutative group under pointwise addition: event producers send
/// absolute stats for add/remove events and deltas for update events, and the
/// accumulator folds both in with [`add`](MvccStats::add) /
/// [`subtract`](MvccStats::subtract).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MvccStats {
    pub live_bytes: i64,
    pub key_bytes: i64,
    pub val_bytes: i64,
    pub intent_bytes: i64,
    pub live_count: i64,
    pub key_count: i64,
    pub val_count: i64,
    pub intent_count: i64,
}

impl MvccStats {
    /// Add `other` into this stat set, field by field.
    pub fn add(&mut self, other: &MvccStats) {
        self.live_bytes += other.live_bytes;
        self.key_bytes += other.key_bytes;
        self.val_bytes += other.val_bytes;
        self.intent_bytes += other.intent_bytes;
        self.live_count += other.live_count;
        self.key_count += other.key_count;
        self.val_count += other.val_count;
        self.intent_count += other.intent_count;
    }

    /// Subtract `other` from this stat set, field by field.
    pub fn subtract(&mut self, other: &MvccStats) {
        self.live_bytes -= other.live_bytes;
        self.key_bytes -= other.key_bytes;
        self.val_bytes -= other.val_bytes;
        self.intent_bytes -= other.intent_bytes;
        self.live_count -= other.live_count;
        self.key_count -= other.key_count;
        self.val_count -= other.val_count;
        self.intent_count -= other.intent_count;
    }
}

/// Range-lifecycle events published by the storage layer.
///
/// Each event names the store it applies to. Per-store delivery order is the
/// producer's responsibility; the monitor applies events as delivered.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A range's baseline stats, sent for each range during a scan.
    AddRange {
        store_id: StoreId,
        desc: RangeDescriptor,
        stats: MvccStats,
    },

    /// An incremental stats delta for an existing range.
    UpdateRange {
        store_id: StoreId,
        desc: RangeDescriptor,
        delta: MvccStats,
    },

    /// A range was removed; `stats` is its full current stat set.
    RemoveRange {
        store_id: StoreId,
        desc: RangeDescriptor,
        stats: MvccStats,
    },

    /// A range split in two. Stats are conserved across a split; the
    /// cardinality change is the only effect here.
    SplitRange { store_id: StoreId },

    /// Two ranges merged into one.
    MergeRange { store_id: StoreId },

    /// The store is about to replay baseline stats for every range it holds.
    BeginScanRanges { store_id: StoreId },

    /// The scan started by the matching `BeginScanRanges` is complete.
    EndScanRanges { store_id: StoreId },

    /// The store came online. Carries no stats; its only effect is to
    /// materialize the store's monitor early.
    StartStore { store_id: StoreId },
}

impl StoreEvent {
    /// The store this event applies to.
    pub fn store_id(&self) -> StoreId {
        match self {
            StoreEvent::AddRange { store_id, .. }
            | StoreEvent::UpdateRange { store_id, .. }
            | StoreEvent::RemoveRange { store_id, .. }
            | StoreEvent::SplitRange { store_id }
            | StoreEvent::MergeRange { store_id }
            | StoreEvent::BeginScanRanges { store_id }
            | StoreEvent::EndScanRanges { store_id }
            | StoreEvent::StartStore { store_id } => *store_id,
        }
    }
}

/// A consistent point-in-time read of one store's aggregate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub stats: MvccStats,
    pub range_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(live_bytes: i64, key_count: i64) -> MvccStats {
        MvccStats {
            live_bytes,
            key_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_stats_add_subtract() {
        let mut total = MvccStats::default();
        total.add(&stats(100, 3));
        total.add(&stats(50, 2));
        assert_eq!(total.live_bytes, 150);
        assert_eq!(total.key_count, 5);

        total.subtract(&stats(100, 3));
        assert_eq!(total, stats(50, 2));
    }

    #[test]
    fn test_event_store_id() {
        let event = StoreEvent::SplitRange {
            store_id: StoreId(7),
        };
        assert_eq!(event.store_id(), StoreId(7));

        let event = StoreEvent::AddRange {
            store_id: StoreId(2),
            desc: RangeDescriptor::new(RangeId(1), b"a".to_vec(), b"z".to_vec()),
            stats: MvccStats::default(),
        };
        assert_eq!(event.store_id(), StoreId(2));
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = StoreEvent::BeginScanRanges {
            store_id: StoreId(1),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "begin_scan_ranges");
        assert_eq!(json["store_id"], 1);
    }
}
