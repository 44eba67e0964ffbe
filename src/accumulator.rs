//! Per-store accumulation of range statistics.

use crate::types::{MvccStats, RangeId, StoreSnapshot};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Mutable aggregate guarded by the accumulator's lock.
///
/// `scan` is `Some` exactly while a scan is in progress; the set it holds
/// tracks which ranges have already contributed their baseline stats during
/// that scan. Keeping the flag and the seen-set in one field means they
/// cannot fall out of sync.
#[derive(Debug, Default)]
struct AccumulatorState {
    stats: MvccStats,
    range_count: i64,
    scan: Option<HashSet<RangeId>>,
}

/// Maintains a set of accumulated stats for a set of ranges, computed from an
/// incoming stream of storage events. Stats will be changed by any events
/// sent to this type; higher level components are responsible for selecting
/// the specific ranges accumulated by a `RangeDataAccumulator` instance.
///
/// During typical operation stats are monitored using per-operation deltas;
/// however, a freshly created accumulator must first learn the total value of
/// all stats in its scope. The scanning mode facilitates this: the underlying
/// store initiates a scan with a begin-scan event and then sends one add
/// event per range it holds.
///
/// Ranges cannot be added, removed, split or merged while a scan is running,
/// but update events can still arrive. An update for a range whose baseline
/// has not yet been replayed by the scan must be discarded, or its delta
/// would be double-counted once the baseline arrives; the seen-set exists to
/// make that call.
#[derive(Debug, Default)]
pub struct RangeDataAccumulator {
    state: Mutex<AccumulatorState>,
}

impl RangeDataAccumulator {
    /// Create an accumulator with zeroed stats, not scanning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter scanning mode, discarding any previously accumulated state.
    ///
    /// A scan is the authoritative re-derivation of the aggregate, so the
    /// running totals are reset before baselines are replayed. The producer
    /// must not begin a scan while one is already in progress.
    pub fn begin_scan(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.scan.is_none(), "scan begun while already scanning");
        state.stats = MvccStats::default();
        state.range_count = 0;
        state.scan = Some(HashSet::new());
    }

    /// Fold in the baseline stats for one range during a scan.
    ///
    /// Outside of a scan this is a no-op: in this event model, new-range
    /// stats only ever arrive through scan replay, so an add seen while idle
    /// carries nothing the running deltas do not already cover.
    pub fn add_range(&self, range_id: RangeId, stats: &MvccStats) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(seen) = state.scan.as_mut() {
            seen.insert(range_id);
            state.range_count += 1;
            state.stats.add(stats);
        }
    }

    /// Apply an incremental stats delta for a range.
    ///
    /// While a scan is running, deltas for ranges the scan has not yet
    /// baselined are discarded; applying them now and adding the baseline
    /// later would double-count. Once the range has been seen this scan, or
    /// whenever no scan is running, the delta applies unconditionally.
    pub fn update_range(&self, range_id: RangeId, delta: &MvccStats) {
        let mut state = self.state.lock();
        if let Some(seen) = state.scan.as_ref() {
            if !seen.contains(&range_id) {
                return;
            }
        }
        state.stats.add(delta);
    }

    /// Remove a range, subtracting its full stat set.
    ///
    /// Applied in both states: a removal always refers to a range whose
    /// baseline is already reflected in the aggregate.
    pub fn remove_range(&self, stats: &MvccStats) {
        let mut state = self.state.lock();
        state.stats.subtract(stats);
        state.range_count -= 1;
        debug_assert!(state.range_count >= 0, "range count went negative");
    }

    /// Record a range split. Stats are conserved; only cardinality changes.
    pub fn split_range(&self) {
        let mut state = self.state.lock();
        state.range_count += 1;
    }

    /// Record a range merge. Stats are conserved; only cardinality changes.
    pub fn merge_range(&self) {
        let mut state = self.state.lock();
        state.range_count -= 1;
        debug_assert!(state.range_count >= 0, "range count went negative");
    }

    /// Leave scanning mode, releasing the seen-set.
    pub fn end_scan(&self) {
        let mut state = self.state.lock();
        state.scan = None;
    }

    /// Whether a scan is currently in progress.
    pub fn is_scanning(&self) -> bool {
        self.state.lock().scan.is_some()
    }

    /// Read a consistent snapshot of the current aggregate.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock();
        StoreSnapshot {
            stats: state.stats,
            range_count: state.range_count,
        }
    }
}
