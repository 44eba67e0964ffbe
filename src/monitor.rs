//! Node-level registry that routes storage events to per-store accumulators.

use crate::accumulator::RangeDataAccumulator;
use crate::error::Result;
use crate::feed::StoreEventFeed;
use crate::types::{StoreEvent, StoreId, StoreSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Monitors the status of a single store on the node.
///
/// The store's identity plus the accumulator holding its live aggregate.
pub struct StoreMonitor {
    pub id: StoreId,
    pub accumulator: RangeDataAccumulator,
}

impl StoreMonitor {
    fn new(id: StoreId) -> Self {
        Self {
            id,
            accumulator: RangeDataAccumulator::new(),
        }
    }

    /// Consistent read of this store's current aggregate.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.accumulator.snapshot()
    }
}

/// Monitors the status of a server node by aggregating events from the
/// stores it hosts.
///
/// Holds one [`StoreMonitor`] per store, created lazily the first time a
/// store is referenced and kept for the life of the node. The registry lock
/// guards only membership of the map; each accumulator serializes its own
/// state, so events for different stores never contend with each other.
pub struct NodeStatusMonitor {
    stores: RwLock<HashMap<StoreId, Arc<StoreMonitor>>>,
}

impl NodeStatusMonitor {
    /// Create a monitor with no stores registered.
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Retrieve the monitor for `id`, creating it if it does not exist.
    ///
    /// The hot path (store already known) only takes the shared lock.
    /// Creation re-checks under the exclusive lock, so concurrent
    /// first-references all land on the single canonical instance.
    pub fn store_monitor(&self, id: StoreId) -> Arc<StoreMonitor> {
        {
            let stores = self.stores.read();
            if let Some(monitor) = stores.get(&id) {
                return Arc::clone(monitor);
            }
        }

        // Rare case where the store did not already exist.
        let mut stores = self.stores.write();
        if let Some(monitor) = stores.get(&id) {
            return Arc::clone(monitor);
        }
        debug!(store = %id, "registering store monitor");
        let monitor = Arc::new(StoreMonitor::new(id));
        stores.insert(id, Arc::clone(&monitor));
        monitor
    }

    /// Number of stores currently registered.
    pub fn store_count(&self) -> usize {
        self.stores.read().len()
    }

    /// Apply one storage event to the accumulator for its store.
    pub fn dispatch(&self, event: &StoreEvent) {
        trace!(?event, "dispatching store event");
        let monitor = self.store_monitor(event.store_id());
        let acc = &monitor.accumulator;
        match event {
            StoreEvent::AddRange { desc, stats, .. } => acc.add_range(desc.range_id, stats),
            StoreEvent::UpdateRange { desc, delta, .. } => acc.update_range(desc.range_id, delta),
            StoreEvent::RemoveRange { stats, .. } => acc.remove_range(stats),
            StoreEvent::SplitRange { .. } => acc.split_range(),
            StoreEvent::MergeRange { .. } => acc.merge_range(),
            StoreEvent::BeginScanRanges { .. } => acc.begin_scan(),
            StoreEvent::EndScanRanges { .. } => acc.end_scan(),
            // Materializing the monitor above was the whole effect.
            StoreEvent::StartStore { .. } => {}
        }
    }

    /// Call `visitor` with a consistent snapshot of every registered store.
    ///
    /// The registry lock is held only long enough to copy out the current
    /// monitor set; each accumulator's lock is then taken and released per
    /// store. The view is per-store consistent, not a single atomic cut
    /// across all stores.
    pub fn visit_store_monitors<F>(&self, mut visitor: F)
    where
        F: FnMut(StoreId, StoreSnapshot),
    {
        let monitors: Vec<Arc<StoreMonitor>> = {
            let stores = self.stores.read();
            stores.values().cloned().collect()
        };
        for monitor in monitors {
            visitor(monitor.id, monitor.snapshot());
        }
    }

    /// Collect a snapshot per registered store, for exporters.
    pub fn snapshots(&self) -> Vec<(StoreId, StoreSnapshot)> {
        let mut out = Vec::with_capacity(self.store_count());
        self.visit_store_monitors(|id, snap| out.push((id, snap)));
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Start a background thread that drains `feed` into this monitor.
    ///
    /// Events are applied serially, in delivery order, until the feed is
    /// closed. The returned handle joins once the feed disconnects.
    pub fn start_monitor_feed(self: Arc<Self>, feed: &StoreEventFeed) -> Result<JoinHandle<()>> {
        let sub = feed.subscribe()?;
        let handle = thread::spawn(move || {
            debug!(subscription = sub.id.0, "store event drain started");
            for event in sub.iter() {
                self.dispatch(&event);
            }
            debug!(subscription = sub.id.0, "store event feed closed, drain stopping");
        });
        Ok(handle)
    }
}

impl Default for NodeStatusMonitor {
    fn default() -> Self {
        Self::new()
    }
}
