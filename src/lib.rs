//! # Store Monitor
//!
//! Live statistics aggregation for the stores of a distributed storage node.
//!
//! The storage layer publishes range-lifecycle events (add, update, remove,
//! split, merge, and full-store rescans) on a feed; this crate drains the
//! feed and maintains, per store, a running MVCC stat total and a live range
//! count that stay internally consistent under concurrent readers.
//!
//! ## Core Concepts
//!
//! - **Accumulator**: per-store running stat total with a scan protocol for
//!   bootstrapping a correct baseline
//! - **Node monitor**: lazily-populated registry routing each event to the
//!   accumulator for its store
//! - **Feed**: bounded publish/subscribe channel carrying the event stream
//!
//! ## Example
//!
//! ```ignore
//! use storemon::{NodeStatusMonitor, StoreEventFeed};
//! use std::sync::Arc;
//!
//! let feed = StoreEventFeed::new();
//! let monitor = Arc::new(NodeStatusMonitor::new());
//! let drain = Arc::clone(&monitor).start_monitor_feed(&feed)?;
//!
//! // ... storage layer publishes events on the feed ...
//!
//! monitor.visit_store_monitors(|store_id, snapshot| {
//!     println!("store {store_id}: {} ranges", snapshot.range_count);
//! });
//!
//! feed.close();
//! drain.join().unwrap();
//! ```

pub mod accumulator;
pub mod error;
pub mod feed;
pub mod monitor;
pub mod types;

// Re-exports
pub use accumulator::RangeDataAccumulator;
pub use error::{MonitorError, Result};
pub use feed::{EventSubscription, StoreEventFeed, SubscriptionId};
pub use monitor::{NodeStatusMonitor, StoreMonitor};
pub use types::*;
