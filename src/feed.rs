//! Publish/subscribe feed for storage events.
//!
//! The storage layer owns one feed per node and publishes every
//! range-lifecycle event to it; consumers such as [`NodeStatusMonitor`]
//! subscribe and drain their own bounded channel. Closing the feed
//! disconnects all subscribers, which is how drain loops learn to stop.
//!
//! [`NodeStatusMonitor`]: crate::monitor::NodeStatusMonitor

use crate::error::{MonitorError, Result};
use crate::types::StoreEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::warn;

/// Default per-subscriber event buffer.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Unique identifier for a feed subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a feed subscription.
///
/// Events arrive in publish order. Once the feed is closed and the buffer is
/// drained, `recv` returns `Err` and iteration ends.
pub struct EventSubscription {
    pub id: SubscriptionId,
    receiver: Receiver<StoreEvent>,
}

impl EventSubscription {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent> {
        self.receiver
            .recv()
            .map_err(|_| MonitorError::FeedClosed)
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Option<StoreEvent> {
        self.receiver.try_recv().ok()
    }

    /// Iterate over events until the feed closes.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, StoreEvent> {
        self.receiver.iter()
    }
}

/// Broadcasts storage events to any number of subscribers.
pub struct StoreEventFeed {
    /// Active subscriptions by ID.
    subscribers: RwLock<HashMap<SubscriptionId, Sender<StoreEvent>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Set once by `close`; publishing and subscribing fail afterwards.
    closed: AtomicBool,
    /// Per-subscriber buffer size.
    buffer_size: usize,
}

impl StoreEventFeed {
    /// Create a new feed with the default subscriber buffer.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new feed with a custom subscriber buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            buffer_size,
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Result<EventSubscription> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MonitorError::FeedClosed);
        }
        let (sender, receiver) = bounded(self.buffer_size);
        let mut subs = self.subscribers.write();
        // `close` sets the flag before clearing the map under this lock.
        // Re-checking here means a subscriber that loses the race cannot
        // insert a sender the clear will never drop, which would leave its
        // receiver blocked forever.
        if self.closed.load(Ordering::SeqCst) {
            return Err(MonitorError::FeedClosed);
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        subs.insert(id, sender);
        Ok(EventSubscription { id, receiver })
    }

    /// Remove a subscriber. Its channel disconnects immediately.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().remove(&id);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Publish one event to every subscriber, in registration order per
    /// subscriber channel. A subscriber whose buffer is full is dropped
    /// rather than allowed to stall the producer.
    pub fn publish(&self, event: &StoreEvent) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MonitorError::FeedClosed);
        }

        let mut to_remove = Vec::new();
        {
            let subs = self.subscribers.read();
            for (id, sender) in subs.iter() {
                if sender.try_send(event.clone()).is_err() {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                warn!(subscription = id.0, "dropping slow feed subscriber");
                subs.remove(&id);
            }
        }
        Ok(())
    }

    /// Close the feed. All subscriber channels disconnect once drained;
    /// subsequent `publish`/`subscribe` calls fail. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers.write().clear();
    }
}

impl Default for StoreEventFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StoreId;
    use std::sync::Arc;
    use std::thread;

    fn start_store(id: u32) -> StoreEvent {
        StoreEvent::StartStore {
            store_id: StoreId(id),
        }
    }

    #[test]
    fn test_subscribe_publish_receive() {
        let feed = StoreEventFeed::new();
        let sub = feed.subscribe().unwrap();
        assert_eq!(feed.subscriber_count(), 1);

        feed.publish(&start_store(1)).unwrap();
        feed.publish(&start_store(2)).unwrap();

        assert_eq!(sub.recv().unwrap().store_id(), StoreId(1));
        assert_eq!(sub.recv().unwrap().store_id(), StoreId(2));
    }

    #[test]
    fn test_close_disconnects_subscribers() {
        let feed = StoreEventFeed::new();
        let sub = feed.subscribe().unwrap();
        feed.publish(&start_store(1)).unwrap();
        feed.close();

        // Buffered event still drains, then the channel reports closed.
        assert!(sub.recv().is_ok());
        assert!(sub.recv().is_err());

        assert!(matches!(
            feed.publish(&start_store(2)),
            Err(MonitorError::FeedClosed)
        ));
        assert!(matches!(feed.subscribe(), Err(MonitorError::FeedClosed)));
    }

    #[test]
    fn test_slow_subscriber_dropped() {
        let feed = StoreEventFeed::with_buffer_size(2);
        let _sub = feed.subscribe().unwrap();

        for i in 0..10 {
            feed.publish(&start_store(i)).unwrap();
        }
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_racing_close_never_leaks_subscription() {
        // Whichever way the race resolves, a subscription handed out by
        // `subscribe` must disconnect once the feed is closed; a sender
        // inserted after close's clear would block its receiver forever.
        for _ in 0..100 {
            let feed = Arc::new(StoreEventFeed::new());
            let subscriber = {
                let feed = Arc::clone(&feed);
                thread::spawn(move || feed.subscribe().ok())
            };
            let closer = {
                let feed = Arc::clone(&feed);
                thread::spawn(move || feed.close())
            };
            closer.join().unwrap();
            if let Some(sub) = subscriber.join().unwrap() {
                assert!(sub.recv().is_err());
            }
            assert_eq!(feed.subscriber_count(), 0);
        }
    }

    #[test]
    fn test_unsubscribe() {
        let feed = StoreEventFeed::new();
        let sub = feed.subscribe().unwrap();
        feed.unsubscribe(sub.id);
        assert_eq!(feed.subscriber_count(), 0);
        assert!(sub.recv().is_err());
    }
}
