//! # Event Publisher
//!
//! Fan-out of ledger events to subscribers.
//!
//! Each subscription owns a bounded queue. The bus applies the
//! subscription's [`EventFilter`] before enqueueing, so a context watching
//! one artifact never buffers traffic for the others. Delivery never blocks
//! the ledger: a full queue drops the event and records the gap, which the
//! subscriber sees as [`SubscriptionError::Lagged`](crate::SubscriptionError::Lagged)
//! on its next receive.

use crate::events::{EventFilter, LedgerEvent};
use crate::subscriber::{Gap, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Outcome of publishing one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscriptions that queued the event.
    pub delivered: usize,
    /// Matching subscriptions whose queue was full.
    pub lagged: usize,
}

/// Sink for ledger events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event. Never fails; slow or absent listeners only show up
    /// in the returned [`Delivery`].
    async fn publish(&self, event: LedgerEvent) -> Delivery;

    /// Total events published.
    fn events_published(&self) -> u64;
}

/// One registered subscription.
struct Subscriber {
    filter: EventFilter,
    queue: mpsc::Sender<LedgerEvent>,
    gap: Arc<Gap>,
}

/// What happened when offering an event to one subscriber.
enum Offer {
    Queued,
    Filtered,
    Full,
    Gone,
}

impl Subscriber {
    fn offer(&self, event: &LedgerEvent) -> Offer {
        if !self.filter.matches(event) {
            return Offer::Filtered;
        }
        match self.queue.try_send(event.clone()) {
            Ok(()) => Offer::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.gap.record();
                Offer::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Gone,
        }
    }
}

/// In-process event bus.
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    capacity: usize,
    events_published: AtomicU64,
}

impl InMemoryEventBus {
    /// Bus with the default per-subscription queue size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus whose subscriptions each buffer up to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            events_published: AtomicU64::new(0),
        }
    }

    /// Subscribe to events matching `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let (queue, receiver) = mpsc::channel(self.capacity);
        let gap = Arc::new(Gap::default());
        debug!(
            topics = ?filter.topics,
            artifacts = filter.artifacts.len(),
            "New subscription"
        );
        self.subscribers.lock().push(Subscriber {
            filter: filter.clone(),
            queue,
            gap: Arc::clone(&gap),
        });
        Subscription::new(receiver, filter, gap)
    }

    /// Subscriptions still held by someone.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| !s.queue.is_closed())
            .count()
    }

    /// Queue size of each subscription.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: LedgerEvent) -> Delivery {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let mut delivery = Delivery::default();
        self.subscribers.lock().retain(|subscriber| match subscriber.offer(&event) {
            Offer::Queued => {
                delivery.delivered += 1;
                true
            }
            Offer::Full => {
                delivery.lagged += 1;
                true
            }
            Offer::Filtered => true,
            Offer::Gone => false,
        });

        if delivery.lagged > 0 {
            debug!(
                topic = ?event.topic(),
                artifact = %event.artifact().short(),
                lagged = delivery.lagged,
                "Event dropped for full subscriptions"
            );
        }
        trace!(
            topic = ?event.topic(),
            artifact = %event.artifact().short(),
            delivered = delivery.delivered,
            "Event published"
        );
        delivery
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

/// Publisher that discards everything; for contexts with no listeners.
#[derive(Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: LedgerEvent) -> Delivery {
        Delivery::default()
    }

    fn events_published(&self) -> u64 {
        0
    }
}
