//! # Event Subscriber
//!
//! Receiving side of the bus. Events arrive already filtered; a
//! subscription only has to tell its owner about gaps and about the bus
//! going away.

use crate::events::{EventFilter, LedgerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Why no event was returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The queue was full and events were dropped since the last receive.
    /// Receiving again continues with what is still queued.
    #[error("Subscription lagged, {missed} events dropped")]
    Lagged {
        /// Events dropped.
        missed: u64,
    },

    /// The event bus was dropped and the queue is drained.
    #[error("Event bus closed")]
    Closed,
}

/// Events dropped for a subscription, shared with the bus.
#[derive(Debug, Default)]
pub(crate) struct Gap(AtomicU64);

impl Gap {
    pub(crate) fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Handle for receiving events. Dropping it unsubscribes.
pub struct Subscription {
    receiver: mpsc::Receiver<LedgerEvent>,
    filter: EventFilter,
    gap: Arc<Gap>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: mpsc::Receiver<LedgerEvent>,
        filter: EventFilter,
        gap: Arc<Gap>,
    ) -> Self {
        Self {
            receiver,
            filter,
            gap,
        }
    }

    fn lagged(&self) -> Result<(), SubscriptionError> {
        match self.gap.take() {
            0 => Ok(()),
            missed => {
                debug!(missed, "Subscription lagged");
                Err(SubscriptionError::Lagged { missed })
            }
        }
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Result<LedgerEvent, SubscriptionError> {
        self.lagged()?;
        self.receiver.recv().await.ok_or(SubscriptionError::Closed)
    }

    /// Take the next queued event without waiting.
    ///
    /// `Ok(None)` means nothing is queued right now.
    pub fn try_recv(&mut self) -> Result<Option<LedgerEvent>, SubscriptionError> {
        self.lagged()?;
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Filter the bus applies for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}
