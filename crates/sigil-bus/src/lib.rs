//! # Sigil Bus - Ledger Event Notifications
//!
//! Replaces ad-hoc cross-tab broadcast with an explicit message-passing seam:
//! the ledger service emits [`LedgerEvent`]s through an [`EventPublisher`],
//! and any number of contexts subscribe with an [`EventFilter`].
//!
//! ```text
//! ┌────────────────┐   publish()   ┌──────────────┐  subscribe()  ┌────────────┐
//! │ Ledger Service │ ────────────→ │  Event Bus   │ ────────────→ │ Other tab  │
//! └────────────────┘               └──────────────┘               └────────────┘
//! ```
//!
//! Transport is a collaborator: [`InMemoryEventBus`] serves a single process;
//! other transports implement [`EventPublisher`]. Filters are applied by the
//! bus, so each subscription only queues what it asked for.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, LedgerEvent};
pub use publisher::{Delivery, EventPublisher, InMemoryEventBus, NoopPublisher};
pub use subscriber::{Subscription, SubscriptionError};

/// Events buffered per subscription before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
