//! # Sigil Ledger Service
//!
//! The main service implementing the Sigil Ledger API.
//!
//! ## Architecture
//!
//! This service:
//! 1. Implements `SigilLedgerApi` for issue / exhale / inhale and queries
//! 2. Gates every window mutation behind the send lock for (artifact, token)
//! 3. Serializes mutations of one artifact inside the process with a head mutex
//! 4. Checks every ledger invariant, then persists only over the head it loaded
//! 5. Emits `LedgerEvent`s and publishes window snapshots after each close
//!
//! All collaborators are injected through [`SigilLedgerDependencies`].

mod api;
mod helpers;
mod transfer;
#[cfg(test)]
mod tests;

use super::send_lock::SendLock;
use crate::adapters::{InMemoryLedgerStore, InMemoryLockStore, InMemoryPublisher};
use crate::config::{ConfigError, LedgerConfig};
use crate::domain::SendDedupIndex;
use crate::ports::{LedgerStore, PublicationAdapter, TimeSource, ZkOracle};
use parking_lot::Mutex;
use sigil_bus::{EventPublisher, NoopPublisher};
use sigil_types::Hash;
use std::collections::HashMap;
use std::sync::Arc;

/// Dependencies for [`SigilLedgerService`].
pub struct SigilLedgerDependencies {
    /// Pulse source.
    pub clock: Arc<dyn TimeSource>,
    /// Shared send-lock storage.
    pub locks: Arc<dyn crate::ports::LockStore>,
    /// Durable ledger storage.
    pub ledgers: Arc<dyn LedgerStore>,
    /// Publication target for window snapshots.
    pub publisher: Arc<dyn PublicationAdapter>,
    /// Event sink.
    pub events: Arc<dyn EventPublisher>,
    /// Optional ZK prover for hardened links.
    pub zk: Option<Arc<dyn ZkOracle>>,
}

impl SigilLedgerDependencies {
    /// Purely in-memory collaborators around `clock`. Events are dropped.
    pub fn in_memory(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            clock,
            locks: Arc::new(InMemoryLockStore::new()),
            ledgers: Arc::new(InMemoryLedgerStore::new()),
            publisher: Arc::new(InMemoryPublisher::new()),
            events: Arc::new(NoopPublisher),
            zk: None,
        }
    }
}

/// The Sigil Ledger Service.
pub struct SigilLedgerService {
    /// Service configuration.
    pub(crate) config: LedgerConfig,
    /// Pulse source.
    pub(crate) clock: Arc<dyn TimeSource>,
    /// Send lock over the shared lock store.
    pub(crate) send_lock: SendLock,
    /// Durable ledgers.
    pub(crate) ledgers: Arc<dyn LedgerStore>,
    /// Publication target.
    pub(crate) publisher: Arc<dyn PublicationAdapter>,
    /// Event sink.
    pub(crate) events: Arc<dyn EventPublisher>,
    /// Optional ZK prover.
    pub(crate) zk: Option<Arc<dyn ZkOracle>>,
    /// Recent sends by send id.
    pub(crate) dedup: Mutex<SendDedupIndex>,
    /// Per-artifact mutation mutexes, dropped once idle.
    pub(crate) heads: Mutex<HashMap<Hash, Arc<tokio::sync::Mutex<()>>>>,
}

impl SigilLedgerService {
    /// Create a service. Fails if `config` does not validate.
    pub fn new(deps: SigilLedgerDependencies, config: LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            send_lock: SendLock::new(deps.locks, Arc::clone(&deps.clock), config.lock_ttl_pulses),
            dedup: Mutex::new(SendDedupIndex::new(config.dedup_retention_pulses)),
            clock: deps.clock,
            ledgers: deps.ledgers,
            publisher: deps.publisher,
            events: deps.events,
            zk: deps.zk,
            heads: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The send lock, for hosts that coordinate sends themselves.
    pub fn send_lock(&self) -> &SendLock {
        &self.send_lock
    }

    /// Canonical hashes of every stored ledger.
    pub fn artifacts(&self) -> Result<Vec<Hash>, crate::domain::LedgerError> {
        Ok(self.ledgers.list()?)
    }
}
