//! In-memory adapters.
//!
//! Used by tests and by single-process hosts with no durable storage.

use super::ensure_stored_head;
use crate::domain::{ArtifactLedger, HeadCommitment, LockKey, LockRecord, PublishError, StoreError};
use crate::ports::{LedgerStore, LockStore, PublicationAdapter};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sigil_crypto::digest;
use sigil_types::{ContentId, Hash};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Lock store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    records: Mutex<HashMap<String, LockRecord>>,
}

impl InMemoryLockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of held locks.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no locks are held.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LockStore for InMemoryLockStore {
    fn get(&self, key: &LockKey) -> Result<Option<LockRecord>, StoreError> {
        Ok(self.records.lock().get(&key.storage_key()).copied())
    }

    fn compare_and_swap(
        &self,
        key: &LockKey,
        expected: Option<&LockRecord>,
        new: LockRecord,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        let storage_key = key.storage_key();
        if records.get(&storage_key) != expected {
            return Ok(false);
        }
        records.insert(storage_key, new);
        Ok(true)
    }

    fn remove_if_held(&self, key: &LockKey, lock_id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        let storage_key = key.storage_key();
        match records.get(&storage_key) {
            Some(record) if record.lock_id == lock_id => {
                records.remove(&storage_key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Ledger store backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: RwLock<HashMap<Hash, ArtifactLedger>>,
}

impl InMemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self, artifact: &Hash) -> Result<Option<ArtifactLedger>, StoreError> {
        Ok(self.ledgers.read().get(artifact).cloned())
    }

    fn save_if(
        &self,
        ledger: &ArtifactLedger,
        expected: Option<&HeadCommitment>,
    ) -> Result<(), StoreError> {
        let artifact = ledger.canonical_hash();
        let mut ledgers = self.ledgers.write();
        ensure_stored_head(&artifact, ledgers.get(&artifact), expected)?;
        ledgers.insert(artifact, ledger.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<Hash>, StoreError> {
        let mut hashes: Vec<Hash> = self.ledgers.read().keys().copied().collect();
        hashes.sort();
        Ok(hashes)
    }
}

/// Publication target that keeps blobs in memory.
#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryPublisher {
    /// Content id prefix.
    pub const PREFIX: &'static str = "mem:";

    /// Create an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a published blob.
    pub fn get(&self, id: &ContentId) -> Option<Vec<u8>> {
        self.blobs.read().get(id.as_str()).cloned()
    }

    /// Number of published blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether nothing was published.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl PublicationAdapter for InMemoryPublisher {
    async fn publish(&self, bytes: Vec<u8>) -> Result<ContentId, PublishError> {
        let id = ContentId(format!("{}{}", Self::PREFIX, digest(&bytes)));
        self.blobs.write().insert(id.0.clone(), bytes);
        Ok(id)
    }
}

/// Publication target that is always unreachable.
#[derive(Debug, Default)]
pub struct FailingPublisher {
    attempts: AtomicUsize,
}

impl FailingPublisher {
    /// Create a failing publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of publish attempts.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PublicationAdapter for FailingPublisher {
    async fn publish(&self, _bytes: Vec<u8>) -> Result<ContentId, PublishError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(PublishError::Unavailable("publication target offline".into()))
    }
}
