//! # Send Lock Model
//!
//! A send is guarded by a lock keyed on (artifact, link token). The record
//! holds a random lock id and the pulse it was taken at. A record older
//! than the TTL is stale and may be displaced: a crashed holder must never
//! block the artifact forever.

use serde::{Deserialize, Serialize};
use sigil_types::{Hash, Pulse};
use uuid::Uuid;

/// Key a send lock is scoped to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey {
    /// Artifact being sent from.
    pub canonical_hash: Hash,
    /// Link token of the sending view.
    pub link_token: String,
}

impl LockKey {
    /// Create a key.
    pub fn new(canonical_hash: Hash, link_token: impl Into<String>) -> Self {
        Self {
            canonical_hash,
            link_token: link_token.into(),
        }
    }

    /// Stable storage key.
    pub fn storage_key(&self) -> String {
        format!("sigil:send-lock:{}:{}", self.canonical_hash, self.link_token)
    }
}

/// Stored lock state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Random id of the holder.
    pub lock_id: Uuid,
    /// Pulse the lock was taken at.
    pub acquired_at_pulse: Pulse,
}

impl LockRecord {
    /// Fresh record at `now`.
    pub fn new(now: Pulse) -> Self {
        Self {
            lock_id: Uuid::new_v4(),
            acquired_at_pulse: now,
        }
    }

    /// Pulse after which the record is stale.
    pub fn expires_at(&self, ttl: u64) -> Pulse {
        self.acquired_at_pulse.saturating_add(ttl)
    }

    /// Older than `ttl` pulses at `now`.
    pub fn is_stale(&self, now: Pulse, ttl: u64) -> bool {
        now > self.expires_at(ttl)
    }
}

/// Proof of holding a lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockHandle {
    /// Key held.
    pub key: LockKey,
    /// Record written at acquisition.
    pub record: LockRecord,
    /// Whether a stale holder was displaced.
    pub forced: bool,
}
