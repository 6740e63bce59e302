//! # Send Lock
//!
//! Serializes sends per (artifact, link token) across every context sharing
//! a [`LockStore`]. Acquisition is a compare-and-swap against the record
//! last read; a stale record is displaced the same way, so two contexts
//! racing to recover an abandoned lock cannot both win.

use crate::domain::{LedgerError, LockHandle, LockKey, LockRecord};
use crate::ports::{LockStore, TimeSource};
use std::sync::Arc;
use tracing::{debug, warn};

/// Attempts before a contended lock is reported as held.
const MAX_CAS_ATTEMPTS: usize = 3;

/// Lock manager over a shared [`LockStore`].
#[derive(Clone)]
pub struct SendLock {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn TimeSource>,
    ttl_pulses: u64,
}

impl SendLock {
    /// Create a lock manager with the given staleness threshold.
    pub fn new(store: Arc<dyn LockStore>, clock: Arc<dyn TimeSource>, ttl_pulses: u64) -> Self {
        Self {
            store,
            clock,
            ttl_pulses,
        }
    }

    /// Staleness threshold in pulses.
    pub fn ttl_pulses(&self) -> u64 {
        self.ttl_pulses
    }

    /// Take the lock for `key`.
    ///
    /// Fails with `LockHeld` while a fresh record exists. A stale record is
    /// displaced and the handle is marked `forced`.
    pub fn acquire(&self, key: LockKey) -> Result<LockHandle, LedgerError> {
        let mut last_seen = None;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let now = self.clock.now_pulse();
            let current = self.store.get(&key)?;

            let forced = match &current {
                None => false,
                Some(held) if held.is_stale(now, self.ttl_pulses) => true,
                Some(held) => return Err(self.held_error(&key, held, now)),
            };

            let record = LockRecord::new(now);
            if self.store.compare_and_swap(&key, current.as_ref(), record)? {
                if forced {
                    warn!(
                        key = %key.storage_key(),
                        stale_since = current.map(|r| r.acquired_at_pulse).unwrap_or_default(),
                        now,
                        "Displaced stale send lock"
                    );
                } else {
                    debug!(key = %key.storage_key(), now, "Send lock acquired");
                }
                return Ok(LockHandle { key, record, forced });
            }
            last_seen = current;
        }

        // Lost every race; report whoever holds it now.
        let now = self.clock.now_pulse();
        let holder = self.store.get(&key)?.or(last_seen);
        match holder {
            Some(held) => Err(self.held_error(&key, &held, now)),
            None => Err(LedgerError::LockHeld {
                key: key.storage_key(),
                held_since: now,
                expires_at: now.saturating_add(self.ttl_pulses),
                now,
            }),
        }
    }

    /// Take the lock and wrap it in a guard that releases on drop.
    pub fn guard(&self, key: LockKey) -> Result<LockGuard, LedgerError> {
        let handle = self.acquire(key)?;
        Ok(LockGuard {
            store: Arc::clone(&self.store),
            handle: Some(handle),
        })
    }

    /// Release `handle`. Returns false if another context displaced it.
    pub fn release(&self, handle: &LockHandle) -> Result<bool, LedgerError> {
        Ok(self
            .store
            .remove_if_held(&handle.key, handle.record.lock_id)?)
    }

    fn held_error(&self, key: &LockKey, held: &LockRecord, now: u64) -> LedgerError {
        LedgerError::LockHeld {
            key: key.storage_key(),
            held_since: held.acquired_at_pulse,
            expires_at: held.expires_at(self.ttl_pulses),
            now,
        }
    }
}

/// Holds a send lock until released or dropped.
pub struct LockGuard {
    store: Arc<dyn LockStore>,
    handle: Option<LockHandle>,
}

impl LockGuard {
    /// Handle of the held lock.
    pub fn handle(&self) -> Option<&LockHandle> {
        self.handle.as_ref()
    }

    /// Whether a stale holder was displaced to take the lock.
    pub fn forced(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.forced)
    }

    /// Release now. Returns whether our record was still the holder.
    pub fn release(mut self) -> Result<bool, LedgerError> {
        match self.handle.take() {
            Some(handle) => Ok(self
                .store
                .remove_if_held(&handle.key, handle.record.lock_id)?),
            None => Ok(false),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self
                .store
                .remove_if_held(&handle.key, handle.record.lock_id)
            {
                warn!(key = %handle.key.storage_key(), error = %e, "Failed to release send lock");
            }
        }
    }
}
