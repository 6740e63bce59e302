//! # Send Dedup Index
//!
//! Time-bounded index of recent sends keyed by their deterministic send id,
//! with a secondary lookup from (artifact, nonce). A caller retrying an
//! exhale with the nonce it already used gets the original share link back
//! instead of a second transfer.
//!
//! The index only spans the life of one service. Retries that arrive after
//! a restart are answered from the stored window instead
//! (see [`ArtifactLedger::replay_send`](super::ledger::ArtifactLedger::replay_send)).

use super::child::ShareLink;
use super::errors::LedgerError;
use super::transfer::Nonce;
use sigil_types::{Amount, Hash, Pulse};
use std::collections::HashMap;

struct DedupEntry {
    share: ShareLink,
    recorded_at: Pulse,
}

/// Recent sends by send id.
pub struct SendDedupIndex {
    sends: HashMap<Hash, DedupEntry>,
    by_nonce: HashMap<(Hash, Nonce), Hash>,
    retention_pulses: u64,
    gc_interval_pulses: u64,
    last_gc: Pulse,
}

impl SendDedupIndex {
    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: u64 = 100;

    /// Create an index retaining entries for `retention_pulses`.
    #[must_use]
    pub fn new(retention_pulses: u64) -> Self {
        Self::with_config(retention_pulses, Self::DEFAULT_GC_INTERVAL)
    }

    /// Create an index with a custom GC interval.
    #[must_use]
    pub fn with_config(retention_pulses: u64, gc_interval_pulses: u64) -> Self {
        Self {
            sends: HashMap::new(),
            by_nonce: HashMap::new(),
            retention_pulses,
            gc_interval_pulses,
            last_gc: 0,
        }
    }

    /// Look up a previous send with the same nonce.
    ///
    /// - `Ok(Some(link))`: replay of the same send
    /// - `Ok(None)`: nonce not seen
    /// - `Err(NonceReused)`: nonce already used for a different amount
    pub fn check(
        &mut self,
        artifact: &Hash,
        nonce: &Nonce,
        amount: Amount,
        now: Pulse,
    ) -> Result<Option<ShareLink>, LedgerError> {
        if now.saturating_sub(self.last_gc) > self.gc_interval_pulses {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        let entry = self
            .by_nonce
            .get(&(*artifact, nonce.clone()))
            .and_then(|id| self.sends.get(id));
        match entry {
            None => Ok(None),
            Some(entry) if entry.share.sender.amount == amount => Ok(Some(entry.share.clone())),
            Some(_) => Err(LedgerError::NonceReused {
                artifact: *artifact,
                nonce: nonce.to_string(),
            }),
        }
    }

    /// Remember a completed send.
    pub fn record(&mut self, share: ShareLink, now: Pulse) {
        let id = share.send_id;
        self.by_nonce
            .insert((share.parent, share.sender.nonce.clone()), id);
        self.sends.insert(
            id,
            DedupEntry {
                share,
                recorded_at: now,
            },
        );
    }

    /// Share link of an indexed send.
    #[must_use]
    pub fn get(&self, send_id: &Hash) -> Option<&ShareLink> {
        self.sends.get(send_id).map(|e| &e.share)
    }

    /// Whether a send with this id is indexed.
    #[must_use]
    pub fn contains_send(&self, send_id: &Hash) -> bool {
        self.sends.contains_key(send_id)
    }

    /// Number of indexed sends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sends.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }

    fn garbage_collect(&mut self, now: Pulse) {
        let threshold = now.saturating_sub(self.retention_pulses);
        self.sends.retain(|_, e| e.recorded_at >= threshold);
        let sends = &self.sends;
        self.by_nonce.retain(|_, id| sends.contains_key(id));
    }
}

impl Default for SendDedupIndex {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DEDUP_RETENTION_PULSES)
    }
}
