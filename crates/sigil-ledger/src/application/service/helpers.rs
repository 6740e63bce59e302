//! # Service Helpers
//!
//! Loading, head settling, lock bookkeeping, publication and ZK plumbing
//! shared by the API implementation.

use super::SigilLedgerService;
use crate::application::send_lock::LockGuard;
use crate::domain::{
    ArtifactLedger, HeadCommitment, LedgerError, LockKey, Segment, StoreError, ZkRef,
};
use crate::ports::{ZkStatement, ZkStatementKind};
use sigil_bus::LedgerEvent;
use sigil_crypto::digest;
use sigil_types::{ContentId, Hash, Pulse};
use std::sync::Arc;
use tracing::{debug, info, warn};

impl SigilLedgerService {
    /// Mutex serializing mutations of `artifact` within this process.
    pub(crate) fn head_mutex(&self, artifact: Hash) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.heads.lock().entry(artifact).or_default())
    }

    /// Forget the head mutex of `artifact` once no task holds or awaits it.
    ///
    /// Callers must have dropped their own handle from [`Self::head_mutex`].
    pub(crate) fn retire_head_mutex(&self, artifact: &Hash) {
        let mut heads = self.heads.lock();
        if heads.get(artifact).is_some_and(|m| Arc::strong_count(m) == 1) {
            heads.remove(artifact);
        }
    }

    /// Persist `ledger` over the head it was loaded at.
    ///
    /// `loaded` is `None` for a ledger that must not exist yet, and advances
    /// to the written head on success so the caller can save again.
    pub(crate) async fn persist(
        &self,
        ledger: &ArtifactLedger,
        loaded: &mut Option<HeadCommitment>,
    ) -> Result<(), LedgerError> {
        let head = ledger.head()?;
        match self.ledgers.save_if(ledger, loaded.as_ref()) {
            Ok(()) => {
                *loaded = Some(head);
                Ok(())
            }
            Err(StoreError::HeadMoved { key, expected, actual }) => {
                let artifact = ledger.canonical_hash();
                warn!(
                    artifact = %artifact.short(),
                    expected = %expected.short(),
                    actual = %actual.short(),
                    "Ledger changed under a concurrent writer, write dropped"
                );
                self.events
                    .publish(LedgerEvent::HeadConflict {
                        artifact,
                        local_root: head.window_root,
                        remote_root: actual,
                    })
                    .await;
                Err(StoreError::HeadMoved { key, expected, actual }.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load a ledger that must exist.
    pub(crate) fn load_existing(&self, artifact: &Hash) -> Result<ArtifactLedger, LedgerError> {
        self.ledgers
            .load(artifact)?
            .ok_or(LedgerError::ArtifactNotFound(*artifact))
    }

    /// Take the send lock for (artifact, token) and announce it.
    pub(crate) async fn lock_head(&self, artifact: Hash, token: &str) -> Result<LockGuard, LedgerError> {
        let guard = self.send_lock.guard(LockKey::new(artifact, token))?;
        let forced = guard.forced();
        if forced {
            warn!(artifact = %artifact.short(), token, "Send lock force-acquired from stale holder");
        }
        self.events
            .publish(LedgerEvent::LockAcquired {
                artifact,
                token: token.to_string(),
                forced,
            })
            .await;
        Ok(guard)
    }

    /// Release a send lock on every exit path and announce it.
    pub(crate) async fn unlock_head(&self, artifact: Hash, token: &str, guard: LockGuard) {
        match guard.release() {
            Ok(true) => {
                debug!(artifact = %artifact.short(), token, "Send lock released");
                self.events
                    .publish(LedgerEvent::LockReleased {
                        artifact,
                        token: token.to_string(),
                    })
                    .await;
            }
            Ok(false) => {
                warn!(artifact = %artifact.short(), token, "Send lock was displaced before release");
            }
            Err(e) => {
                warn!(artifact = %artifact.short(), token, error = %e, "Failed to release send lock");
            }
        }
    }

    /// Lapse an expired head record and seal a full settled window.
    ///
    /// Returns whether the ledger changed and must be saved.
    pub(crate) async fn settle_head(
        &self,
        ledger: &mut ArtifactLedger,
        now: Pulse,
    ) -> Result<bool, LedgerError> {
        let artifact = ledger.canonical_hash();
        let mut changed = false;

        if let Some((index, lapsed)) = ledger.expire_lapsed(now)? {
            info!(
                artifact = %artifact.short(),
                index,
                child = %lapsed.child.short(),
                expire_pulse = lapsed.expire_pulse,
                now,
                "Transfer lapsed unclaimed"
            );
            self.events
                .publish(LedgerEvent::TransferLapsed {
                    artifact,
                    index,
                    child: lapsed.child,
                    expire_pulse: lapsed.expire_pulse,
                })
                .await;
            changed = true;
        }

        if self.seal_if_full(ledger, now).await?.is_some() {
            changed = true;
        }
        Ok(changed)
    }

    /// Seal the window if it reached the segment size with nothing open.
    pub(crate) async fn seal_if_full(
        &self,
        ledger: &mut ArtifactLedger,
        now: Pulse,
    ) -> Result<Option<Segment>, LedgerError> {
        let sealed = ledger.maybe_seal(self.config.segment_size, now)?;
        if let Some(segment) = &sealed {
            self.announce_seal(ledger, segment).await;
        }
        Ok(sealed)
    }

    /// Log and publish a freshly sealed segment.
    pub(crate) async fn announce_seal(&self, ledger: &ArtifactLedger, segment: &Segment) {
        let artifact = ledger.canonical_hash();
        let segments_root = ledger.segments.segments_root();
        info!(
            artifact = %artifact.short(),
            segment = segment.index,
            count = segment.count,
            root = %segment.root.short(),
            segments_root = %segments_root.short(),
            "Sealed transfer window into segment"
        );
        self.events
            .publish(LedgerEvent::SegmentSealed {
                artifact,
                segment_index: segment.index as usize,
                root: segment.root,
                count: segment.count,
                segments_root,
            })
            .await;
    }

    /// Publish a window snapshot. Failure degrades to a local id.
    pub(crate) async fn publish_snapshot(&self, artifact: Hash, bytes: Vec<u8>) -> ContentId {
        let local = ContentId::local_fallback(&digest(&bytes));
        let content_id = match self.publisher.publish(bytes).await {
            Ok(id) => {
                debug!(artifact = %artifact.short(), content_id = %id, "Published window");
                id
            }
            Err(e) => {
                warn!(
                    artifact = %artifact.short(),
                    error = %e,
                    fallback = %local,
                    "Window publication failed, keeping local id"
                );
                local
            }
        };
        self.events
            .publish(LedgerEvent::WindowPublished {
                artifact,
                content_id: content_id.clone(),
            })
            .await;
        content_id
    }

    /// Ask the ZK oracle for a proof reference.
    ///
    /// No oracle, a failed proof or a proof the oracle itself rejects all
    /// yield `None`; the link is then recorded without a proof.
    pub(crate) async fn prove_zk(
        &self,
        kind: ZkStatementKind,
        artifact: Hash,
        previous_head_root: Hash,
        leaf_hash: Hash,
    ) -> Option<ZkRef> {
        let oracle = self.zk.as_ref()?;
        let statement = ZkStatement {
            kind,
            artifact,
            previous_head_root,
            leaf_hash,
        };

        let proof = match oracle.prove(&statement).await {
            Ok(proof) => proof,
            Err(e) => {
                warn!(artifact = %artifact.short(), kind = ?kind, error = %e, "ZK proof unavailable");
                return None;
            }
        };
        if !oracle.verify(&statement, &proof).await {
            warn!(artifact = %artifact.short(), kind = ?kind, "ZK oracle rejected its own proof");
            return None;
        }
        Some(ZkRef {
            statement: proof.statement,
            proof_hash: digest(&proof.bytes),
        })
    }
}
