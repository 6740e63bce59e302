//! # Sigil Ledger API Implementation

use super::SigilLedgerService;
use crate::application::request::{InhaleReceipt, SendRequest};
use crate::domain::invariants;
use crate::domain::{
    verify_history, AmountRejection, ArtifactCore, ArtifactIdentity, ArtifactLedger, Balance,
    HeadCommitment, HeadStatus, HistoryProof, LedgerError, ShareLink,
};
use crate::ports::{SigilLedgerApi, SigningCapability};
use async_trait::async_trait;
use sigil_bus::LedgerEvent;
use sigil_types::{Amount, Hash};
use tracing::{debug, info, warn};

#[async_trait]
impl SigilLedgerApi for SigilLedgerService {
    async fn issue(
        &self,
        core: ArtifactCore,
        base: Amount,
        owner: &dyn SigningCapability,
    ) -> Result<ArtifactIdentity, LedgerError> {
        if base < Amount::ZERO {
            return Err(LedgerError::InvalidAmount {
                requested: base,
                remaining: Amount::ZERO,
                reason: AmountRejection::NotPositive,
            });
        }

        let identity = core.identity()?;
        let artifact = identity.canonical_hash;
        let result = self.issue_locked(identity, core, base, owner).await;
        self.retire_head_mutex(&artifact);
        result
    }

    async fn exhale(
        &self,
        artifact: Hash,
        signer: &dyn SigningCapability,
        request: SendRequest,
    ) -> Result<ShareLink, LedgerError> {
        let guard = self.lock_head(artifact, &request.token).await?;
        let result = self.exhale_locked(artifact, signer, &request).await;
        self.retire_head_mutex(&artifact);
        self.unlock_head(artifact, &request.token, guard).await;

        if let Err(e) = &result {
            warn!(artifact = %artifact.short(), amount = %request.amount, error = %e, "Exhale rejected");
        }
        result
    }

    async fn inhale(
        &self,
        share: &ShareLink,
        signer: &dyn SigningCapability,
    ) -> Result<InhaleReceipt, LedgerError> {
        // Never touch the ledger for a link that is not self-consistent.
        share.verify_integrity()?;

        let guard = self.lock_head(share.parent, &share.token).await?;
        let result = self.inhale_locked(share, signer).await;
        self.retire_head_mutex(&share.parent);
        self.unlock_head(share.parent, &share.token, guard).await;

        if let Err(e) = &result {
            warn!(
                artifact = %share.parent.short(),
                child = %share.child.short(),
                error = %e,
                "Inhale rejected"
            );
        }
        result
    }

    async fn balance(&self, artifact: Hash) -> Result<Balance, LedgerError> {
        let mut ledger = self.load_existing(&artifact)?;
        // Report an expired reservation as released even before the next
        // mutation persists the lapse.
        ledger.expire_lapsed(self.clock.now_pulse())?;
        ledger.balance()
    }

    async fn head(&self, artifact: Hash) -> Result<HeadCommitment, LedgerError> {
        self.load_existing(&artifact)?.head()
    }

    async fn ledger(&self, artifact: Hash) -> Result<ArtifactLedger, LedgerError> {
        self.load_existing(&artifact)
    }

    async fn prove_transfer(&self, artifact: Hash, sequence: u64) -> Result<HistoryProof, LedgerError> {
        self.load_existing(&artifact)?.prove(sequence)
    }

    async fn verify_history(&self, artifact: Hash, proof: &HistoryProof) -> Result<bool, LedgerError> {
        let head = self.load_existing(&artifact)?.head()?;
        Ok(verify_history(&head, proof))
    }

    async fn check_head(&self, artifact: Hash, claimed: &HeadCommitment) -> Result<HeadStatus, LedgerError> {
        let ledger = self.load_existing(&artifact)?;
        let status = ledger.compare_head(claimed)?;

        if status == HeadStatus::Diverged {
            let local_root = ledger.window.root()?;
            warn!(
                artifact = %artifact.short(),
                local_root = %local_root.short(),
                remote_root = %claimed.window_root.short(),
                local_segments = ledger.segments.len(),
                remote_segments = claimed.segment_count,
                "Peer head diverges from local history"
            );
            self.events
                .publish(LedgerEvent::HeadConflict {
                    artifact,
                    local_root,
                    remote_root: claimed.window_root,
                })
                .await;
        } else {
            debug!(artifact = %artifact.short(), status = ?status, "Compared peer head");
        }
        Ok(status)
    }
}

impl SigilLedgerService {
    async fn issue_locked(
        &self,
        identity: ArtifactIdentity,
        core: ArtifactCore,
        base: Amount,
        owner: &dyn SigningCapability,
    ) -> Result<ArtifactIdentity, LedgerError> {
        let artifact = identity.canonical_hash;
        let head = self.head_mutex(artifact);
        let _head = head.lock().await;

        if let Some(existing) = self.ledgers.load(&artifact)? {
            if existing.branch.base == base && existing.core.as_ref() == Some(&core) {
                debug!(artifact = %artifact.short(), "Artifact already issued");
                return Ok(existing.identity);
            }
            return Err(LedgerError::ArtifactExists(artifact));
        }

        let ledger = ArtifactLedger::issue(core, base, owner.public_key(), self.clock.now_pulse())?;
        invariants::check_ledger(&ledger)?;
        self.persist(&ledger, &mut None).await?;

        info!(
            artifact = %artifact.short(),
            aux = %identity.aux_hash.short(),
            base = %base,
            owner = %owner.public_key(),
            "Artifact issued"
        );
        self.events
            .publish(LedgerEvent::ArtifactIssued {
                artifact,
                parent: None,
                base,
            })
            .await;
        Ok(identity)
    }
}
