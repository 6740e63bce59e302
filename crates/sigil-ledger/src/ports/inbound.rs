//! # Inbound Ports
//!
//! API exposed to hosts (wallet UI, CLI, sync workers).

use super::outbound::SigningCapability;
use crate::application::{InhaleReceipt, SendRequest};
use crate::domain::{
    ArtifactCore, ArtifactIdentity, ArtifactLedger, Balance, HeadCommitment, HeadStatus,
    HistoryProof, LedgerError, ShareLink,
};
use async_trait::async_trait;
use sigil_types::{Amount, Hash};

/// Sigil ledger API - inbound port.
#[async_trait]
pub trait SigilLedgerApi: Send + Sync {
    /// Issue a root artifact with `base` allocation, owned by `owner`.
    ///
    /// Idempotent for the same core and base.
    async fn issue(
        &self,
        core: ArtifactCore,
        base: Amount,
        owner: &dyn SigningCapability,
    ) -> Result<ArtifactIdentity, LedgerError>;

    /// Open a transfer out of `artifact`.
    async fn exhale(
        &self,
        artifact: Hash,
        signer: &dyn SigningCapability,
        request: SendRequest,
    ) -> Result<ShareLink, LedgerError>;

    /// Claim the derivative described by `share`.
    async fn inhale(
        &self,
        share: &ShareLink,
        signer: &dyn SigningCapability,
    ) -> Result<InhaleReceipt, LedgerError>;

    /// Balance of `artifact`.
    async fn balance(&self, artifact: Hash) -> Result<Balance, LedgerError>;

    /// Head commitment of `artifact`.
    async fn head(&self, artifact: Hash) -> Result<HeadCommitment, LedgerError>;

    /// Snapshot of the whole ledger.
    async fn ledger(&self, artifact: Hash) -> Result<ArtifactLedger, LedgerError>;

    /// Inclusion proof for the transfer at history position `sequence`.
    async fn prove_transfer(&self, artifact: Hash, sequence: u64) -> Result<HistoryProof, LedgerError>;

    /// Check a proof against the current head of `artifact`.
    async fn verify_history(&self, artifact: Hash, proof: &HistoryProof) -> Result<bool, LedgerError>;

    /// Compare a peer's head with ours.
    async fn check_head(&self, artifact: Hash, claimed: &HeadCommitment) -> Result<HeadStatus, LedgerError>;
}
