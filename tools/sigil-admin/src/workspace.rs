//! # Data Directory Workspace
//!
//! Wires the ledger service to file-backed collaborators under one data
//! directory:
//!
//! ```text
//! <data-dir>/
//! ├── ledgers/     one JSON file per artifact
//! ├── locks/       send-lock records shared by every process
//! ├── published/   content-addressed window snapshots
//! └── keys/        hex key seeds
//! ```

use crate::keys::KeyRing;
use anyhow::{Context, Result};
use sigil_bus::NoopPublisher;
use sigil_crypto::Ed25519PublicKey;
use sigil_ledger::adapters::{
    DirectoryPublisher, FileBackedLedgerStore, FileLockStore, SystemPulseClock,
};
use sigil_ledger::application::SigilLedgerDependencies;
use sigil_ledger::{
    ArtifactCore, ArtifactIdentity, ArtifactLedger, Balance, HeadCommitment, HistoryProof,
    InhaleReceipt, LedgerConfig, SendRequest, ShareLink, SigilLedgerApi, SigilLedgerService,
    TimeSource,
};
use sigil_types::{Amount, Hash};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Core fields for a new root artifact. A missing pulse means "now".
pub struct IssueParams {
    pub creation_pulse: Option<u64>,
    pub beat: u32,
    pub step_index: u32,
    pub day_category: String,
    pub base: Amount,
}

/// Service plus key ring over one data directory.
pub struct Workspace {
    service: SigilLedgerService,
    clock: Arc<SystemPulseClock>,
    keys: KeyRing,
}

impl Workspace {
    /// Open (creating if needed) the workspace at `root`.
    pub fn open(root: impl AsRef<Path>, config: LedgerConfig) -> Result<Self> {
        let root = root.as_ref();
        let clock = Arc::new(SystemPulseClock::default());

        let ledgers = FileBackedLedgerStore::open(root.join("ledgers"))
            .context("Failed to open ledger store")?;
        let locks = FileLockStore::open(root.join("locks")).context("Failed to open lock store")?;
        let publisher = DirectoryPublisher::open(root.join("published"))
            .context("Failed to open publication directory")?;

        let deps = SigilLedgerDependencies {
            clock: clock.clone(),
            locks: Arc::new(locks),
            ledgers: Arc::new(ledgers),
            publisher: Arc::new(publisher),
            events: Arc::new(NoopPublisher),
            zk: None,
        };
        let service = SigilLedgerService::new(deps, config).context("Invalid ledger configuration")?;
        let keys = KeyRing::open(root.join("keys"))?;

        info!(data_dir = %root.display(), "Opened sigil workspace");
        Ok(Self {
            service,
            clock,
            keys,
        })
    }

    pub fn keygen(&self, name: &str, force: bool) -> Result<Ed25519PublicKey> {
        let public = self.keys.generate(name, force)?;
        info!(key = name, public_key = %public, "Generated key");
        Ok(public)
    }

    pub async fn issue(&self, key: &str, params: IssueParams) -> Result<ArtifactIdentity> {
        let owner = self.keys.load(key)?;
        let core = ArtifactCore {
            creation_pulse: params
                .creation_pulse
                .unwrap_or_else(|| self.clock.now_pulse()),
            beat: params.beat,
            step_index: params.step_index,
            day_category: params.day_category,
        };
        self.service
            .issue(core, params.base, &owner)
            .await
            .context("Issue failed")
    }

    pub async fn send(&self, key: &str, artifact: Hash, request: SendRequest) -> Result<ShareLink> {
        let signer = self.keys.load(key)?;
        self.service
            .exhale(artifact, &signer, request)
            .await
            .with_context(|| format!("Send from {} failed", artifact.short()))
    }

    pub async fn receive(&self, key: &str, share: &ShareLink) -> Result<InhaleReceipt> {
        let signer = self.keys.load(key)?;
        self.service
            .inhale(share, &signer)
            .await
            .with_context(|| format!("Receive of {} failed", share.child.short()))
    }

    pub async fn balance(&self, artifact: Hash) -> Result<Balance> {
        Ok(self.service.balance(artifact).await?)
    }

    pub async fn head(&self, artifact: Hash) -> Result<HeadCommitment> {
        Ok(self.service.head(artifact).await?)
    }

    pub async fn show(&self, artifact: Hash) -> Result<ArtifactLedger> {
        Ok(self.service.ledger(artifact).await?)
    }

    /// Proof for `sequence` and whether it checks against the current head.
    pub async fn prove(&self, artifact: Hash, sequence: u64) -> Result<(HistoryProof, bool)> {
        let proof = self.service.prove_transfer(artifact, sequence).await?;
        let verified = self.service.verify_history(artifact, &proof).await?;
        Ok((proof, verified))
    }

    pub fn list(&self) -> Result<Vec<Hash>> {
        Ok(self.service.artifacts()?)
    }
}
