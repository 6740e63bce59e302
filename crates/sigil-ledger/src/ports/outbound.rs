//! # Outbound Ports
//!
//! Collaborators the ledger service needs from its host: a pulse clock, a
//! signing capability, lock storage, ledger storage, a publication target,
//! and an optional ZK prover.

use crate::domain::{
    ArtifactLedger, HeadCommitment, LockKey, LockRecord, PublishError, SigningError, StoreError, ZkError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigil_crypto::{Ed25519PublicKey, Ed25519Signature};
use sigil_types::{ContentId, Hash, Pulse};
use uuid::Uuid;

/// Source of the current pulse.
///
/// Must never run backwards.
pub trait TimeSource: Send + Sync {
    /// Current pulse.
    fn now_pulse(&self) -> Pulse;
}

/// Holder of a private key.
///
/// The ledger never sees key material; it asks for signatures over
/// canonical message bytes.
#[async_trait]
pub trait SigningCapability: Send + Sync {
    /// Public key of the holder.
    fn public_key(&self) -> Ed25519PublicKey;

    /// Sign `message`.
    async fn sign(&self, message: &[u8]) -> Result<Ed25519Signature, SigningError>;
}

/// Shared storage for send locks.
///
/// Production: `FileLockStore` (cross-process)
/// Testing: `InMemoryLockStore`
pub trait LockStore: Send + Sync {
    /// Current record under `key`.
    fn get(&self, key: &LockKey) -> Result<Option<LockRecord>, StoreError>;

    /// Replace the record under `key` with `new` only if it currently
    /// equals `expected`. Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        key: &LockKey,
        expected: Option<&LockRecord>,
        new: LockRecord,
    ) -> Result<bool, StoreError>;

    /// Remove the record under `key` only if it holds `lock_id`.
    /// Returns whether a record was removed.
    fn remove_if_held(&self, key: &LockKey, lock_id: Uuid) -> Result<bool, StoreError>;
}

/// Durable storage for artifact ledgers.
pub trait LedgerStore: Send + Sync {
    /// Load a ledger.
    fn load(&self, artifact: &Hash) -> Result<Option<ArtifactLedger>, StoreError>;

    /// Persist a ledger if the stored head is still `expected`.
    ///
    /// `None` requires that nothing is stored for the artifact yet. When the
    /// stored head differs nothing is written and the call fails with
    /// [`StoreError::HeadMoved`]. The check and the write are atomic with
    /// respect to every other writer of the same store.
    fn save_if(
        &self,
        ledger: &ArtifactLedger,
        expected: Option<&HeadCommitment>,
    ) -> Result<(), StoreError>;

    /// Canonical hashes of every stored ledger.
    fn list(&self) -> Result<Vec<Hash>, StoreError>;
}

/// Content-addressed publication target.
#[async_trait]
pub trait PublicationAdapter: Send + Sync {
    /// Publish `bytes`, returning the content id.
    async fn publish(&self, bytes: Vec<u8>) -> Result<ContentId, PublishError>;
}

/// Statement submitted to the ZK oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkStatement {
    /// Which half is being proven.
    pub kind: ZkStatementKind,
    /// Artifact the transfer belongs to.
    pub artifact: Hash,
    /// Root the link chains from.
    pub previous_head_root: Hash,
    /// Leaf hash being proven.
    pub leaf_hash: Hash,
}

/// Half of a transfer a statement covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZkStatementKind {
    /// The exhale.
    Send,
    /// The inhale.
    Receive,
}

/// Proof returned by the ZK oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkProof {
    /// Digest of the statement the proof is for.
    pub statement: Hash,
    /// Opaque proof bytes.
    pub bytes: Vec<u8>,
}

/// Optional zero-knowledge prover.
#[async_trait]
pub trait ZkOracle: Send + Sync {
    /// Produce a proof for `statement`.
    async fn prove(&self, statement: &ZkStatement) -> Result<ZkProof, ZkError>;

    /// Check a proof against its statement.
    async fn verify(&self, statement: &ZkStatement, proof: &ZkProof) -> bool;
}
