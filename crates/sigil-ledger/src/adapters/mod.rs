//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports.

pub mod clock;
pub mod file_lock;
pub mod file_store;
pub mod memory;
pub mod signer;
pub mod zk;

pub use clock::{ManualClock, SystemPulseClock};
pub use file_lock::FileLockStore;
pub use file_store::{DirectoryPublisher, FileBackedLedgerStore};
pub use memory::{FailingPublisher, InMemoryLedgerStore, InMemoryLockStore, InMemoryPublisher};
pub use signer::{LocalKeySigner, RefusingSigner};
pub use zk::DigestCommitmentOracle;

use crate::domain::{ArtifactLedger, HeadCommitment, StoreError};
use sigil_types::Hash;

/// Fail unless `stored` is still at `expected`.
pub(crate) fn ensure_stored_head(
    artifact: &Hash,
    stored: Option<&ArtifactLedger>,
    expected: Option<&HeadCommitment>,
) -> Result<(), StoreError> {
    let current = stored
        .map(ArtifactLedger::head)
        .transpose()
        .map_err(|e| StoreError::Corrupt {
            key: artifact.to_hex(),
            reason: e.to_string(),
        })?;
    if current.as_ref() == expected {
        return Ok(());
    }

    let window_root = |head: Option<&HeadCommitment>| head.map_or(Hash::ZERO, |h| h.window_root);
    Err(StoreError::HeadMoved {
        key: artifact.to_hex(),
        expected: window_root(expected),
        actual: window_root(current.as_ref()),
    })
}
