//! # Sigil Ledger
//!
//! Ownership and transfer protocol for sigil artifacts.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Every artifact carries a single-writer transfer window. An *exhale* opens
//! a transfer and mints a derivative identity that can be handed to a
//! recipient as a share link; an *inhale* closes it with the recipient's
//! signature. Windows are committed by Merkle roots, optionally hardened by
//! chain-linked dual signatures, and sealed into immutable segments once
//! full. Value moves as fixed-point micro-units and can never go negative.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforced by |
//! |-----------|-------------|
//! | At most one open transfer per head | `ArtifactLedger::prepare_exhale` (`TransferInFlight`) |
//! | Closed records are write-once | `OpenTransfer::close` consumes the open record |
//! | Hardening never drops mid-chain | `TransferWindow::Hardened` has no plain slot after the first link |
//! | Remaining balance never negative | `accounting::ensure_can_spend` before any append |
//! | At most one in-flight send per (artifact, token) | `SendLock` + `LockGuard` |
//! | Replayed sends are idempotent | `SendDedupIndex` keyed by (artifact, nonce) |
//!
//! ## Module Structure
//!
//! ```text
//! sigil-ledger/
//! ├── domain/        # Merkle engine, transfer records, hardening, derivation,
//! │                  # segments, accounting, send lock, invariants
//! ├── ports/         # Inbound API + outbound collaborators (clock, signer,
//! │                  # lock store, ledger store, publication, ZK oracle)
//! ├── adapters/      # In-memory and file-backed collaborators
//! ├── application/   # SigilLedgerService orchestrating everything
//! └── config.rs      # LedgerConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use application::{InhaleReceipt, SendRequest, SigilLedgerService};
pub use config::{ConfigError, LedgerConfig};
pub use domain::{
    AmountRejection, ArtifactCore, ArtifactIdentity, ArtifactLedger, Balance, ChildDerivation,
    ClaimWindow, DerivationStatus, HardenedLink, HeadCommitment, HeadStatus, HistoryProof,
    LedgerError, LockHandle, LockKey, LockRecord, MerkleProof, Nonce, Segment, SegmentLog,
    ShareLink, TransferRecord, TransferWindow,
};
pub use ports::{
    LedgerStore, LockStore, PublicationAdapter, PublishError, SigilLedgerApi, SigningCapability,
    SigningError, StoreError, TimeSource, ZkError, ZkOracle, ZkProof, ZkStatement,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
