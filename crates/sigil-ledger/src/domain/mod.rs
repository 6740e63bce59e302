//! # Domain Layer
//!
//! Pure ledger logic: no I/O, no clocks, no keys.

pub mod accounting;
pub mod artifact;
pub mod child;
pub mod dedup;
pub mod errors;
pub mod hardened;
pub mod history;
pub mod invariants;
pub mod ledger;
pub mod lock;
pub mod merkle;
pub mod segment;
pub mod transfer;
pub mod window;

pub use accounting::Balance;
pub use artifact::{ArtifactCore, ArtifactIdentity};
pub use child::{derive_child_hash, ChildDerivation, ClaimWindow, DerivationStatus, ShareLink};
pub use dedup::SendDedupIndex;
pub use errors::{
    AmountRejection, LedgerError, LedgerResult, PublishError, SigningError, StoreError, ZkError,
};
pub use hardened::{HardenedLink, LinkBody, LinkReceive, LinkSend, ZkRef, ZkRefs};
pub use history::{verify_history, HeadCommitment, HeadStatus, HistoryProof};
pub use ledger::{ArtifactLedger, Branch, ExhaleDraft};
pub use lock::{LockHandle, LockKey, LockRecord};
pub use merkle::MerkleProof;
pub use segment::{Segment, SegmentLog};
pub use transfer::{
    ClosedTransfer, LapsedTransfer, Nonce, OpenTransfer, ReceiverHalf, SenderHalf, TransferRecord,
};
pub use window::TransferWindow;
