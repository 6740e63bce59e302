//! # Domain Errors
//!
//! Error taxonomy for the sigil ledger. Collaborator failures (storage,
//! signing, publication, ZK) have their own enums so adapters can report
//! them without knowing about the transfer state machine.

use sigil_crypto::CanonicalError;
use sigil_types::{Amount, AmountError, Hash, Pulse};
use thiserror::Error;

/// Why a requested send amount was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRejection {
    /// Zero or negative.
    NotPositive,
    /// Larger than base minus spent minus pending.
    ExceedsRemaining,
}

impl std::fmt::Display for AmountRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive => f.write_str("amount must be positive"),
            Self::ExceedsRemaining => f.write_str("amount exceeds remaining balance"),
        }
    }
}

/// Sigil ledger error types.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Requested amount is not spendable.
    #[error("Invalid amount {requested} (remaining {remaining}): {reason}")]
    InvalidAmount {
        /// Amount asked for
        requested: Amount,
        /// Spendable balance at the time of the request
        remaining: Amount,
        /// Rejection reason
        reason: AmountRejection,
    },

    /// The head record is still open; a new exhale must wait.
    #[error("Transfer in flight on {artifact} at index {index} (claimable until pulse {expire_pulse})")]
    TransferInFlight {
        /// Sending artifact
        artifact: Hash,
        /// Index of the open record
        index: usize,
        /// Pulse after which the open record lapses
        expire_pulse: Pulse,
    },

    /// Another send holds the lock for this artifact and link token.
    #[error("Send lock {key} held since pulse {held_since} (stale after pulse {expires_at}, now {now})")]
    LockHeld {
        /// Storage key of the lock
        key: String,
        /// Pulse the holder acquired it
        held_since: Pulse,
        /// Pulse after which it may be force-acquired
        expires_at: Pulse,
        /// Current pulse
        now: Pulse,
    },

    /// The transfer was already closed; closed records are write-once.
    #[error("Transfer {index} on {artifact} already closed")]
    AlreadyClosed {
        /// Sending artifact
        artifact: Hash,
        /// Index of the record
        index: usize,
    },

    /// The claim window has passed.
    #[error("Claim window expired at pulse {expire_pulse} (now {now})")]
    Expired {
        /// Last claimable pulse
        expire_pulse: Pulse,
        /// Current pulse
        now: Pulse,
    },

    /// A content hash and its declared signature disagree.
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    /// Canonical encoding hit a self-referential structure.
    #[error("Cyclic structure: nesting exceeded {depth} levels")]
    CyclicStructure {
        /// Depth at which encoding stopped
        depth: usize,
    },

    /// Canonical encoding failed for another reason.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// A Merkle or history proof is structurally invalid.
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// Requested proof position does not exist.
    #[error("Proof index {index} out of range (length {len})")]
    ProofIndexOutOfRange {
        /// Requested position
        index: u64,
        /// Number of available leaves
        len: u64,
    },

    /// The artifact is hardened; every new record must carry a link.
    #[error("Artifact {artifact} is hardened; record {index} must carry a hardened link")]
    HardeningGap {
        /// Sending artifact
        artifact: Hash,
        /// Index the unlinked record would have taken
        index: usize,
    },

    /// The window changed between preparing and committing a send.
    #[error("Head moved: expected {expected}, found {actual}")]
    HeadMoved {
        /// Root the send was prepared against
        expected: Hash,
        /// Current root
        actual: Hash,
    },

    /// No record in the window matches the derivative.
    #[error("No transfer for derivative {child} on {artifact}")]
    UnknownDerivative {
        /// Sending artifact
        artifact: Hash,
        /// Derivative identity
        child: Hash,
    },

    /// Same nonce reused for a different send.
    #[error("Nonce {nonce} already used on {artifact} for a different send")]
    NonceReused {
        /// Sending artifact
        artifact: Hash,
        /// Reused nonce
        nonce: String,
    },

    /// Artifact has no ledger.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(Hash),

    /// A ledger already exists with different parameters.
    #[error("Artifact {0} already exists with a different base")]
    ArtifactExists(Hash),

    /// A structural invariant does not hold.
    #[error("Invariant {invariant} violated: {detail}")]
    InvariantViolated {
        /// Invariant name
        invariant: &'static str,
        /// What was found
        detail: String,
    },

    /// Fixed-point arithmetic failed.
    #[error(transparent)]
    Arithmetic(#[from] AmountError),

    /// Durable storage failed.
    #[error(transparent)]
    Storage(StoreError),

    /// The signing capability failed.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The ZK oracle failed or returned an unverifiable proof.
    #[error(transparent)]
    Zk(#[from] ZkError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::HeadMoved { expected, actual, .. } => Self::HeadMoved { expected, actual },
            other => Self::Storage(other),
        }
    }
}

impl From<CanonicalError> for LedgerError {
    fn from(err: CanonicalError) -> Self {
        match err {
            CanonicalError::CyclicStructure { depth } => Self::CyclicStructure { depth },
            CanonicalError::Unencodable(msg) => Self::Encoding(msg),
        }
    }
}

/// Durable storage errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be decoded.
    #[error("Corrupt record {key}: {reason}")]
    Corrupt {
        /// Record key
        key: String,
        /// Decode failure
        reason: String,
    },

    /// The stored ledger is no longer the one the write was based on.
    #[error("Stored head of {key} moved: expected {expected}, found {actual}")]
    HeadMoved {
        /// Record key
        key: String,
        /// Window root the writer loaded (zero for a new ledger)
        expected: Hash,
        /// Window root now stored (zero when absent)
        actual: Hash,
    },

    /// Another process holds the storage directory.
    #[error("Storage directory locked by another process: {0}")]
    DirectoryLocked(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Signing capability errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// The holder declined to sign.
    #[error("Signing refused: {0}")]
    Refused(String),

    /// The key is not available.
    #[error("Signing key unavailable")]
    Unavailable,
}

/// ZK oracle errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ZkError {
    /// Proof generation failed.
    #[error("Proof generation failed: {0}")]
    ProveFailed(String),

    /// The oracle returned a proof it does not itself accept.
    #[error("Proof rejected for statement {0}")]
    Rejected(Hash),
}

/// Publication errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The publication target is unreachable.
    #[error("Publication unavailable: {0}")]
    Unavailable(String),

    /// The target refused the content.
    #[error("Publication rejected: {0}")]
    Rejected(String),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
