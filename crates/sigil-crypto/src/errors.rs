//! Crypto error types.

use thiserror::Error;

/// Canonical encoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    /// The value nests deeper than any acyclic metadata object can.
    ///
    /// Owned values cannot form reference cycles, so unbounded nesting is
    /// the only way a self-referential input can reach the encoder.
    #[error("cyclic structure: nesting exceeded {depth} levels")]
    CyclicStructure {
        /// Depth at which encoding stopped
        depth: usize,
    },

    /// The value could not be converted into the canonical data model.
    #[error("value is not encodable: {0}")]
    Unencodable(String),
}

/// Signature and key errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid public key
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Invalid key or signature length
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Input was not valid hex
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}
