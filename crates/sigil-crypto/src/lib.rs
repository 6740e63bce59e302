//! # Sigil Crypto - Canonical Encoding, Digests, Signatures
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `canonical` | Sorted-key compact JSON | Deterministic bytes for every hash |
//! | `hashing` | SHA-256 (primary), BLAKE3 (auxiliary) | Identity and cross-check digests |
//! | `signatures` | Ed25519 | Sender / receiver signatures |
//!
//! ## Security Properties
//!
//! - **Canonical bytes**: identical values always encode identically,
//!   independent of key insertion order.
//! - **Dual digest**: BLAKE3 is stored alongside SHA-256 so a break of one
//!   function is detectable; only SHA-256 is load-bearing for identity.
//! - **Ed25519**: deterministic nonces, no RNG dependency when signing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use canonical::{encode, encode_serializable, MAX_NESTING_DEPTH};
pub use errors::{CanonicalError, CryptoError};
pub use hashing::{
    aux_digest, digest, digest_canonical, digest_many, digest_serializable, dual_digest,
    DualDigest,
};
pub use signatures::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
