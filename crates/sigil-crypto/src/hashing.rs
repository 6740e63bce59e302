//! # Digests
//!
//! SHA-256 is the primary, identity-bearing digest. BLAKE3 is computed
//! alongside it as an auxiliary cross-check and is never used for identity.

use crate::canonical;
use crate::errors::CanonicalError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sigil_types::Hash;

/// Primary digest (SHA-256).
pub fn digest(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Primary digest over several inputs, fed in order.
pub fn digest_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input);
    }
    Hash(hasher.finalize().into())
}

/// Auxiliary digest (BLAKE3).
pub fn aux_digest(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

/// Both digests of the same bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualDigest {
    /// SHA-256; load-bearing for identity.
    pub primary: Hash,
    /// BLAKE3; stored for cross-checking only.
    pub auxiliary: Hash,
}

impl DualDigest {
    /// Re-derive both digests from `data` and compare.
    pub fn matches(&self, data: &[u8]) -> bool {
        *self == dual_digest(data)
    }
}

/// Compute both digests.
pub fn dual_digest(data: &[u8]) -> DualDigest {
    DualDigest {
        primary: digest(data),
        auxiliary: aux_digest(data),
    }
}

/// Primary digest of the canonical encoding of `value`.
pub fn digest_canonical(value: &Value) -> Result<Hash, CanonicalError> {
    Ok(digest(&canonical::encode(value)?))
}

/// Primary digest of the canonical encoding of a serializable value.
pub fn digest_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Hash, CanonicalError> {
    Ok(digest(&canonical::encode_serializable(value)?))
}
