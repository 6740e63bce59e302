//! Artifact identity.

use super::errors::LedgerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sigil_crypto::{canonical, dual_digest};
use sigil_types::{Hash, Pulse};

/// The identity-bearing core of a sigil artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCore {
    /// Pulse at which the artifact was minted.
    pub creation_pulse: Pulse,
    /// Beat within the day.
    pub beat: u32,
    /// Step within the beat.
    pub step_index: u32,
    /// Day category label.
    pub day_category: String,
}

impl ArtifactCore {
    /// Canonical object the identity digest is taken over.
    pub fn canonical_value(&self) -> Value {
        json!({
            "beat": self.beat,
            "creation_pulse": self.creation_pulse,
            "day_category": self.day_category,
            "step_index": self.step_index,
        })
    }

    /// Compute the artifact's identity.
    pub fn identity(&self) -> Result<ArtifactIdentity, LedgerError> {
        let bytes = canonical::encode(&self.canonical_value())?;
        let digests = dual_digest(&bytes);
        Ok(ArtifactIdentity {
            canonical_hash: digests.primary,
            aux_hash: digests.auxiliary,
        })
    }
}

/// Content identity of an artifact.
///
/// `canonical_hash` is the identity used everywhere; `aux_hash` is a BLAKE3
/// cross-check over the same canonical bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    /// SHA-256 of the canonical core.
    pub canonical_hash: Hash,
    /// BLAKE3 of the canonical core.
    pub aux_hash: Hash,
}

impl ArtifactIdentity {
    /// Identity of a derivative, from the derived hash and the canonical
    /// bytes of its derivation record.
    pub fn derived(child: Hash, derivation_bytes: &[u8]) -> Self {
        Self {
            canonical_hash: child,
            aux_hash: dual_digest(derivation_bytes).auxiliary,
        }
    }
}
