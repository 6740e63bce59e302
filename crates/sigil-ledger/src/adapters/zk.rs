//! # Digest Commitment Oracle
//!
//! Stand-in for a real prover. The "proof" is a keyed BLAKE3 commitment to
//! the statement's canonical encoding, so it binds the statement but hides
//! nothing. Hosts with a real circuit plug in their own [`ZkOracle`].

use crate::domain::ZkError;
use crate::ports::{ZkOracle, ZkProof, ZkStatement};
use async_trait::async_trait;
use sigil_crypto::{aux_digest, digest_serializable};
use sigil_types::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const PROOF_DOMAIN: &[u8] = b"sigil/zk-commit";

/// Non-hiding commitment oracle.
#[derive(Debug, Default)]
pub struct DigestCommitmentOracle {
    offline: AtomicBool,
}

impl DigestCommitmentOracle {
    /// Create an oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `prove` calls fail, or succeed again.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn commitment(statement: &Hash) -> Vec<u8> {
        let mut input = PROOF_DOMAIN.to_vec();
        input.extend_from_slice(statement.as_bytes());
        aux_digest(&input).as_bytes().to_vec()
    }
}

#[async_trait]
impl ZkOracle for DigestCommitmentOracle {
    async fn prove(&self, statement: &ZkStatement) -> Result<ZkProof, ZkError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ZkError::ProveFailed("prover offline".into()));
        }
        let statement_hash =
            digest_serializable(statement).map_err(|e| ZkError::ProveFailed(e.to_string()))?;
        debug!(statement = %statement_hash.short(), kind = ?statement.kind, "Proved statement");
        Ok(ZkProof {
            statement: statement_hash,
            bytes: Self::commitment(&statement_hash),
        })
    }

    async fn verify(&self, statement: &ZkStatement, proof: &ZkProof) -> bool {
        match digest_serializable(statement) {
            Ok(hash) => hash == proof.statement && proof.bytes == Self::commitment(&hash),
            Err(_) => false,
        }
    }
}
