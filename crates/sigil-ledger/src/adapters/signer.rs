//! Local key signer.

use crate::domain::SigningError;
use crate::ports::SigningCapability;
use async_trait::async_trait;
use sigil_crypto::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Signing capability over an in-process key pair.
pub struct LocalKeySigner {
    keys: Ed25519KeyPair,
}

impl LocalKeySigner {
    /// Wrap a key pair.
    pub fn new(keys: Ed25519KeyPair) -> Self {
        Self { keys }
    }

    /// Signer from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::new(Ed25519KeyPair::from_seed(seed))
    }

    /// Signer with a fresh random key.
    pub fn generate() -> Self {
        Self::new(Ed25519KeyPair::generate())
    }
}

#[async_trait]
impl SigningCapability for LocalKeySigner {
    fn public_key(&self) -> Ed25519PublicKey {
        self.keys.public_key()
    }

    async fn sign(&self, message: &[u8]) -> Result<Ed25519Signature, SigningError> {
        Ok(self.keys.sign(message))
    }
}

/// Signer whose holder declines every request.
pub struct RefusingSigner {
    public_key: Ed25519PublicKey,
}

impl RefusingSigner {
    /// Refuse on behalf of `public_key`.
    pub fn new(public_key: Ed25519PublicKey) -> Self {
        Self { public_key }
    }
}

#[async_trait]
impl SigningCapability for RefusingSigner {
    fn public_key(&self) -> Ed25519PublicKey {
        self.public_key
    }

    async fn sign(&self, _message: &[u8]) -> Result<Ed25519Signature, SigningError> {
        Err(SigningError::Refused("holder declined".into()))
    }
}
