//! # Hardened Links
//!
//! Chain-linked, doubly-signed companions to transfer records. Each link
//! commits to the window root as it stood before its record was appended,
//! so links cannot be reordered or dropped without breaking a signature.

use super::errors::LedgerError;
use super::transfer::Nonce;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sigil_crypto::{canonical, Ed25519PublicKey, Ed25519Signature};
use sigil_types::{Hash, Pulse};

/// Sender side of a link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSend {
    /// Window root before the record was appended.
    pub previous_head_root: Hash,
    /// Sender's public key.
    pub sender_pubkey: Ed25519PublicKey,
    /// Pulse of the exhale.
    pub sender_pulse: Pulse,
    /// Nonce of the send.
    pub nonce: Nonce,
    /// Leaf hash of the sender half.
    pub leaf_hash_send: Hash,
    /// Signature over [`link_send_message`].
    pub sender_sig: Ed25519Signature,
}

/// Receiver side of a link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReceive {
    /// Receiver's public key.
    pub receiver_pubkey: Ed25519PublicKey,
    /// Pulse of the inhale.
    pub receiver_pulse: Pulse,
    /// Leaf hash of the closed record.
    pub leaf_hash_receive: Hash,
    /// Signature over [`link_receive_message`].
    pub receiver_sig: Ed25519Signature,
}

/// Reference to a proof produced by the ZK oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkRef {
    /// Digest of the statement that was proven.
    pub statement: Hash,
    /// Digest of the proof bytes.
    pub proof_hash: Hash,
}

/// Proof references for both halves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkRefs {
    /// Proof over the send.
    pub send: ZkRef,
    /// Proof over the receive, once closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive: Option<ZkRef>,
}

/// Signed content of a link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBody {
    /// Sender side.
    pub send: LinkSend,
    /// Receiver side, once closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive: Option<LinkReceive>,
}

/// A hardened link, with or without ZK proof references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HardenedLink {
    /// Signatures only.
    Basic(LinkBody),
    /// Signatures plus proof references.
    WithZk {
        /// Signed content.
        body: LinkBody,
        /// Proof references.
        zk: ZkRefs,
    },
}

/// Bytes the sender signs for a link.
pub fn link_send_message(
    previous_head_root: &Hash,
    sender_pubkey: &Ed25519PublicKey,
    sender_pulse: Pulse,
    nonce: &Nonce,
    leaf_hash_send: &Hash,
) -> Result<Vec<u8>, LedgerError> {
    Ok(canonical::encode(&json!({
        "domain": "sigil/link-send",
        "leaf_hash_send": leaf_hash_send,
        "nonce": nonce,
        "previous_head_root": previous_head_root,
        "sender_pubkey": sender_pubkey,
        "sender_pulse": sender_pulse,
    }))?)
}

/// Bytes the receiver signs for a link. Binds the sender's link signature.
pub fn link_receive_message(
    send: &LinkSend,
    receiver_pubkey: &Ed25519PublicKey,
    receiver_pulse: Pulse,
    leaf_hash_receive: &Hash,
) -> Result<Vec<u8>, LedgerError> {
    Ok(canonical::encode(&json!({
        "domain": "sigil/link-receive",
        "leaf_hash_receive": leaf_hash_receive,
        "leaf_hash_send": send.leaf_hash_send,
        "previous_head_root": send.previous_head_root,
        "receiver_pubkey": receiver_pubkey,
        "receiver_pulse": receiver_pulse,
        "sender_sig": send.sender_sig,
    }))?)
}

impl HardenedLink {
    /// Signed content.
    pub fn body(&self) -> &LinkBody {
        match self {
            Self::Basic(body) | Self::WithZk { body, .. } => body,
        }
    }

    /// Root the link chains from.
    pub fn previous_head_root(&self) -> &Hash {
        &self.body().send.previous_head_root
    }

    /// Whether the receiver side is present.
    pub fn is_closed(&self) -> bool {
        self.body().receive.is_some()
    }

    /// Proof references, if any.
    pub fn zk(&self) -> Option<&ZkRefs> {
        match self {
            Self::Basic(_) => None,
            Self::WithZk { zk, .. } => Some(zk),
        }
    }

    /// Attach the receiver side. A link is closed at most once.
    ///
    /// `receive_proof` is recorded only on links that already carry a send
    /// proof.
    pub fn close(
        &mut self,
        receive: LinkReceive,
        receive_proof: Option<ZkRef>,
        artifact: Hash,
        index: usize,
    ) -> Result<(), LedgerError> {
        if self.is_closed() {
            return Err(LedgerError::AlreadyClosed { artifact, index });
        }
        match self {
            Self::Basic(body) => body.receive = Some(receive),
            Self::WithZk { body, zk } => {
                body.receive = Some(receive);
                zk.receive = receive_proof;
            }
        }
        Ok(())
    }

    /// Verify both signatures present on the link.
    pub fn verify(&self) -> Result<(), LedgerError> {
        let body = self.body();
        let send = &body.send;
        let message = link_send_message(
            &send.previous_head_root,
            &send.sender_pubkey,
            send.sender_pulse,
            &send.nonce,
            &send.leaf_hash_send,
        )?;
        send.sender_pubkey
            .verify(&message, &send.sender_sig)
            .map_err(|_| LedgerError::SignatureMismatch("hardened link sender signature".into()))?;

        if let Some(receive) = &body.receive {
            let message = link_receive_message(
                send,
                &receive.receiver_pubkey,
                receive.receiver_pulse,
                &receive.leaf_hash_receive,
            )?;
            receive
                .receiver_pubkey
                .verify(&message, &receive.receiver_sig)
                .map_err(|_| {
                    LedgerError::SignatureMismatch("hardened link receiver signature".into())
                })?;
        }
        Ok(())
    }
}
