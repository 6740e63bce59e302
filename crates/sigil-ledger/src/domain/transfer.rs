//! # Transfer Records
//!
//! A transfer is opened by the sender (exhale) and closed by the recipient
//! (inhale). The three record states are distinct types: an
//! [`OpenTransfer`] becomes a [`ClosedTransfer`] or [`LapsedTransfer`] only
//! by being consumed, so a terminal record cannot be reopened or rewritten.
//!
//! ## Signed messages
//!
//! | Half | Message (canonical JSON) |
//! |------|--------------------------|
//! | Sender | `{domain, parent, sender_stamp, sender_pulse}` |
//! | Receiver | `{domain, sender_stamp, sender_pulse, receiver_pulse}` |
//!
//! The sender stamp itself commits to amount, nonce, payload and the head
//! root the send was built on.

use super::child::ClaimWindow;
use super::errors::LedgerError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sigil_crypto::{canonical, digest_canonical, Ed25519PublicKey, Ed25519Signature};
use sigil_types::{Amount, Hash, Pulse};
use std::fmt;

const EXHALE_DOMAIN: &str = "sigil/exhale";
const INHALE_DOMAIN: &str = "sigil/inhale";

/// Random per-send nonce (16 bytes, lowercase hex).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(String);

impl Nonce {
    /// Fresh random nonce.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Use a caller-chosen nonce (retries, tests).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender's half of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderHalf {
    /// Sender's public key.
    pub sender_pubkey: Ed25519PublicKey,
    /// Signature over the exhale message.
    pub sender_sig: Ed25519Signature,
    /// Digest committing to the send parameters.
    pub sender_stamp: Hash,
    /// Pulse of the exhale.
    pub sender_pulse: Pulse,
    /// Amount moved.
    pub amount: Amount,
    /// Per-send nonce.
    pub nonce: Nonce,
    /// Optional opaque memo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl SenderHalf {
    /// Leaf hash of the sender half alone.
    pub fn leaf_hash(&self) -> Result<Hash, LedgerError> {
        Ok(digest_canonical(&json!({
            "amount": self.amount,
            "nonce": self.nonce,
            "payload": self.payload,
            "sender_pubkey": self.sender_pubkey,
            "sender_pulse": self.sender_pulse,
            "sender_sig": self.sender_sig,
            "sender_stamp": self.sender_stamp,
        }))?)
    }

    /// Check the sender signature against `parent`.
    pub fn verify(&self, parent: &Hash) -> Result<(), LedgerError> {
        let message = sender_message(parent, &self.sender_stamp, self.sender_pulse)?;
        self.sender_pubkey
            .verify(&message, &self.sender_sig)
            .map_err(|_| LedgerError::SignatureMismatch(format!("sender signature on {parent}")))
    }
}

/// Receiver's half of a transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverHalf {
    /// Receiver's public key.
    pub receiver_pubkey: Ed25519PublicKey,
    /// Signature over the inhale message.
    pub receiver_sig: Ed25519Signature,
    /// Digest committing to the claim.
    pub receiver_stamp: Hash,
    /// Pulse of the inhale.
    pub receiver_pulse: Pulse,
}

impl ReceiverHalf {
    /// Check the receiver signature against the sender half it closes.
    pub fn verify(&self, sender: &SenderHalf) -> Result<(), LedgerError> {
        let message =
            receiver_message(&sender.sender_stamp, sender.sender_pulse, self.receiver_pulse)?;
        self.receiver_pubkey
            .verify(&message, &self.receiver_sig)
            .map_err(|_| LedgerError::SignatureMismatch("receiver signature".into()))
    }
}

/// Digest committing to every parameter of a send.
pub fn sender_stamp(
    parent: &Hash,
    previous_head_root: &Hash,
    amount: Amount,
    nonce: &Nonce,
    sender_pulse: Pulse,
    payload: Option<&str>,
) -> Result<Hash, LedgerError> {
    Ok(digest_canonical(&json!({
        "amount": amount,
        "domain": EXHALE_DOMAIN,
        "nonce": nonce,
        "parent": parent,
        "payload": payload,
        "previous_head_root": previous_head_root,
        "sender_pulse": sender_pulse,
    }))?)
}

/// Bytes the sender signs.
pub fn sender_message(
    parent: &Hash,
    sender_stamp: &Hash,
    sender_pulse: Pulse,
) -> Result<Vec<u8>, LedgerError> {
    Ok(canonical::encode(&json!({
        "domain": EXHALE_DOMAIN,
        "parent": parent,
        "sender_pulse": sender_pulse,
        "sender_stamp": sender_stamp,
    }))?)
}

/// Bytes the receiver signs.
pub fn receiver_message(
    sender_stamp: &Hash,
    sender_pulse: Pulse,
    receiver_pulse: Pulse,
) -> Result<Vec<u8>, LedgerError> {
    Ok(canonical::encode(&json!({
        "domain": INHALE_DOMAIN,
        "receiver_pulse": receiver_pulse,
        "sender_pulse": sender_pulse,
        "sender_stamp": sender_stamp,
    }))?)
}

/// Digest committing to a claim of `child`.
pub fn receiver_stamp(
    child: &Hash,
    sender_stamp: &Hash,
    receiver_pubkey: &Ed25519PublicKey,
    receiver_pulse: Pulse,
) -> Result<Hash, LedgerError> {
    Ok(digest_canonical(&json!({
        "child": child,
        "domain": INHALE_DOMAIN,
        "receiver_pubkey": receiver_pubkey,
        "receiver_pulse": receiver_pulse,
        "sender_stamp": sender_stamp,
    }))?)
}

/// Leaf hash of a closed transfer: the sender leaf plus the receiver half.
pub fn leaf_hash_receive(leaf_hash_send: &Hash, receiver: &ReceiverHalf) -> Result<Hash, LedgerError> {
    Ok(digest_canonical(&json!({
        "leaf_hash_send": leaf_hash_send,
        "receiver_pubkey": receiver.receiver_pubkey,
        "receiver_pulse": receiver.receiver_pulse,
        "receiver_sig": receiver.receiver_sig,
        "receiver_stamp": receiver.receiver_stamp,
    }))?)
}

/// A send awaiting its claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTransfer {
    /// Sender half.
    pub sender: SenderHalf,
    /// Derivative identity minted by the send.
    pub child: Hash,
    /// Claim window.
    pub claim: ClaimWindow,
}

impl OpenTransfer {
    /// Close with the receiver's half. Consumes the open record.
    pub fn close(self, receiver: ReceiverHalf) -> ClosedTransfer {
        ClosedTransfer {
            sender: self.sender,
            child: self.child,
            receiver,
        }
    }

    /// Mark the claim window as passed. Consumes the open record.
    pub fn lapse(self) -> LapsedTransfer {
        LapsedTransfer {
            expire_pulse: self.claim.expire_pulse,
            sender: self.sender,
            child: self.child,
        }
    }
}

/// A claimed send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedTransfer {
    /// Sender half.
    pub sender: SenderHalf,
    /// Derivative identity that was claimed.
    pub child: Hash,
    /// Receiver half.
    pub receiver: ReceiverHalf,
}

/// A send whose claim window passed unclaimed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapsedTransfer {
    /// Sender half.
    pub sender: SenderHalf,
    /// Derivative identity that can no longer be claimed.
    pub child: Hash,
    /// Last claimable pulse.
    pub expire_pulse: Pulse,
}

/// One record in a transfer window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransferRecord {
    /// Sent, not yet claimed.
    Open(OpenTransfer),
    /// Claimed. Terminal.
    Closed(ClosedTransfer),
    /// Expired. Terminal; the reserved amount is released.
    Lapsed(LapsedTransfer),
}

impl TransferRecord {
    /// Sender half.
    pub fn sender(&self) -> &SenderHalf {
        match self {
            Self::Open(t) => &t.sender,
            Self::Closed(t) => &t.sender,
            Self::Lapsed(t) => &t.sender,
        }
    }

    /// Derivative identity.
    pub fn child(&self) -> &Hash {
        match self {
            Self::Open(t) => &t.child,
            Self::Closed(t) => &t.child,
            Self::Lapsed(t) => &t.child,
        }
    }

    /// Amount of the send.
    pub fn amount(&self) -> Amount {
        self.sender().amount
    }

    /// Whether the record still awaits its claim.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Whether the record was claimed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Current leaf hash of the record.
    pub fn leaf_hash(&self) -> Result<Hash, LedgerError> {
        match self {
            Self::Open(t) => t.sender.leaf_hash(),
            Self::Closed(t) => leaf_hash_receive(&t.sender.leaf_hash()?, &t.receiver),
            Self::Lapsed(t) => Ok(digest_canonical(&json!({
                "leaf_hash_send": t.sender.leaf_hash()?,
                "lapsed_at": t.expire_pulse,
            }))?),
        }
    }
}
