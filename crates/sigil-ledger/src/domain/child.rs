//! # Derivative Identities
//!
//! Every exhale mints a derivative identity deterministically from the send,
//! bounded by a claim window. The [`ShareLink`] carries everything the
//! recipient needs to recompute and verify that identity before claiming it.

use super::errors::LedgerError;
use super::transfer::{sender_stamp, Nonce, SenderHalf};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sigil_crypto::digest_canonical;
use sigil_types::{Amount, AmountError, Hash, Pulse};

/// Derive the child identity of a send.
///
/// Deterministic in its inputs: any party holding the share link can
/// recompute it.
pub fn derive_child_hash(
    parent: &Hash,
    nonce: &Nonce,
    sender_stamp: &Hash,
    sender_pulse: Pulse,
    previous_head_root: &Hash,
    leaf_hash_send: &Hash,
) -> Result<Hash, LedgerError> {
    Ok(digest_canonical(&json!({
        "domain": "sigil/derive",
        "leaf_hash_send": leaf_hash_send,
        "nonce": nonce,
        "parent": parent,
        "previous_head_root": previous_head_root,
        "sender_pulse": sender_pulse,
        "sender_stamp": sender_stamp,
    }))?)
}

/// Deterministic id of a send, used to deduplicate replays.
pub fn send_id(
    parent: &Hash,
    child: &Hash,
    sender: &SenderHalf,
    previous_head_root: &Hash,
    leaf_hash_send: &Hash,
) -> Result<Hash, LedgerError> {
    Ok(digest_canonical(&json!({
        "amount": sender.amount,
        "child": child,
        "domain": "sigil/send-id",
        "leaf_hash_send": leaf_hash_send,
        "nonce": sender.nonce,
        "parent": parent,
        "previous_head_root": previous_head_root,
        "sender_pulse": sender.sender_pulse,
        "sender_stamp": sender.sender_stamp,
    }))?)
}

/// Pulse interval during which a derivative may be claimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimWindow {
    /// Pulse of the exhale.
    pub issued_pulse: Pulse,
    /// Last claimable pulse.
    pub expire_pulse: Pulse,
}

impl ClaimWindow {
    /// `issued + steps * pulses_per_step`, checked.
    pub fn new(issued_pulse: Pulse, steps: u64, pulses_per_step: u64) -> Result<Self, LedgerError> {
        let overflow = || AmountError::Overflow {
            lhs: steps as i64,
            op: "*",
            rhs: pulses_per_step as i64,
        };
        let length = steps.checked_mul(pulses_per_step).ok_or_else(overflow)?;
        let expire_pulse = issued_pulse.checked_add(length).ok_or_else(overflow)?;
        Ok(Self {
            issued_pulse,
            expire_pulse,
        })
    }

    /// Claims are accepted up to and including `expire_pulse`.
    pub fn is_expired(&self, now: Pulse) -> bool {
        now > self.expire_pulse
    }
}

/// Claim status of a derivative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DerivationStatus {
    /// Awaiting its claim.
    Claimable,
    /// Claimed.
    Used {
        /// Pulse of the claim
        claimed_pulse: Pulse,
    },
    /// Claim window passed.
    Expired,
}

/// Record of a derivative minted by a send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDerivation {
    /// Sending artifact.
    pub parent_canonical_hash: Hash,
    /// Derivative identity.
    pub child_canonical_hash: Hash,
    /// Amount the derivative is allocated.
    pub allocation_amount: Amount,
    /// Pulse of the send.
    pub issued_pulse: Pulse,
    /// Claim window.
    pub claim: ClaimWindow,
    /// Current status.
    pub status: DerivationStatus,
}

impl ChildDerivation {
    /// Mark as claimed at `now`.
    pub fn mark_used(&mut self, index: usize, now: Pulse) -> Result<(), LedgerError> {
        match self.status {
            DerivationStatus::Used { .. } => Err(LedgerError::AlreadyClosed {
                artifact: self.parent_canonical_hash,
                index,
            }),
            DerivationStatus::Expired => Err(LedgerError::Expired {
                expire_pulse: self.claim.expire_pulse,
                now,
            }),
            DerivationStatus::Claimable if self.claim.is_expired(now) => Err(LedgerError::Expired {
                expire_pulse: self.claim.expire_pulse,
                now,
            }),
            DerivationStatus::Claimable => {
                self.status = DerivationStatus::Used { claimed_pulse: now };
                Ok(())
            }
        }
    }

    /// Mark as expired. No effect once used.
    pub fn mark_expired(&mut self) {
        if self.status == DerivationStatus::Claimable {
            self.status = DerivationStatus::Expired;
        }
    }
}

/// Everything a recipient needs to claim a derivative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    /// Sending artifact.
    pub parent: Hash,
    /// Window root the send was built on.
    pub previous_head_root: Hash,
    /// Sender half, as recorded.
    pub sender: SenderHalf,
    /// Derivative identity.
    pub child: Hash,
    /// Claim window.
    pub claim: ClaimWindow,
    /// Deterministic send id.
    pub send_id: Hash,
    /// Link token the send was made under.
    pub token: String,
    /// Whether the send carries a hardened link.
    #[serde(default)]
    pub hardened: bool,
}

impl ShareLink {
    /// Recompute the derivative identity from the link's own fields.
    pub fn recompute_child(&self) -> Result<Hash, LedgerError> {
        derive_child_hash(
            &self.parent,
            &self.sender.nonce,
            &self.sender.sender_stamp,
            self.sender.sender_pulse,
            &self.previous_head_root,
            &self.sender.leaf_hash()?,
        )
    }

    /// Check that the link is self-consistent and signed by its sender.
    pub fn verify_integrity(&self) -> Result<(), LedgerError> {
        self.sender.verify(&self.parent)?;

        let stamp = sender_stamp(
            &self.parent,
            &self.previous_head_root,
            self.sender.amount,
            &self.sender.nonce,
            self.sender.sender_pulse,
            self.sender.payload.as_deref(),
        )?;
        if stamp != self.sender.sender_stamp {
            return Err(LedgerError::SignatureMismatch(format!(
                "sender stamp {} does not commit to the declared send",
                self.sender.sender_stamp.short()
            )));
        }

        let child = self.recompute_child()?;
        if child != self.child {
            return Err(LedgerError::SignatureMismatch(format!(
                "share link declares child {} but its contents derive {}",
                self.child.short(),
                child.short()
            )));
        }

        let id = send_id(
            &self.parent,
            &self.child,
            &self.sender,
            &self.previous_head_root,
            &self.sender.leaf_hash()?,
        )?;
        if id != self.send_id {
            return Err(LedgerError::SignatureMismatch(format!(
                "share link send id {} does not match its contents",
                self.send_id.short()
            )));
        }
        Ok(())
    }
}
