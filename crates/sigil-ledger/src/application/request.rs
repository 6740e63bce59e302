//! Request and receipt types of the service API.

use crate::domain::{Nonce, ReceiverHalf, Segment};
use serde::{Deserialize, Serialize};
use sigil_types::{Amount, ContentId, Hash};

/// Parameters of an exhale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendRequest {
    /// Amount to move.
    pub amount: Amount,
    /// Link token the send lock is scoped to (one per sending view).
    pub token: String,
    /// Caller-chosen nonce. Retrying with the same nonce replays the send.
    pub nonce: Option<Nonce>,
    /// Attach a hardened link.
    pub harden: bool,
    /// Opaque memo carried in the sender half.
    pub payload: Option<String>,
}

impl SendRequest {
    /// Plain send of `amount` under `token`.
    pub fn new(amount: Amount, token: impl Into<String>) -> Self {
        Self {
            amount,
            token: token.into(),
            nonce: None,
            harden: false,
            payload: None,
        }
    }

    /// Request a hardened link.
    #[must_use]
    pub fn hardened(mut self) -> Self {
        self.harden = true;
        self
    }

    /// Use a fixed nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Attach a memo.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Outcome of a successful inhale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InhaleReceipt {
    /// Sending artifact.
    pub parent: Hash,
    /// Claimed derivative, now an artifact with its own ledger.
    pub child: Hash,
    /// Window index of the closed record.
    pub index: usize,
    /// Parent window root including the close.
    pub window_root: Hash,
    /// Receiver half written to the record.
    pub receiver: ReceiverHalf,
    /// Segment sealed by this close, if the window filled up.
    pub sealed: Option<Segment>,
    /// Where the window snapshot was published.
    pub content_id: Option<ContentId>,
}
