//! # History Proofs and Head Comparison
//!
//! A head commitment is what an artifact publishes about itself: its live
//! window root and its `segments_root`. Any transfer in the artifact's
//! history can be proven against it, either directly in the live window or
//! through the sealed segment that contains it.

use super::merkle::{self, MerkleProof};
use serde::{Deserialize, Serialize};
use sigil_types::Hash;

/// Published summary of an artifact's history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadCommitment {
    /// Root of the live window.
    pub window_root: Hash,
    /// Records in the live window.
    pub window_len: u64,
    /// Root over sealed segment roots.
    pub segments_root: Hash,
    /// Number of sealed segments.
    pub segment_count: u64,
}

/// Inclusion proof for one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum HistoryProof {
    /// Transfer in the live window.
    Live {
        /// Proof against the window root.
        window: MerkleProof,
    },
    /// Transfer in a sealed segment.
    Sealed {
        /// Segment holding the transfer.
        segment_index: u64,
        /// Proof against the segment's root.
        window: MerkleProof,
        /// Proof of the segment root against `segments_root`.
        segment: MerkleProof,
    },
}

impl HistoryProof {
    /// Leaf hash being proven.
    pub fn leaf(&self) -> &Hash {
        match self {
            Self::Live { window } | Self::Sealed { window, .. } => &window.leaf,
        }
    }
}

/// Check a history proof against a head. Never panics.
pub fn verify_history(head: &HeadCommitment, proof: &HistoryProof) -> bool {
    match proof {
        HistoryProof::Live { window } => {
            window.leaf_count == head.window_len && merkle::verify(&head.window_root, window)
        }
        HistoryProof::Sealed {
            segment_index,
            window,
            segment,
        } => {
            let Some(sealed_root) = merkle::compute_root(window) else {
                return false;
            };
            segment.index == *segment_index
                && segment.leaf == sealed_root
                && segment.leaf_count == head.segment_count
                && merkle::verify(&head.segments_root, segment)
        }
    }
}

/// Result of comparing a peer's head with the local one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeadStatus {
    /// Identical heads.
    InSync,
    /// The peer's head is a prefix of ours.
    PeerBehind,
    /// The peer claims more history than we hold.
    PeerAhead,
    /// The histories disagree.
    Diverged,
}
