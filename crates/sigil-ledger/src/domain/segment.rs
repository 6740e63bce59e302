//! # Segment Rollup
//!
//! Full windows are sealed into immutable segments. The artifact commits to
//! its whole sealed history through `segments_root`, the Merkle root over
//! all segment roots in sealing order.

use super::errors::LedgerError;
use super::merkle;
use serde::{Deserialize, Serialize};
use sigil_types::{Amount, Hash, Pulse};

/// A sealed window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the segment log.
    pub index: u64,
    /// Root of the sealed window.
    pub root: Hash,
    /// Number of records sealed.
    pub count: usize,
    /// Pulse of the seal.
    pub sealed_at_pulse: Pulse,
    /// Sum of closed amounts in the sealed window.
    pub spent: Amount,
    /// Leaf hashes of the sealed window, kept for inclusion proofs.
    pub leaves: Vec<Hash>,
}

/// Append-only log of sealed segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLog {
    segments: Vec<Segment>,
    segments_root: Hash,
}

impl SegmentLog {
    /// Seal a window. Returns the new segment.
    pub fn seal(&mut self, leaves: Vec<Hash>, spent: Amount, pulse: Pulse) -> &Segment {
        let segment = Segment {
            index: self.segments.len() as u64,
            root: merkle::build_root(&leaves),
            count: leaves.len(),
            sealed_at_pulse: pulse,
            spent,
            leaves,
        };
        self.segments.push(segment);
        self.segments_root = merkle::build_root(&self.roots());
        &self.segments[self.segments.len() - 1]
    }

    /// Sealed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of sealed segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether nothing has been sealed.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Merkle root over segment roots.
    pub fn segments_root(&self) -> Hash {
        self.segments_root
    }

    /// Segment roots in order.
    pub fn roots(&self) -> Vec<Hash> {
        self.segments.iter().map(|s| s.root).collect()
    }

    /// Root of the most recent segment.
    pub fn last_root(&self) -> Option<Hash> {
        self.segments.last().map(|s| s.root)
    }

    /// Records across all segments.
    pub fn total_records(&self) -> u64 {
        self.segments.iter().map(|s| s.count as u64).sum()
    }

    /// Spend across all segments.
    pub fn total_spent(&self) -> Result<Amount, LedgerError> {
        Ok(Amount::checked_sum(self.segments.iter().map(|s| s.spent))?)
    }

    /// Map a history sequence number to (segment, offset).
    pub fn locate(&self, sequence: u64) -> Option<(usize, usize)> {
        let mut start = 0u64;
        for (i, segment) in self.segments.iter().enumerate() {
            let end = start + segment.count as u64;
            if sequence < end {
                return Some((i, (sequence - start) as usize));
            }
            start = end;
        }
        None
    }
}
