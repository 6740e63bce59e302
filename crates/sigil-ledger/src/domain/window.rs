//! # Transfer Window
//!
//! The live, bounded sequence of transfer records for one artifact.
//!
//! Hardening is a one-way mode switch: once a record carries a hardened
//! link, every later record must too. The window encodes this in its shape.
//! A hardened window has an unlinked prefix (records appended before
//! hardening began) followed only by linked entries, so there is no place
//! to put an unlinked record after the first link.

use super::errors::LedgerError;
use super::hardened::{HardenedLink, LinkReceive, ZkRef};
use super::merkle;
use super::transfer::{ClosedTransfer, LapsedTransfer, OpenTransfer, ReceiverHalf, TransferRecord};
use serde::{Deserialize, Serialize};
use sigil_types::{Hash, Pulse};

/// A record with its hardened link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardenedEntry {
    /// Transfer record.
    pub record: TransferRecord,
    /// Link committing to it.
    pub link: HardenedLink,
}

/// The live window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransferWindow {
    /// No hardened links.
    Plain {
        /// Records in append order.
        records: Vec<TransferRecord>,
    },
    /// Hardening began in this window or an earlier one.
    Hardened {
        /// Records appended before hardening began.
        prefix: Vec<TransferRecord>,
        /// Linked records.
        linked: Vec<HardenedEntry>,
    },
}

impl Default for TransferWindow {
    fn default() -> Self {
        Self::Plain {
            records: Vec::new(),
        }
    }
}

impl TransferWindow {
    /// Number of records.
    pub fn len(&self) -> usize {
        match self {
            Self::Plain { records } => records.len(),
            Self::Hardened { prefix, linked } => prefix.len() + linked.len(),
        }
    }

    /// Whether the window has no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether new records must carry a link.
    pub fn is_hardened(&self) -> bool {
        matches!(self, Self::Hardened { .. })
    }

    /// Records in append order.
    pub fn records(&self) -> Box<dyn Iterator<Item = &TransferRecord> + '_> {
        match self {
            Self::Plain { records } => Box::new(records.iter()),
            Self::Hardened { prefix, linked } => {
                Box::new(prefix.iter().chain(linked.iter().map(|e| &e.record)))
            }
        }
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Option<&TransferRecord> {
        match self {
            Self::Plain { records } => records.get(index),
            Self::Hardened { prefix, linked } => match index.checked_sub(prefix.len()) {
                None => prefix.get(index),
                Some(i) => linked.get(i).map(|e| &e.record),
            },
        }
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&TransferRecord> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Number of records appended before hardening began.
    pub fn unlinked_len(&self) -> usize {
        match self {
            Self::Plain { records } => records.len(),
            Self::Hardened { prefix, .. } => prefix.len(),
        }
    }

    /// Hardened link at `index`, if that record has one.
    pub fn link(&self, index: usize) -> Option<&HardenedLink> {
        match self {
            Self::Plain { .. } => None,
            Self::Hardened { prefix, linked } => index
                .checked_sub(prefix.len())
                .and_then(|i| linked.get(i))
                .map(|e| &e.link),
        }
    }

    /// Linked entries with their window index.
    pub fn linked(&self) -> Vec<(usize, &HardenedEntry)> {
        match self {
            Self::Plain { .. } => Vec::new(),
            Self::Hardened { prefix, linked } => linked
                .iter()
                .enumerate()
                .map(|(i, e)| (prefix.len() + i, e))
                .collect(),
        }
    }

    /// Index of the record minting `child`.
    pub fn position_of(&self, child: &Hash) -> Option<usize> {
        self.records().position(|r| r.child() == child)
    }

    /// Records that are closed or lapsed.
    pub fn terminal_count(&self) -> usize {
        self.records().filter(|r| !r.is_open()).count()
    }

    /// Current leaf hashes.
    pub fn leaves(&self) -> Result<Vec<Hash>, LedgerError> {
        self.records().map(TransferRecord::leaf_hash).collect()
    }

    /// Merkle root over the current leaves.
    pub fn root(&self) -> Result<Hash, LedgerError> {
        Ok(merkle::build_root(&self.leaves()?))
    }

    /// Append a record.
    ///
    /// The first linked record switches the window to hardened mode; after
    /// that an unlinked record is refused with `HardeningGap`.
    pub fn push(
        &mut self,
        record: TransferRecord,
        link: Option<HardenedLink>,
        artifact: Hash,
    ) -> Result<(), LedgerError> {
        let index = self.len();
        let Some(link) = link else {
            return match self {
                Self::Plain { records } => {
                    records.push(record);
                    Ok(())
                }
                Self::Hardened { .. } => Err(LedgerError::HardeningGap { artifact, index }),
            };
        };

        if let Self::Plain { records } = self {
            let prefix = std::mem::take(records);
            *self = Self::Hardened {
                prefix,
                linked: Vec::new(),
            };
        }
        if let Self::Hardened { linked, .. } = self {
            linked.push(HardenedEntry { record, link });
        }
        Ok(())
    }

    fn slot_mut(&mut self, index: usize) -> Option<(&mut TransferRecord, Option<&mut HardenedLink>)> {
        match self {
            Self::Plain { records } => records.get_mut(index).map(|r| (r, None)),
            Self::Hardened { prefix, linked } => match index.checked_sub(prefix.len()) {
                None => prefix.get_mut(index).map(|r| (r, None)),
                Some(i) => linked
                    .get_mut(i)
                    .map(|e| (&mut e.record, Some(&mut e.link))),
            },
        }
    }

    fn open_at(&self, index: usize, artifact: Hash, now: Pulse) -> Result<OpenTransfer, LedgerError> {
        match self.get(index) {
            Some(TransferRecord::Open(open)) => Ok(open.clone()),
            Some(TransferRecord::Closed(_)) => Err(LedgerError::AlreadyClosed { artifact, index }),
            Some(TransferRecord::Lapsed(lapsed)) => Err(LedgerError::Expired {
                expire_pulse: lapsed.expire_pulse,
                now,
            }),
            None => Err(LedgerError::ProofIndexOutOfRange {
                index: index as u64,
                len: self.len() as u64,
            }),
        }
    }

    /// Close the open record at `index`.
    ///
    /// A linked record must be closed together with its link receipt.
    pub fn close(
        &mut self,
        index: usize,
        receiver: ReceiverHalf,
        link_receipt: Option<(LinkReceive, Option<ZkRef>)>,
        artifact: Hash,
        now: Pulse,
    ) -> Result<ClosedTransfer, LedgerError> {
        let open = self.open_at(index, artifact, now)?;
        let (slot, link) = self.slot_mut(index).ok_or(LedgerError::ProofIndexOutOfRange {
            index: index as u64,
            len: 0,
        })?;

        match (link, link_receipt) {
            (Some(link), Some((receive, proof))) => link.close(receive, proof, artifact, index)?,
            (Some(_), None) => return Err(LedgerError::HardeningGap { artifact, index }),
            (None, _) => {}
        }

        let closed = open.close(receiver);
        *slot = TransferRecord::Closed(closed.clone());
        Ok(closed)
    }

    /// Lapse the open record at `index`.
    pub fn lapse(&mut self, index: usize, artifact: Hash, now: Pulse) -> Result<LapsedTransfer, LedgerError> {
        let open = self.open_at(index, artifact, now)?;
        let lapsed = open.lapse();
        if let Some((slot, _)) = self.slot_mut(index) {
            *slot = TransferRecord::Lapsed(lapsed.clone());
        }
        Ok(lapsed)
    }

    /// Empty window in the same mode, for after a seal.
    pub fn emptied(&self) -> Self {
        match self {
            Self::Plain { .. } => Self::default(),
            Self::Hardened { .. } => Self::Hardened {
                prefix: Vec::new(),
                linked: Vec::new(),
            },
        }
    }
}
