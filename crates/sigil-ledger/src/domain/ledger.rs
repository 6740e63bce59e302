//! # Artifact Ledger
//!
//! Durable state of one artifact branch and the pure state transitions over
//! it. Nothing here does I/O, signs, or reads a clock: the service supplies
//! pulses and signatures, and persists the result.
//!
//! ## Transfer state machine
//!
//! ```text
//!            exhale                 inhale
//!   (none) ---------> Open ------------------> Closed
//!                       |
//!                       | claim window passes
//!                       v
//!                     Lapsed
//! ```
//!
//! Only the last record of the window may be open. Terminal records never
//! change again, which keeps every earlier leaf (and so every earlier
//! `previous_head_root`) stable.

use super::accounting::{self, Balance};
use super::artifact::{ArtifactCore, ArtifactIdentity};
use super::child::{send_id, ChildDerivation, DerivationStatus, ShareLink};
use super::errors::LedgerError;
use super::hardened::{HardenedLink, LinkReceive, ZkRef};
use super::history::{HeadCommitment, HeadStatus, HistoryProof};
use super::merkle;
use super::segment::{Segment, SegmentLog};
use super::transfer::{ClosedTransfer, LapsedTransfer, Nonce, OpenTransfer, ReceiverHalf, TransferRecord};
use super::window::TransferWindow;
use serde::{Deserialize, Serialize};
use sigil_crypto::{canonical, Ed25519PublicKey};
use sigil_types::{Amount, Hash, Pulse};
use std::cmp::Ordering;

/// Allocation and ownership of a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Parent artifact, for derivatives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Hash>,
    /// Allocation of the branch.
    pub base: Amount,
    /// Key whose signatures may move value out of the branch.
    pub owner: Ed25519PublicKey,
    /// Pulse the branch was created.
    pub issued_pulse: Pulse,
}

/// Validated parameters for an exhale, computed before signing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExhaleDraft {
    /// Index the new record will take.
    pub index: usize,
    /// Head root the send commits to.
    pub previous_head_root: Hash,
    /// Whether the record must carry a hardened link.
    pub hardened: bool,
    /// Balance before the send.
    pub balance: Balance,
}

/// Durable state of one artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLedger {
    /// Identity of the artifact.
    pub identity: ArtifactIdentity,
    /// Identity-bearing core, for root artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core: Option<ArtifactCore>,
    /// Allocation and owner.
    pub branch: Branch,
    /// Live window.
    pub window: TransferWindow,
    /// Sealed history.
    pub segments: SegmentLog,
    /// Derivatives minted by this artifact.
    pub derivations: Vec<ChildDerivation>,
}

impl ArtifactLedger {
    /// Ledger for a freshly issued root artifact.
    pub fn issue(
        core: ArtifactCore,
        base: Amount,
        owner: Ed25519PublicKey,
        now: Pulse,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            identity: core.identity()?,
            core: Some(core),
            branch: Branch {
                parent: None,
                base,
                owner,
                issued_pulse: now,
            },
            window: TransferWindow::default(),
            segments: SegmentLog::default(),
            derivations: Vec::new(),
        })
    }

    /// Ledger for a claimed derivative. Its base is the allocation.
    pub fn derive(
        derivation: &ChildDerivation,
        owner: Ed25519PublicKey,
        now: Pulse,
    ) -> Result<Self, LedgerError> {
        let bytes = canonical::encode_serializable(derivation)?;
        Ok(Self {
            identity: ArtifactIdentity::derived(derivation.child_canonical_hash, &bytes),
            core: None,
            branch: Branch {
                parent: Some(derivation.parent_canonical_hash),
                base: derivation.allocation_amount,
                owner,
                issued_pulse: now,
            },
            window: TransferWindow::default(),
            segments: SegmentLog::default(),
            derivations: Vec::new(),
        })
    }

    /// Canonical hash of the artifact.
    pub fn canonical_hash(&self) -> Hash {
        self.identity.canonical_hash
    }

    /// Root a new record chains from: the live window root, or the last
    /// sealed segment root while the window is empty.
    pub fn head_root(&self) -> Result<Hash, LedgerError> {
        if self.window.is_empty() {
            Ok(self.segments.last_root().unwrap_or(Hash::ZERO))
        } else {
            self.window.root()
        }
    }

    /// Published head.
    pub fn head(&self) -> Result<HeadCommitment, LedgerError> {
        Ok(HeadCommitment {
            window_root: self.window.root()?,
            window_len: self.window.len() as u64,
            segments_root: self.segments.segments_root(),
            segment_count: self.segments.len() as u64,
        })
    }

    /// Current balance.
    pub fn balance(&self) -> Result<Balance, LedgerError> {
        accounting::compute(self.branch.base, &self.segments, &self.window)
    }

    /// Derivation record for `child`.
    pub fn derivation(&self, child: &Hash) -> Option<&ChildDerivation> {
        self.derivations
            .iter()
            .find(|d| d.child_canonical_hash == *child)
    }

    fn derivation_mut(&mut self, child: &Hash) -> Option<&mut ChildDerivation> {
        self.derivations
            .iter_mut()
            .find(|d| d.child_canonical_hash == *child)
    }

    /// Lapse the head record if its claim window has passed.
    pub fn expire_lapsed(&mut self, now: Pulse) -> Result<Option<(usize, LapsedTransfer)>, LedgerError> {
        let Some(index) = self.window.len().checked_sub(1) else {
            return Ok(None);
        };
        let expired = match self.window.get(index) {
            Some(TransferRecord::Open(open)) => open.claim.is_expired(now),
            _ => false,
        };
        if !expired {
            return Ok(None);
        }

        let artifact = self.canonical_hash();
        let lapsed = self.window.lapse(index, artifact, now)?;
        if let Some(derivation) = self.derivation_mut(&lapsed.child) {
            derivation.mark_expired();
        }
        Ok(Some((index, lapsed)))
    }

    /// Validate an exhale and fix the head root it will commit to.
    pub fn prepare_exhale(
        &self,
        amount: Amount,
        harden: bool,
        nonce: &Nonce,
    ) -> Result<ExhaleDraft, LedgerError> {
        let artifact = self.canonical_hash();
        let index = self.window.len();

        // Amount first: an oversized request reports InvalidAmount even
        // while another send is open.
        let balance = self.balance()?;
        accounting::ensure_can_spend(&balance, amount)?;

        if let Some(TransferRecord::Open(open)) = self.window.last() {
            return Err(LedgerError::TransferInFlight {
                artifact,
                index: index - 1,
                expire_pulse: open.claim.expire_pulse,
            });
        }

        if self.window.records().any(|r| r.sender().nonce == *nonce) {
            return Err(LedgerError::NonceReused {
                artifact,
                nonce: nonce.to_string(),
            });
        }

        if self.window.is_hardened() && !harden {
            return Err(LedgerError::HardeningGap { artifact, index });
        }

        Ok(ExhaleDraft {
            index,
            previous_head_root: self.head_root()?,
            hardened: harden,
            balance,
        })
    }

    /// Head root that record `index` of the window was sent against.
    fn root_before(&self, index: usize) -> Result<Hash, LedgerError> {
        if index == 0 {
            return Ok(self.segments.last_root().unwrap_or(Hash::ZERO));
        }
        let leaves = self
            .window
            .records()
            .take(index)
            .map(TransferRecord::leaf_hash)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merkle::build_root(&leaves))
    }

    /// Rebuild the share link of the window record sent with `nonce`.
    ///
    /// Returns `Ok(None)` when no record in the live window carries the
    /// nonce, and `NonceReused` when one does but for another amount.
    pub fn replay_send(
        &self,
        nonce: &Nonce,
        amount: Amount,
        token: &str,
    ) -> Result<Option<ShareLink>, LedgerError> {
        let artifact = self.canonical_hash();
        let Some(index) = self.window.records().position(|r| r.sender().nonce == *nonce) else {
            return Ok(None);
        };
        let record = self
            .window
            .get(index)
            .ok_or(LedgerError::ProofIndexOutOfRange {
                index: index as u64,
                len: self.window.len() as u64,
            })?;
        let sender = record.sender().clone();
        if sender.amount != amount {
            return Err(LedgerError::NonceReused {
                artifact,
                nonce: nonce.to_string(),
            });
        }

        let child = *record.child();
        let claim = self
            .derivation(&child)
            .map(|d| d.claim)
            .ok_or(LedgerError::UnknownDerivative { artifact, child })?;
        let previous_head_root = self.root_before(index)?;
        let leaf_send = sender.leaf_hash()?;
        let share = ShareLink {
            parent: artifact,
            previous_head_root,
            send_id: send_id(&artifact, &child, &sender, &previous_head_root, &leaf_send)?,
            sender,
            child,
            claim,
            token: token.to_string(),
            hardened: self.window.link(index).is_some(),
        };
        share
            .verify_integrity()
            .map_err(|e| LedgerError::InvariantViolated {
                invariant: "replayable send",
                detail: e.to_string(),
            })?;
        Ok(Some(share))
    }

    /// Append the open record prepared by `draft`.
    pub fn commit_exhale(
        &mut self,
        draft: &ExhaleDraft,
        open: OpenTransfer,
        link: Option<HardenedLink>,
    ) -> Result<(), LedgerError> {
        let current = self.head_root()?;
        if current != draft.previous_head_root || self.window.len() != draft.index {
            return Err(LedgerError::HeadMoved {
                expected: draft.previous_head_root,
                actual: current,
            });
        }
        if draft.hardened != link.is_some() {
            return Err(LedgerError::HardeningGap {
                artifact: self.canonical_hash(),
                index: draft.index,
            });
        }

        let derivation = ChildDerivation {
            parent_canonical_hash: self.canonical_hash(),
            child_canonical_hash: open.child,
            allocation_amount: open.sender.amount,
            issued_pulse: open.claim.issued_pulse,
            claim: open.claim,
            status: DerivationStatus::Claimable,
        };

        self.window
            .push(TransferRecord::Open(open), link, self.identity.canonical_hash)?;
        self.derivations.push(derivation);
        Ok(())
    }

    /// Window index of the record minting `child`.
    pub fn locate(&self, child: &Hash) -> Result<usize, LedgerError> {
        self.window
            .position_of(child)
            .ok_or(LedgerError::UnknownDerivative {
                artifact: self.canonical_hash(),
                child: *child,
            })
    }

    /// Close the record at `index` with the receiver's half.
    pub fn commit_inhale(
        &mut self,
        index: usize,
        receiver: ReceiverHalf,
        link_receipt: Option<(LinkReceive, Option<ZkRef>)>,
        now: Pulse,
    ) -> Result<ClosedTransfer, LedgerError> {
        let artifact = self.canonical_hash();
        let child = *self
            .window
            .get(index)
            .ok_or(LedgerError::ProofIndexOutOfRange {
                index: index as u64,
                len: self.window.len() as u64,
            })?
            .child();

        // Validate the derivation before touching the window.
        let mut derivation = self
            .derivation(&child)
            .cloned()
            .ok_or(LedgerError::UnknownDerivative { artifact, child })?;
        derivation.mark_used(index, now)?;

        let closed = self.window.close(index, receiver, link_receipt, artifact, now)?;
        if let Some(stored) = self.derivation_mut(&child) {
            *stored = derivation;
        }
        Ok(closed)
    }

    /// Seal the window if it is full and settled.
    pub fn maybe_seal(&mut self, segment_size: usize, now: Pulse) -> Result<Option<Segment>, LedgerError> {
        if self.window.len() < segment_size || self.window.records().any(TransferRecord::is_open) {
            return Ok(None);
        }

        let spent = accounting::window_spent(&self.window)?;
        let leaves = self.window.leaves()?;
        let segment = self.segments.seal(leaves, spent, now).clone();
        self.window = self.window.emptied();
        Ok(Some(segment))
    }

    /// Sequence number, across all history, of window index `index`.
    pub fn sequence_of(&self, index: usize) -> u64 {
        self.segments.total_records() + index as u64
    }

    /// Inclusion proof for the transfer at history position `sequence`.
    pub fn prove(&self, sequence: u64) -> Result<HistoryProof, LedgerError> {
        let sealed = self.segments.total_records();
        if sequence < sealed {
            let (segment_index, offset) =
                self.segments
                    .locate(sequence)
                    .ok_or(LedgerError::ProofIndexOutOfRange {
                        index: sequence,
                        len: sealed,
                    })?;
            let segment = &self.segments.segments()[segment_index];
            return Ok(HistoryProof::Sealed {
                segment_index: segment_index as u64,
                window: merkle::prove(&segment.leaves, offset)?,
                segment: merkle::prove(&self.segments.roots(), segment_index)?,
            });
        }

        let offset = (sequence - sealed) as usize;
        let leaves = self.window.leaves()?;
        if offset >= leaves.len() {
            return Err(LedgerError::ProofIndexOutOfRange {
                index: sequence,
                len: sealed + leaves.len() as u64,
            });
        }
        Ok(HistoryProof::Live {
            window: merkle::prove(&leaves, offset)?,
        })
    }

    /// Window roots a peer could have seen for the first `len` records.
    ///
    /// The last record of a prefix may have been open when the peer saw it,
    /// so its send-only leaf is also accepted.
    fn prefix_roots(&self, len: usize) -> Result<Vec<Hash>, LedgerError> {
        let mut leaves: Vec<Hash> = self
            .window
            .records()
            .take(len)
            .map(TransferRecord::leaf_hash)
            .collect::<Result<_, _>>()?;
        let mut roots = vec![merkle::build_root(&leaves)];

        if let Some(last) = len.checked_sub(1).and_then(|i| self.window.get(i)) {
            if !last.is_open() {
                leaves[len - 1] = last.sender().leaf_hash()?;
                roots.push(merkle::build_root(&leaves));
            }
        }
        Ok(roots)
    }

    /// Compare a peer's head with ours.
    pub fn compare_head(&self, claimed: &HeadCommitment) -> Result<HeadStatus, LedgerError> {
        let local = self.head()?;
        if *claimed == local {
            return Ok(HeadStatus::InSync);
        }

        match claimed.segment_count.cmp(&local.segment_count) {
            Ordering::Greater => Ok(HeadStatus::PeerAhead),
            Ordering::Less => {
                let roots = self.segments.roots();
                let prefix = &roots[..claimed.segment_count as usize];
                if merkle::build_root(prefix) == claimed.segments_root {
                    Ok(HeadStatus::PeerBehind)
                } else {
                    Ok(HeadStatus::Diverged)
                }
            }
            Ordering::Equal if claimed.segments_root != local.segments_root => {
                Ok(HeadStatus::Diverged)
            }
            Ordering::Equal => match claimed.window_len.cmp(&local.window_len) {
                Ordering::Greater => Ok(HeadStatus::PeerAhead),
                Ordering::Less | Ordering::Equal => {
                    let roots = self.prefix_roots(claimed.window_len as usize)?;
                    if roots.contains(&claimed.window_root) {
                        Ok(HeadStatus::PeerBehind)
                    } else {
                        Ok(HeadStatus::Diverged)
                    }
                }
            },
        }
    }
}
