//! # Domain Invariants
//!
//! Structural rules every persisted ledger satisfies. The service checks
//! them before each save and the file store checks them on load, so a
//! corrupted or hand-edited ledger is refused instead of extended.

use super::accounting::Balance;
use super::child::DerivationStatus;
use super::errors::LedgerError;
use super::ledger::ArtifactLedger;
use super::merkle;
use super::segment::SegmentLog;
use super::transfer::TransferRecord;
use super::window::TransferWindow;
use sigil_types::{Amount, Hash};

fn violated(invariant: &'static str, detail: impl Into<String>) -> LedgerError {
    LedgerError::InvariantViolated {
        invariant,
        detail: detail.into(),
    }
}

/// Invariant: at most one open record, and only at the head.
pub fn invariant_single_open(window: &TransferWindow) -> Result<(), LedgerError> {
    let open: Vec<usize> = window
        .records()
        .enumerate()
        .filter(|(_, r)| r.is_open())
        .map(|(i, _)| i)
        .collect();
    match open.as_slice() {
        [] => Ok(()),
        [i] if *i + 1 == window.len() => Ok(()),
        [i] => Err(violated("single_open", format!("open record {i} is not the head"))),
        many => Err(violated("single_open", format!("{} open records", many.len()))),
    }
}

/// Invariant: every link is validly signed, matches its record, and chains
/// from the root of the window before it.
///
/// `base_root` is the head root an empty window chains from.
pub fn invariant_hardened_chain(window: &TransferWindow, base_root: &Hash) -> Result<(), LedgerError> {
    let linked = window.linked();
    if linked.is_empty() {
        return Ok(());
    }
    let leaves = window.leaves()?;

    for (index, entry) in linked {
        entry.link.verify()?;

        let body = entry.link.body();
        if body.send.leaf_hash_send != entry.record.sender().leaf_hash()? {
            return Err(violated("hardened_chain", format!("link {index} commits to a different send")));
        }
        if body.receive.is_some() != entry.record.is_closed() {
            return Err(violated("hardened_chain", format!("link {index} closed state differs from record")));
        }
        if let (Some(receive), TransferRecord::Closed(_)) = (&body.receive, &entry.record) {
            if receive.leaf_hash_receive != leaves[index] {
                return Err(violated("hardened_chain", format!("link {index} commits to a different receive")));
            }
        }

        let expected = if index == 0 {
            *base_root
        } else {
            merkle::build_root(&leaves[..index])
        };
        if body.send.previous_head_root != expected {
            return Err(violated(
                "hardened_chain",
                format!(
                    "link {index} chains from {} but the window root before it was {}",
                    body.send.previous_head_root.short(),
                    expected.short()
                ),
            ));
        }
    }
    Ok(())
}

/// Invariant: balance never negative and never overcommitted.
pub fn invariant_balance(balance: &Balance) -> Result<(), LedgerError> {
    let committed = balance.spent.checked_add(balance.pending)?;
    if committed > balance.base {
        return Err(violated(
            "balance",
            format!("spent {} + pending {} exceeds base {}", balance.spent, balance.pending, balance.base),
        ));
    }
    if balance.remaining < Amount::ZERO {
        return Err(violated("balance", format!("remaining {} is negative", balance.remaining)));
    }
    Ok(())
}

/// Invariant: sealed segments are internally consistent.
pub fn invariant_segments(log: &SegmentLog) -> Result<(), LedgerError> {
    for (i, segment) in log.segments().iter().enumerate() {
        if segment.index != i as u64 {
            return Err(violated("segments", format!("segment {i} labelled {}", segment.index)));
        }
        if segment.count != segment.leaves.len() || merkle::build_root(&segment.leaves) != segment.root {
            return Err(violated("segments", format!("segment {i} root does not match its leaves")));
        }
    }
    if merkle::build_root(&log.roots()) != log.segments_root() {
        return Err(violated("segments", "segments_root does not match segment roots"));
    }
    Ok(())
}

/// Invariant: every live record has a derivation in the matching state.
pub fn invariant_derivations(ledger: &ArtifactLedger) -> Result<(), LedgerError> {
    for (index, record) in ledger.window.records().enumerate() {
        let derivation = ledger
            .derivation(record.child())
            .ok_or_else(|| violated("derivations", format!("record {index} has no derivation")))?;
        let consistent = matches!(
            (record, derivation.status),
            (TransferRecord::Open(_), DerivationStatus::Claimable)
                | (TransferRecord::Closed(_), DerivationStatus::Used { .. })
                | (TransferRecord::Lapsed(_), DerivationStatus::Expired)
        );
        if !consistent || derivation.allocation_amount != record.amount() {
            return Err(violated("derivations", format!("record {index} disagrees with its derivation")));
        }
    }
    Ok(())
}

/// Run every invariant.
pub fn check_ledger(ledger: &ArtifactLedger) -> Result<(), LedgerError> {
    invariant_single_open(&ledger.window)?;
    invariant_segments(&ledger.segments)?;
    let base_root = ledger.segments.last_root().unwrap_or(Hash::ZERO);
    invariant_hardened_chain(&ledger.window, &base_root)?;
    invariant_balance(&ledger.balance()?)?;
    invariant_derivations(ledger)
}
