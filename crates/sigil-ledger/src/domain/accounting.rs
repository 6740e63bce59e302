//! Balance accounting.
//!
//! `remaining = max(0, base - spent - pending)` where `spent` counts closed
//! transfers (sealed and live) and `pending` counts the open one, whose
//! amount stays reserved until it closes or lapses.

use super::errors::{AmountRejection, LedgerError};
use super::segment::SegmentLog;
use super::transfer::TransferRecord;
use super::window::TransferWindow;
use serde::{Deserialize, Serialize};
use sigil_types::Amount;

/// Balance of one branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Allocation of the branch.
    pub base: Amount,
    /// Sum of closed transfers.
    pub spent: Amount,
    /// Sum of open transfers.
    pub pending: Amount,
    /// What can still be sent.
    pub remaining: Amount,
}

/// Sum of closed amounts in the live window.
pub fn window_spent(window: &TransferWindow) -> Result<Amount, LedgerError> {
    Ok(Amount::checked_sum(
        window
            .records()
            .filter(|r| r.is_closed())
            .map(TransferRecord::amount),
    )?)
}

/// Compute the balance of a branch.
pub fn compute(
    base: Amount,
    segments: &SegmentLog,
    window: &TransferWindow,
) -> Result<Balance, LedgerError> {
    let spent = segments.total_spent()?.checked_add(window_spent(window)?)?;
    let pending = Amount::checked_sum(
        window
            .records()
            .filter(|r| r.is_open())
            .map(TransferRecord::amount),
    )?;
    let remaining = base.remaining_after(spent.checked_add(pending)?)?;
    Ok(Balance {
        base,
        spent,
        pending,
        remaining,
    })
}

/// Refuse non-positive amounts and amounts above the remaining balance.
pub fn ensure_can_spend(balance: &Balance, requested: Amount) -> Result<(), LedgerError> {
    let reason = if !requested.is_positive() {
        AmountRejection::NotPositive
    } else if requested > balance.remaining {
        AmountRejection::ExceedsRemaining
    } else {
        return Ok(());
    };
    Err(LedgerError::InvalidAmount {
        requested,
        remaining: balance.remaining,
        reason,
    })
}
