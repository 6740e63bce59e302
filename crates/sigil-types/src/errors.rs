//! Amount arithmetic errors.

use thiserror::Error;

/// Errors from fixed-point amount arithmetic and parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Checked arithmetic overflowed.
    #[error("amount overflow: {lhs} {op} {rhs} (micro-units)")]
    Overflow {
        /// Left operand in micro-units
        lhs: i64,
        /// Operator symbol
        op: &'static str,
        /// Right operand in micro-units
        rhs: i64,
    },

    /// Input string is not a decimal amount.
    #[error("invalid amount '{input}': {reason}")]
    Parse {
        /// Raw input
        input: String,
        /// Why it was rejected
        reason: &'static str,
    },
}
