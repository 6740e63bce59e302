//! # Fixed-Point Amounts
//!
//! All value accounting uses [`Amount`]: a signed count of micro-units
//! (1 unit = 1_000_000 micro-units). Signed so that a negative request can be
//! represented and rejected with an exact message; balances themselves never
//! go below zero.

use crate::errors::AmountError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Micro-units per whole unit (10^6).
pub const MICRO_PER_UNIT: i64 = 1_000_000;

/// Number of fractional digits carried by an [`Amount`].
const FRACTION_DIGITS: usize = 6;

/// Fixed-point amount in micro-units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// From a raw micro-unit count.
    pub const fn from_micro(micro: i64) -> Self {
        Self(micro)
    }

    /// From whole units.
    pub fn from_units(units: i64) -> Result<Self, AmountError> {
        units
            .checked_mul(MICRO_PER_UNIT)
            .map(Self)
            .ok_or(AmountError::Overflow {
                lhs: units,
                op: "*",
                rhs: MICRO_PER_UNIT,
            })
    }

    /// Raw micro-unit count.
    pub const fn micro(&self) -> i64 {
        self.0
    }

    /// Strictly greater than zero.
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(AmountError::Overflow {
                lhs: self.0,
                op: "+",
                rhs: rhs.0,
            })
    }

    /// Checked subtraction (may go negative).
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(AmountError::Overflow {
                lhs: self.0,
                op: "-",
                rhs: rhs.0,
            })
    }

    /// `max(0, self - rhs)`; the balance rule.
    pub fn remaining_after(self, rhs: Amount) -> Result<Amount, AmountError> {
        let diff = self.checked_sub(rhs)?;
        Ok(diff.max(Amount::ZERO))
    }

    /// Sum an iterator of amounts with overflow checking.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(iter: I) -> Result<Amount, AmountError> {
        iter.into_iter()
            .try_fold(Amount::ZERO, |acc, next| acc.checked_add(next))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = MICRO_PER_UNIT as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / unit,
            abs % unit,
            width = FRACTION_DIGITS
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Parse `"10"`, `"10.5"`, `"-0.000001"`. At most six fractional digits.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parse_err = |reason| AmountError::Parse {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(parse_err("empty"));
        }

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(parse_err("no digits"));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(parse_err("non-digit character"));
        }
        if frac_part.len() > FRACTION_DIGITS {
            return Err(parse_err("more than 6 fractional digits"));
        }

        let int_value: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| parse_err("integer part too large"))?
        };
        let mut frac_value: i64 = 0;
        for (i, c) in frac_part.chars().enumerate() {
            let digit = i64::from(c as u8 - b'0');
            frac_value += digit * 10_i64.pow((FRACTION_DIGITS - 1 - i) as u32);
        }

        let micro = int_value
            .checked_mul(MICRO_PER_UNIT)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| parse_err("out of range"))?;

        Ok(Amount(if negative { -micro } else { micro }))
    }
}
