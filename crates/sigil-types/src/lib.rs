//! # Sigil Types
//!
//! Value types shared across the sigil workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: hashes, pulses and amounts are defined once.
//! - **No Floating Point**: every monetary value is an [`Amount`] in micro-units
//!   (10^-6) with checked arithmetic; overflow is an error, never a wrap.
//! - **Hex on the Wire**: hashes serialize as lowercase hex strings so durable
//!   JSON stays readable and canonical.

pub mod amount;
pub mod errors;
pub mod hash;

pub use amount::{Amount, MICRO_PER_UNIT};
pub use errors::AmountError;
pub use hash::{ContentId, Hash, HashParseError};

/// Opaque monotonic time unit produced by the external breath clock.
pub type Pulse = u64;
