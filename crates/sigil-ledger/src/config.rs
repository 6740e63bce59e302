//! # Ledger Configuration
//!
//! Policy constants for the transfer protocol. Defaults can be overridden
//! from `SIGIL_*` environment variables.

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use tracing::warn;

/// Default number of terminal records per sealed segment.
pub const DEFAULT_SEGMENT_SIZE: usize = 2000;

/// Default claim window length in steps.
pub const DEFAULT_CLAIM_STEPS: u64 = 11;

/// Default pulses per step.
pub const DEFAULT_PULSES_PER_STEP: u64 = 11;

/// Default send-lock time-to-live in pulses.
pub const DEFAULT_LOCK_TTL_PULSES: u64 = 60;

/// Default retention of send-dedup entries in pulses.
pub const DEFAULT_DEDUP_RETENTION_PULSES: u64 = 10_000;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A policy constant that must be positive was zero.
    #[error("{field} must be greater than zero")]
    Zero {
        /// Offending field
        field: &'static str,
    },
}

/// Ledger configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Window size at which the window is sealed into a segment.
    pub segment_size: usize,

    /// Claim window length, in steps.
    pub claim_steps: u64,

    /// Pulses per step.
    pub pulses_per_step: u64,

    /// Age after which a send lock is considered abandoned.
    pub lock_ttl_pulses: u64,

    /// How long a send-dedup entry is retained.
    pub dedup_retention_pulses: u64,

    /// Publish the window through the publication adapter after each close.
    pub publish_windows: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            claim_steps: DEFAULT_CLAIM_STEPS,
            pulses_per_step: DEFAULT_PULSES_PER_STEP,
            lock_ttl_pulses: DEFAULT_LOCK_TTL_PULSES,
            dedup_retention_pulses: DEFAULT_DEDUP_RETENTION_PULSES,
            publish_windows: true,
        }
    }
}

impl LedgerConfig {
    /// Create a config for testing (small windows, short claim period).
    pub fn for_testing() -> Self {
        Self {
            segment_size: 4,
            claim_steps: 2,
            pulses_per_step: 5,
            lock_ttl_pulses: 10,
            dedup_retention_pulses: 100,
            publish_windows: true,
        }
    }

    /// Defaults overridden from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `SIGIL_SEGMENT_SIZE` (default: 2000)
    /// - `SIGIL_CLAIM_STEPS` (default: 11)
    /// - `SIGIL_PULSES_PER_STEP` (default: 11)
    /// - `SIGIL_LOCK_TTL_PULSES` (default: 60)
    /// - `SIGIL_DEDUP_RETENTION_PULSES` (default: 10000)
    /// - `SIGIL_PUBLISH_WINDOWS` (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            segment_size: parse_env("SIGIL_SEGMENT_SIZE", defaults.segment_size),
            claim_steps: parse_env("SIGIL_CLAIM_STEPS", defaults.claim_steps),
            pulses_per_step: parse_env("SIGIL_PULSES_PER_STEP", defaults.pulses_per_step),
            lock_ttl_pulses: parse_env("SIGIL_LOCK_TTL_PULSES", defaults.lock_ttl_pulses),
            dedup_retention_pulses: parse_env(
                "SIGIL_DEDUP_RETENTION_PULSES",
                defaults.dedup_retention_pulses,
            ),
            publish_windows: env::var("SIGIL_PUBLISH_WINDOWS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.publish_windows),
        }
    }

    /// Reject zero-valued policy constants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segment_size == 0 {
            return Err(ConfigError::Zero {
                field: "segment_size",
            });
        }
        if self.claim_steps == 0 {
            return Err(ConfigError::Zero {
                field: "claim_steps",
            });
        }
        if self.pulses_per_step == 0 {
            return Err(ConfigError::Zero {
                field: "pulses_per_step",
            });
        }
        if self.lock_ttl_pulses == 0 {
            return Err(ConfigError::Zero {
                field: "lock_ttl_pulses",
            });
        }
        Ok(())
    }

    /// Claim window length in pulses (saturating).
    pub fn claim_pulses(&self) -> u64 {
        self.claim_steps.saturating_mul(self.pulses_per_step)
    }
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Ignoring unparseable configuration override");
                default
            }
        },
        Err(_) => default,
    }
}
