//! Pulse clocks.

use crate::ports::TimeSource;
use sigil_types::Pulse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    pulse: AtomicU64,
}

impl ManualClock {
    /// Clock starting at `pulse`.
    pub fn new(pulse: Pulse) -> Self {
        Self {
            pulse: AtomicU64::new(pulse),
        }
    }

    /// Move forward by `pulses`.
    pub fn advance(&self, pulses: u64) -> Pulse {
        self.pulse.fetch_add(pulses, Ordering::SeqCst) + pulses
    }

    /// Jump to `pulse`. Earlier values are ignored.
    pub fn set(&self, pulse: Pulse) {
        self.pulse.fetch_max(pulse, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_pulse(&self) -> Pulse {
        self.pulse.load(Ordering::SeqCst)
    }
}

/// Pulse clock derived from wall time.
///
/// Wall time may step backwards; the reported pulse never does.
#[derive(Debug)]
pub struct SystemPulseClock {
    genesis_unix_ms: u64,
    pulse_ms: u64,
    last: AtomicU64,
}

impl SystemPulseClock {
    /// Default pulse length in milliseconds.
    pub const DEFAULT_PULSE_MS: u64 = 5_236;

    /// Clock counting `pulse_ms` pulses since `genesis_unix_ms`.
    pub fn new(genesis_unix_ms: u64, pulse_ms: u64) -> Self {
        Self {
            genesis_unix_ms,
            pulse_ms: pulse_ms.max(1),
            last: AtomicU64::new(0),
        }
    }

    fn wall_pulse(&self) -> Pulse {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        now_ms.saturating_sub(self.genesis_unix_ms) / self.pulse_ms
    }
}

impl Default for SystemPulseClock {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_PULSE_MS)
    }
}

impl TimeSource for SystemPulseClock {
    fn now_pulse(&self) -> Pulse {
        let wall = self.wall_pulse();
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}
