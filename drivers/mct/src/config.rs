//! Driver configuration.
//!
//! Everything here has a sensible default matching the Exynos4 parts; a
//! board only needs to override what differs.

use crate::{
    error::{MctError, MctResult},
    io::DEFAULT_ACK_TIMEOUT_NS,
};

/// Kernel tick frequency assumed when none is given.
pub const DEFAULT_HZ: u32 = 100;

/// Clocksource rating of the free-running counter.
pub const DEFAULT_FRC_RATING: u32 = 400;
/// Clockevent rating of the global comparator.
pub const DEFAULT_COMP_RATING: u32 = 250;
/// Clockevent rating of the local tick timers. Higher than the comparator
/// so the per-CPU devices are preferred once available.
pub const DEFAULT_TICK_RATING: u32 = 450;

/// Name of the clock whose rate drives the counter.
pub const RATE_CLOCK: &str = "fin_pll";
/// Name of the gate clock of the MCT block.
pub const GATE_CLOCK: &str = "mct";

/// Tunables of one MCT instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MctConfig {
    /// Tick frequency used to derive the periodic interval.
    pub hz: u32,
    /// Upper bound for a single write acknowledgment wait.
    pub ack_timeout_ns: u64,
    pub frc_rating: u32,
    pub comp_rating: u32,
    pub tick_rating: u32,
    /// Register the counter as the scheduler clock.
    pub register_sched_clock: bool,
    /// Register the counter as the delay-loop timer.
    pub register_delay_timer: bool,
}

impl Default for MctConfig {
    fn default() -> Self {
        Self {
            hz: DEFAULT_HZ,
            ack_timeout_ns: DEFAULT_ACK_TIMEOUT_NS,
            frc_rating: DEFAULT_FRC_RATING,
            comp_rating: DEFAULT_COMP_RATING,
            tick_rating: DEFAULT_TICK_RATING,
            register_sched_clock: true,
            register_delay_timer: true,
        }
    }
}

impl MctConfig {
    pub fn with_hz(mut self, hz: u32) -> Self {
        self.hz = hz;
        self
    }

    pub fn with_ack_timeout_ns(mut self, ns: u64) -> Self {
        self.ack_timeout_ns = ns;
        self
    }

    /// Check the values that would otherwise break arithmetic later on.
    pub fn validate(&self) -> MctResult<()> {
        if self.hz == 0 {
            return Err(MctError::InvalidArgument {
                name: "hz",
                value: "must be non-zero",
            });
        }
        if self.ack_timeout_ns == 0 {
            return Err(MctError::InvalidArgument {
                name: "ack_timeout_ns",
                value: "must be non-zero",
            });
        }
        Ok(())
    }
}
