//! Interface to the time-keeping framework.
//!
//! The driver produces raw hardware counts and raises bare events. The
//! framework above it (clocksource selection, tick management) is reached
//! only through [`TimeKeeping`], and calls back into the driver through the
//! `set_mode`/`set_next_event` entry points on [`crate::Mct`].

use bitflags::bitflags;

use crate::error::MctResult;

/// Nanoseconds per second.
pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Longest conversion range, in seconds, used when the device can count
/// further than 32 bits.
const MAX_CONVERSION_SECS: u64 = 600;

// ---------------------------------------------------------------------------
// Modes, features and identities
// ---------------------------------------------------------------------------

/// Operating mode requested by the framework for a clockevent device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEventMode {
    /// Not in use by the framework.
    Unused,
    /// Shut down, no further events expected.
    Shutdown,
    /// Fire every tick period without software re-arming.
    Periodic,
    /// Fire once per `set_next_event` call.
    OneShot,
    /// Resuming from suspend.
    Resume,
}

bitflags! {
    /// Capabilities advertised for a clockevent device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClockEventFeatures: u32 {
        const PERIODIC = 1 << 0;
        const ONESHOT = 1 << 1;
    }
}

bitflags! {
    /// Properties advertised for a clocksource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClockSourceFlags: u32 {
        const CONTINUOUS = 1 << 0;
    }
}

/// Identity of a clockevent device owned by this driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEventId {
    /// Global comparator 0, bound to CPU 0.
    Comparator,
    /// Local tick timer of the given CPU.
    Tick(usize),
}

/// Receiver of timer events, supplied by the framework at registration.
pub trait EventSink: Sync {
    /// Called from interrupt context after the hardware has been acknowledged.
    fn on_fire(&self, device: ClockEventId);
}

// ---------------------------------------------------------------------------
// Device descriptors
// ---------------------------------------------------------------------------

/// Clocksource registration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSourceDesc {
    pub name: &'static str,
    pub rating: u32,
    /// Mask of valid bits returned by a counter read.
    pub mask: u64,
    pub flags: ClockSourceFlags,
    pub rate_hz: u64,
}

/// Clockevent registration record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEventDesc<'n> {
    pub id: ClockEventId,
    pub name: &'n str,
    pub rating: u32,
    pub features: ClockEventFeatures,
    /// CPU the device delivers its events to.
    pub cpu: usize,
    pub freq_hz: u64,
    pub min_delta_ticks: u64,
    pub max_delta_ticks: u64,
    /// Nanosecond to cycle conversion factor, see [`calc_mult_shift`].
    pub mult: u32,
    pub shift: u32,
}

impl<'n> ClockEventDesc<'n> {
    /// Build a descriptor running at `freq_hz`, deriving `mult`/`shift`
    /// the way the generic clockevents layer does.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ClockEventId,
        name: &'n str,
        rating: u32,
        features: ClockEventFeatures,
        cpu: usize,
        freq_hz: u64,
        min_delta_ticks: u64,
        max_delta_ticks: u64,
    ) -> Self {
        let (mult, shift) = calc_mult_shift(
            NSEC_PER_SEC,
            freq_hz,
            conversion_range_secs(max_delta_ticks, freq_hz),
        );
        Self {
            id,
            name,
            rating,
            features,
            cpu,
            freq_hz,
            min_delta_ticks,
            max_delta_ticks,
            mult,
            shift,
        }
    }
}

/// Device cycles in one tick period at `hz` ticks per second, for a device
/// whose nanosecond conversion factor is `mult`/`shift`.
pub fn cycles_per_jiffy(mult: u32, shift: u32, hz: u32) -> u64 {
    ((NSEC_PER_SEC / hz as u64) * mult as u64) >> shift
}

/// Conversion range in seconds for a device that counts up to
/// `max_delta_ticks` at `freq_hz`.
pub fn conversion_range_secs(max_delta_ticks: u64, freq_hz: u64) -> u64 {
    let secs = max_delta_ticks / freq_hz.max(1);
    if secs == 0 {
        1
    } else if secs > MAX_CONVERSION_SECS && max_delta_ticks > u32::MAX as u64 {
        MAX_CONVERSION_SECS
    } else {
        secs
    }
}

/// Compute `mult`/`shift` so that `(x * mult) >> shift` converts a value in
/// units of `from` Hz into units of `to` Hz without overflowing 64 bits for
/// values covering up to `maxsec` seconds. The largest usable shift is
/// chosen to keep the conversion as precise as possible.
pub fn calc_mult_shift(from: u64, to: u64, maxsec: u64) -> (u32, u32) {
    // Headroom left for the multiplication once `maxsec * from` is known.
    let mut sftacc: u32 = 32;
    let mut tmp = maxsec.saturating_mul(from) >> 32;
    while tmp != 0 {
        tmp >>= 1;
        sftacc -= 1;
    }

    let mut sft: u32 = 32;
    while sft > 0 {
        tmp = ((to << sft) + from / 2) / from;
        if tmp >> sftacc == 0 {
            break;
        }
        sft -= 1;
    }
    (tmp as u32, sft)
}

// ---------------------------------------------------------------------------
// Framework seam
// ---------------------------------------------------------------------------

/// Registration calls into the time-keeping framework.
pub trait TimeKeeping: Sync {
    /// Register the monotonic counter.
    fn register_clocksource(&self, cs: &ClockSourceDesc) -> MctResult<()>;

    /// Register a scheduler clock of `bits` width at `rate_hz`; the
    /// framework reads it through [`crate::Mct::sched_clock`].
    fn register_sched_clock(&self, bits: u32, rate_hz: u64) -> MctResult<()>;

    /// Register the delay-loop timer; the framework reads it through
    /// [`crate::Mct::read_current_timer`].
    fn register_delay_timer(&self, rate_hz: u64) -> MctResult<()>;

    /// Register (or re-register) a clockevent device and return the sink
    /// that receives its events.
    fn register_clockevent(&self, dev: &ClockEventDesc<'_>) -> MctResult<&dyn EventSink>;
}
