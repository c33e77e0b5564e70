//! Global free-running counter (clocksource).
//!
//! The counter is 64 bits wide but exposed as two 32-bit registers that the
//! hardware does not update atomically. The clocksource only uses the lower
//! half, which is a single register read; the full 64-bit value is only
//! needed to arm the comparator and costs several slow MCT reads.

use crate::{
    framework::{ClockSourceDesc, ClockSourceFlags},
    io::RegisterIo,
    regs::{GlobalTcon, RegisterSpace, G_CNT_L, G_CNT_U, G_TCON},
};

/// Clocksource name.
pub const FRC_NAME: &str = "mct-frc";

/// Width of the value returned by [`read32`].
pub const FRC_BITS: u32 = 32;

/// Clocksource registration record for a counter running at `rate_hz`.
pub fn clocksource(rate_hz: u64, rating: u32) -> ClockSourceDesc {
    ClockSourceDesc {
        name: FRC_NAME,
        rating,
        mask: (1u64 << FRC_BITS) - 1,
        flags: ClockSourceFlags::CONTINUOUS,
        rate_hz,
    }
}

/// Set the global timer start bit. Safe to call on a running counter.
pub fn start<R: RegisterSpace>(io: &RegisterIo<'_, R>) {
    let mut tcon = GlobalTcon::from_bits_retain(io.read(G_TCON));
    tcon.insert(GlobalTcon::TIMER_START);
    io.write(tcon.bits(), G_TCON);
}

/// Restart the counter after suspend. The count is not reset.
pub fn resume<R: RegisterSpace>(io: &RegisterIo<'_, R>) {
    start(io);
}

/// Lower 32 bits of the counter.
#[inline]
pub fn read32<R: RegisterSpace>(io: &RegisterIo<'_, R>) -> u32 {
    io.read(G_CNT_L)
}

/// All 64 bits of the counter.
///
/// Reads upper, lower, upper and retries while the two upper samples
/// differ, since the lower read then straddled a carry into the upper half.
pub fn read64<R: RegisterSpace>(io: &RegisterIo<'_, R>) -> u64 {
    let mut hi2 = io.read(G_CNT_U);
    loop {
        let hi = hi2;
        let lo = io.read(G_CNT_L);
        hi2 = io.read(G_CNT_U);
        if hi == hi2 {
            return ((hi as u64) << 32) | lo as u64;
        }
    }
}
