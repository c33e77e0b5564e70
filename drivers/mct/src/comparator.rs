//! Global comparator 0, the system-wide clockevent device.
//!
//! The comparator fires when the 64-bit global counter reaches the
//! programmed compare value. In periodic mode the hardware adds the
//! auto-increment amount to the compare value after each match, so no
//! software re-arming is needed. The device is bound to CPU 0.
//!
//! The framework is called with the comparator unlocked.

use log::debug;
use spin::Mutex;

use crate::{
    counter,
    error::MctResult,
    framework::{
        cycles_per_jiffy, ClockEventDesc, ClockEventFeatures, ClockEventId, ClockEventMode,
        EventSink, TimeKeeping,
    },
    io::RegisterIo,
    irq::IrqReturn,
    regs::{
        GlobalTcon, RegisterSpace, G_COMP0_ADD_INCR, G_COMP0_L, G_COMP0_U, G_INT_CSTAT, G_INT_ENB,
        G_TCON,
    },
};

/// Clockevent name of the comparator.
pub const COMP_NAME: &str = "mct-comp";

/// Interrupt name of the comparator line.
pub const COMP_IRQ_NAME: &str = "mct_comp_irq";

/// Shortest programmable delta, in counter cycles.
pub const COMP_MIN_DELTA: u64 = 0xf;

/// Longest programmable delta, in counter cycles.
pub const COMP_MAX_DELTA: u64 = 0xffff_ffff;

/// CPU the comparator delivers its events to.
pub const COMP_CPU: usize = 0;

/// Software state of the comparator.
pub struct Comparator<'a> {
    mode: ClockEventMode,
    /// Conversion factor from the last registration.
    desc_mult_shift: Option<(u32, u32)>,
    sink: Option<&'a dyn EventSink>,
}

impl<'a> Comparator<'a> {
    pub const fn new() -> Self {
        Self {
            mode: ClockEventMode::Unused,
            desc_mult_shift: None,
            sink: None,
        }
    }

    pub fn mode(&self) -> ClockEventMode {
        self.mode
    }

    /// Registration record for a counter running at `rate_hz`.
    pub fn descriptor(rate_hz: u64, rating: u32) -> ClockEventDesc<'static> {
        ClockEventDesc::new(
            ClockEventId::Comparator,
            COMP_NAME,
            rating,
            ClockEventFeatures::PERIODIC | ClockEventFeatures::ONESHOT,
            COMP_CPU,
            rate_hz,
            COMP_MIN_DELTA,
            COMP_MAX_DELTA,
        )
    }

    /// Register the comparator in `cell` with the framework. The
    /// conversion factor is in place before the framework sees the device.
    pub fn register(
        cell: &Mutex<Self>,
        timekeeping: &'a dyn TimeKeeping,
        rate_hz: u64,
        rating: u32,
    ) -> MctResult<()> {
        let desc = Self::descriptor(rate_hz, rating);
        cell.lock().desc_mult_shift = Some((desc.mult, desc.shift));

        let sink = timekeeping.register_clockevent(&desc)?;
        cell.lock().sink = Some(sink);
        debug!(
            "mct: {} registered at {} Hz (mult {}, shift {})",
            COMP_NAME, rate_hz, desc.mult, desc.shift
        );
        Ok(())
    }

    /// Disable the comparator and its interrupt. Idempotent.
    pub fn stop<R: RegisterSpace>(&self, io: &RegisterIo<'_, R>) {
        let mut tcon = GlobalTcon::from_bits_retain(io.read(G_TCON));
        tcon.remove(GlobalTcon::COMP0_ENABLE | GlobalTcon::COMP0_AUTO_INC);
        io.write(tcon.bits(), G_TCON);
        io.write(0, G_INT_ENB);
    }

    /// Program a match `cycles` from now and enable the comparator.
    ///
    /// With `periodic` the hardware re-arms itself every `cycles`. The
    /// enable bit is written last so the comparator never runs against a
    /// half-written compare value.
    pub fn arm<R: RegisterSpace>(&self, io: &RegisterIo<'_, R>, periodic: bool, cycles: u32) {
        let mut tcon = GlobalTcon::from_bits_retain(io.read(G_TCON));

        if periodic {
            tcon.insert(GlobalTcon::COMP0_AUTO_INC);
            io.write(cycles, G_COMP0_ADD_INCR);
        }

        let target = counter::read64(io).wrapping_add(cycles as u64);
        io.write(target as u32, G_COMP0_L);
        io.write((target >> 32) as u32, G_COMP0_U);

        io.write(1, G_INT_ENB);

        tcon.insert(GlobalTcon::COMP0_ENABLE);
        io.write(tcon.bits(), G_TCON);
    }

    /// Fire once `cycles` from now (periodically if in periodic mode).
    pub fn set_next_event<R: RegisterSpace>(&self, io: &RegisterIo<'_, R>, cycles: u32) {
        self.arm(io, self.mode == ClockEventMode::Periodic, cycles);
    }

    /// Switch to `mode`. The comparator is always stopped first; periodic
    /// mode re-arms it with one tick period at `hz`.
    pub fn set_mode<R: RegisterSpace>(
        &mut self,
        io: &RegisterIo<'_, R>,
        mode: ClockEventMode,
        hz: u32,
    ) {
        self.stop(io);
        self.mode = mode;

        if mode == ClockEventMode::Periodic {
            let cycles = self
                .desc_mult_shift
                .map_or(0, |(mult, shift)| cycles_per_jiffy(mult, shift, hz));
            self.arm(io, true, cycles as u32);
        }
    }

    /// Interrupt handler for the comparator in `cell`: acknowledge the
    /// match, then notify the framework.
    pub fn handle_irq<R: RegisterSpace>(
        cell: &Mutex<Self>,
        io: &RegisterIo<'_, R>,
    ) -> IrqReturn {
        io.write(1, G_INT_CSTAT);

        let sink = cell.lock().sink;
        if let Some(sink) = sink {
            sink.on_fire(ClockEventId::Comparator);
        }
        IrqReturn::Handled
    }
}

impl Default for Comparator<'_> {
    fn default() -> Self {
        Self::new()
    }
}
