//! Per-CPU local tick timers.
//!
//! Each CPU owns one local timer block. The tick counter divides the input
//! clock by `TICK_BASE_CNT + 1`; the interrupt counter then counts tick
//! underflows and raises the CPU's tick interrupt when it reaches zero.
//! In interval mode the interrupt counter reloads automatically.
//!
//! A [`LocalTick`] is only ever touched from its own CPU: from the CPU
//! bring-up/teardown path, from framework callbacks running on that CPU, or
//! from its interrupt, which is routed to that CPU.
//!
//! Calls out to the framework (registration and event delivery) are made
//! with the record unlocked, so the framework may call straight back into
//! the device, e.g. to re-arm it from the event callback.

use log::debug;
use spin::Mutex;

use crate::{
    error::MctResult,
    framework::{
        cycles_per_jiffy, ClockEventDesc, ClockEventFeatures, ClockEventId, ClockEventMode,
        EventSink, TimeKeeping,
    },
    io::RegisterIo,
    irq::{IrqNumber, IrqReturn},
    name::DeviceName,
    regs::{
        local_base, LocalTcon, RegisterSpace, ICNTB_UPDATE, L_ICNTB, L_INT_CSTAT, L_INT_ENB,
        L_TCNTB, L_TCON, TICK_BASE_CNT,
    },
};

/// Shortest programmable delta, in tick cycles.
pub const TICK_MIN_DELTA: u64 = 0xf;

/// Longest programmable delta, in tick cycles. Bit 31 of the interrupt
/// count buffer is the update flag.
pub const TICK_MAX_DELTA: u64 = 0x7fff_ffff;

/// Tick device frequency for an MCT input clock of `clk_rate_hz`.
pub const fn tick_rate(clk_rate_hz: u64) -> u64 {
    clk_rate_hz / (TICK_BASE_CNT as u64 + 1)
}

/// Registration record of `cpu`'s tick device for an MCT input clock of
/// `clk_rate_hz`.
pub fn descriptor(
    cpu: usize,
    name: &DeviceName,
    clk_rate_hz: u64,
    rating: u32,
) -> ClockEventDesc<'_> {
    ClockEventDesc::new(
        ClockEventId::Tick(cpu),
        name.as_str(),
        rating,
        ClockEventFeatures::PERIODIC | ClockEventFeatures::ONESHOT,
        cpu,
        tick_rate(clk_rate_hz),
        TICK_MIN_DELTA,
        TICK_MAX_DELTA,
    )
}

/// Per-CPU local tick state.
pub struct LocalTick<'a> {
    cpu: usize,
    /// Offset of this CPU's local register block.
    base: usize,
    name: DeviceName,
    /// Interrupt line assigned to this CPU, if any.
    irq: Option<IrqNumber>,
    irq_enabled: bool,
    mode: ClockEventMode,
    /// Base, name and interrupt binding have been established.
    setup_once: bool,
    mult_shift: Option<(u32, u32)>,
    sink: Option<&'a dyn EventSink>,
}

impl<'a> LocalTick<'a> {
    pub const fn new(cpu: usize) -> Self {
        Self {
            cpu,
            base: 0,
            name: DeviceName::empty(),
            irq: None,
            irq_enabled: false,
            mode: ClockEventMode::Unused,
            setup_once: false,
            mult_shift: None,
            sink: None,
        }
    }

    pub fn cpu(&self) -> usize {
        self.cpu
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn name(&self) -> &DeviceName {
        &self.name
    }

    pub fn irq(&self) -> Option<IrqNumber> {
        self.irq
    }

    pub fn set_irq(&mut self, irq: Option<IrqNumber>) {
        self.irq = irq;
    }

    pub fn irq_enabled(&self) -> bool {
        self.irq_enabled
    }

    pub fn set_irq_enabled(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
    }

    pub fn mode(&self) -> ClockEventMode {
        self.mode
    }

    pub fn is_setup(&self) -> bool {
        self.setup_once
    }

    /// Derive the register base and device name. Only the first call on a
    /// given record has any effect; returns whether it was the first.
    pub fn derive_identity(&mut self) -> bool {
        if self.setup_once {
            return false;
        }
        self.base = local_base(self.cpu);
        self.name = DeviceName::tick(self.cpu);
        true
    }

    pub fn mark_setup(&mut self) {
        self.setup_once = true;
    }

    /// Reset the tick counter prescaler.
    pub fn load_tick_count<R: RegisterSpace>(&self, io: &RegisterIo<'_, R>) {
        io.write(TICK_BASE_CNT, self.base + L_TCNTB);
    }

    /// Register (or re-register) the tick device in `cell` with the
    /// framework. The conversion factor is in place before the framework
    /// sees the device.
    pub fn register(
        cell: &Mutex<Self>,
        timekeeping: &'a dyn TimeKeeping,
        clk_rate_hz: u64,
        rating: u32,
    ) -> MctResult<()> {
        let (cpu, name) = {
            let tick = cell.lock();
            (tick.cpu, tick.name)
        };
        let desc = descriptor(cpu, &name, clk_rate_hz, rating);
        cell.lock().mult_shift = Some((desc.mult, desc.shift));

        let sink = timekeeping.register_clockevent(&desc)?;
        cell.lock().sink = Some(sink);
        Ok(())
    }

    /// Load `cycles` into the interrupt counter and start the timer.
    pub fn start<R: RegisterSpace>(&self, io: &RegisterIo<'_, R>, cycles: u32, periodic: bool) {
        io.write(ICNTB_UPDATE | cycles, self.base + L_ICNTB);

        // Enable the count-expired interrupt.
        io.write(1, self.base + L_INT_ENB);

        let mut tcon = LocalTcon::from_bits_retain(io.read(self.base + L_TCON));
        tcon.insert(LocalTcon::INT_START | LocalTcon::TIMER_START);
        if periodic {
            tcon.insert(LocalTcon::INTERVAL_MODE);
        }
        io.write(tcon.bits(), self.base + L_TCON);
    }

    /// Acknowledge a pending expiry and, unless the device is periodic
    /// (or `force` is set), stop the timer.
    pub fn stop<R: RegisterSpace>(&self, io: &RegisterIo<'_, R>, force: bool) {
        io.write(1, self.base + L_INT_CSTAT);

        if force || self.mode != ClockEventMode::Periodic {
            let mut tcon = LocalTcon::from_bits_retain(io.read(self.base + L_TCON));
            tcon.remove(LocalTcon::INT_START | LocalTcon::TIMER_START);
            io.write(tcon.bits(), self.base + L_TCON);
        }
    }

    /// Fire once `cycles` tick cycles from now.
    pub fn set_next_event<R: RegisterSpace>(&self, io: &RegisterIo<'_, R>, cycles: u32) {
        self.start(io, cycles, false);
    }

    /// Switch to `mode`. The timer is always force-stopped first.
    pub fn set_mode<R: RegisterSpace>(
        &mut self,
        io: &RegisterIo<'_, R>,
        mode: ClockEventMode,
        hz: u32,
    ) {
        self.stop(io, true);
        self.mode = mode;

        match mode {
            ClockEventMode::Periodic => {
                let cycles = self
                    .mult_shift
                    .map_or(0, |(mult, shift)| cycles_per_jiffy(mult, shift, hz));
                self.start(io, cycles as u32, true);
            }
            ClockEventMode::Resume => self.load_tick_count(io),
            ClockEventMode::OneShot | ClockEventMode::Unused | ClockEventMode::Shutdown => {}
        }
        debug!("mct: {} mode {:?}", self.name, mode);
    }

    /// Interrupt handler for the record in `cell`: acknowledge, stop
    /// unless periodic, then notify the framework.
    pub fn handle_irq<R: RegisterSpace>(
        cell: &Mutex<Self>,
        io: &RegisterIo<'_, R>,
    ) -> IrqReturn {
        let (cpu, sink) = {
            let tick = cell.lock();
            tick.stop(io, false);
            (tick.cpu, tick.sink)
        };

        if let Some(sink) = sink {
            sink.on_fire(ClockEventId::Tick(cpu));
        }
        IrqReturn::Handled
    }
}
