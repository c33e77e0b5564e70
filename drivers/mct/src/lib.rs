//! Exynos multi-core timer (MCT) driver for VeridianOS
//!
//! The MCT provides:
//!
//! - a 64-bit global free-running counter, exported as the system
//!   clocksource, scheduler clock and delay timer ([`counter`]);
//! - global comparator 0, a system-wide clockevent device bound to CPU 0
//!   ([`comparator`]);
//! - one local tick timer per CPU, registered as that CPU's clockevent
//!   device as the CPU comes online ([`tick`], [`hotplug`]).
//!
//! All hardware access goes through [`io::RegisterIo`], which implements the
//! write acknowledgment protocol of the block. All platform services are
//! reached through the traits in [`platform`], [`irq`] and [`framework`].

#![cfg_attr(not(test), no_std)]

pub mod comparator;
pub mod config;
pub mod counter;
pub mod error;
pub mod framework;
pub mod hotplug;
pub mod io;
pub mod irq;
pub mod name;
pub mod platform;
pub mod regs;
pub mod tick;

#[cfg(test)]
mod testing;

use log::{error, info, warn};
use spin::Mutex;

pub use crate::{
    config::MctConfig,
    error::{MctError, MctResult},
    framework::{ClockEventId, ClockEventMode, EventSink, TimeKeeping},
    hotplug::CpuAction,
    io::Monotonic,
    irq::{DeliveryTopology, IrqController, IrqHandlerKind, IrqNumber, IrqReturn, MctIrqs},
    platform::{ClockProvider, CpuOps, Platform},
    regs::{MmioRegisters, RegisterSpace},
};
use crate::{
    comparator::{Comparator, COMP_IRQ_NAME},
    counter::FRC_BITS,
    framework::{ClockSourceDesc, NSEC_PER_SEC},
    io::RegisterIo,
    irq::{Binder, InterruptBinder, IrqFlags, IrqRequest},
    regs::MAX_LOCAL_TIMERS,
    tick::LocalTick,
};

/// One initialized MCT instance.
///
/// Framework callbacks and interrupt handlers for a device must be invoked
/// with local interrupts disabled on the CPU the device belongs to, which
/// is what keeps the per-device locks uncontended.
pub struct Mct<'a, R> {
    io: RegisterIo<'a, R>,
    config: MctConfig,
    clk_rate: u64,
    topology: DeliveryTopology,
    irqs: MctIrqs,
    binder: Binder,
    ctl: &'a dyn IrqController,
    cpus: &'a dyn CpuOps,
    timekeeping: &'a dyn TimeKeeping,
    /// Number of CPUs with a local timer record.
    nr_cpus: usize,
    comparator: Mutex<Comparator<'a>>,
    ticks: [Mutex<LocalTick<'a>>; MAX_LOCAL_TIMERS],
}

impl<'a, R: RegisterSpace> Mct<'a, R> {
    /// Bring up the MCT behind `regs`.
    ///
    /// Resolves and ungates the input clock, requests the tick interrupts
    /// for the chosen `topology`, hooks CPU hotplug, sets up the boot CPU's
    /// local timer, then registers the clocksource and the global
    /// comparator. Any error aborts the bring-up.
    pub fn init(
        regs: R,
        irqs: MctIrqs,
        topology: DeliveryTopology,
        config: MctConfig,
        platform: Platform<'a>,
    ) -> MctResult<Self> {
        config.validate()?;
        let clk_rate = platform::enable_clocks(platform.clocks)?;
        Self::init_clocked(regs, clk_rate, irqs, topology, config, platform)
    }

    fn init_clocked(
        regs: R,
        clk_rate: u64,
        irqs: MctIrqs,
        topology: DeliveryTopology,
        config: MctConfig,
        platform: Platform<'a>,
    ) -> MctResult<Self> {
        let mut nr_cpus = platform.cpus.possible_cpus();
        if nr_cpus > MAX_LOCAL_TIMERS {
            warn!(
                "mct: {} possible CPUs, only {} local timers",
                nr_cpus, MAX_LOCAL_TIMERS
            );
            nr_cpus = MAX_LOCAL_TIMERS;
        }

        let mct = Self {
            io: RegisterIo::new(regs, platform.clock, config.ack_timeout_ns),
            config,
            clk_rate,
            topology,
            irqs,
            binder: Binder::new(topology, irqs),
            ctl: platform.irq,
            cpus: platform.cpus,
            timekeeping: platform.timekeeping,
            nr_cpus,
            comparator: Mutex::new(Comparator::new()),
            ticks: core::array::from_fn(|cpu| Mutex::new(LocalTick::new(cpu))),
        };

        mct.timer_resources()?;
        mct.clocksource_init()?;
        mct.clockevent_init()?;

        info!(
            "mct: {} Hz, {:?}, {} local timers",
            clk_rate, topology, nr_cpus
        );
        Ok(mct)
    }

    /// Tick interrupts, hotplug hook and the boot CPU's local timer.
    fn timer_resources(&self) -> MctResult<()> {
        let mut lines = [None; MAX_LOCAL_TIMERS];
        self.binder
            .request_lines(self.ctl, &mut lines[..self.nr_cpus]);
        for (tick, line) in self.ticks.iter().zip(lines) {
            tick.lock().set_irq(line);
        }

        if let Err(err) = self.cpus.register_notifier() {
            error!("mct: {}", err);
            self.binder.release(self.ctl);
            return Err(err);
        }

        self.setup_local_timer(self.cpus.current_cpu())
    }

    fn clocksource_init(&self) -> MctResult<()> {
        counter::start(&self.io);

        if self.config.register_delay_timer {
            self.timekeeping.register_delay_timer(self.clk_rate)?;
        }

        let cs: ClockSourceDesc = counter::clocksource(self.clk_rate, self.config.frc_rating);
        if let Err(err) = self.timekeeping.register_clocksource(&cs) {
            error!("mct: can't register clocksource {}: {}", cs.name, err);
            return Err(err);
        }

        if self.config.register_sched_clock {
            self.timekeeping.register_sched_clock(FRC_BITS, self.clk_rate)?;
        }
        Ok(())
    }

    fn clockevent_init(&self) -> MctResult<()> {
        Comparator::register(
            &self.comparator,
            self.timekeeping,
            self.clk_rate,
            self.config.comp_rating,
        )?;

        self.ctl.request(&IrqRequest {
            irq: self.irqs.global,
            name: COMP_IRQ_NAME,
            flags: IrqFlags::TIMER | IrqFlags::IRQPOLL,
            handler: IrqHandlerKind::Comparator,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Counter input rate in Hz.
    pub fn clk_rate(&self) -> u64 {
        self.clk_rate
    }

    pub fn topology(&self) -> DeliveryTopology {
        self.topology
    }

    pub fn config(&self) -> &MctConfig {
        &self.config
    }

    /// Number of CPUs that have a local timer record.
    pub fn nr_cpus(&self) -> usize {
        self.nr_cpus
    }

    /// Interrupt line currently assigned to `cpu`'s local timer.
    pub fn tick_irq(&self, cpu: usize) -> Option<IrqNumber> {
        self.ticks.get(cpu).and_then(|tick| tick.lock().irq())
    }

    /// Mode of `cpu`'s local timer.
    pub fn tick_mode(&self, cpu: usize) -> Option<ClockEventMode> {
        self.ticks.get(cpu).map(|tick| tick.lock().mode())
    }

    pub fn comparator_mode(&self) -> ClockEventMode {
        self.comparator.lock().mode()
    }

    /// Local timer record of `cpu`, provided the caller runs on `cpu`.
    fn local_tick(&self, cpu: usize) -> MctResult<&Mutex<LocalTick<'a>>> {
        if cpu >= self.nr_cpus {
            return Err(MctError::InvalidCpu { cpu });
        }
        let actual = self.cpus.current_cpu();
        if actual != cpu {
            return Err(MctError::WrongCpu {
                expected: cpu,
                actual,
            });
        }
        Ok(&self.ticks[cpu])
    }

    // -----------------------------------------------------------------------
    // Clocksource callbacks
    // -----------------------------------------------------------------------

    /// Clocksource read: lower 32 bits of the global counter.
    pub fn read_clocksource(&self) -> u64 {
        counter::read32(&self.io) as u64
    }

    /// Scheduler clock read.
    pub fn sched_clock(&self) -> u64 {
        self.read_clocksource()
    }

    /// Delay-loop timer read.
    pub fn read_current_timer(&self) -> u32 {
        counter::read32(&self.io)
    }

    /// Full 64-bit counter value, e.g. for boot time statistics.
    pub fn read64(&self) -> u64 {
        counter::read64(&self.io)
    }

    /// Counter value converted to nanoseconds since it started.
    pub fn uptime_ns(&self) -> u64 {
        ((self.read64() as u128 * NSEC_PER_SEC as u128) / self.clk_rate as u128) as u64
    }

    /// Restart the counter after suspend.
    pub fn clocksource_resume(&self) {
        counter::resume(&self.io);
    }

    // -----------------------------------------------------------------------
    // Clockevent callbacks
    // -----------------------------------------------------------------------

    pub fn comparator_set_next_event(&self, cycles: u32) {
        self.comparator.lock().set_next_event(&self.io, cycles);
    }

    pub fn comparator_set_mode(&self, mode: ClockEventMode) {
        self.comparator
            .lock()
            .set_mode(&self.io, mode, self.config.hz);
    }

    /// Program the calling CPU's local timer to fire `cycles` tick cycles
    /// from now.
    pub fn tick_set_next_event(&self, cycles: u32) -> MctResult<()> {
        let cpu = self.cpus.current_cpu();
        self.local_tick(cpu)?
            .lock()
            .set_next_event(&self.io, cycles);
        Ok(())
    }

    /// Switch the calling CPU's local timer to `mode`.
    pub fn tick_set_mode(&self, mode: ClockEventMode) -> MctResult<()> {
        let cpu = self.cpus.current_cpu();
        self.local_tick(cpu)?
            .lock()
            .set_mode(&self.io, mode, self.config.hz);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Interrupt entry
    // -----------------------------------------------------------------------

    /// Entry point for every interrupt line requested by the driver.
    /// `handler` is the value given in the corresponding [`IrqRequest`].
    pub fn handle_irq(&self, handler: IrqHandlerKind) -> IrqReturn {
        match handler {
            IrqHandlerKind::Comparator => Comparator::handle_irq(&self.comparator, &self.io),
            IrqHandlerKind::Tick(cpu) => self.handle_tick_irq(cpu),
            IrqHandlerKind::PercpuTick => self.handle_tick_irq(self.cpus.current_cpu()),
        }
    }

    fn handle_tick_irq(&self, cpu: usize) -> IrqReturn {
        match self.local_tick(cpu) {
            Ok(tick) => LocalTick::handle_irq(tick, &self.io),
            Err(err) => {
                warn!("mct: spurious tick interrupt: {}", err);
                IrqReturn::None
            }
        }
    }
}

impl<'a> Mct<'a, MmioRegisters> {
    /// Bring up the MCT mapped at `base`, see [`Mct::init`].
    ///
    /// # Safety
    ///
    /// Same contract as [`MmioRegisters::new`].
    pub unsafe fn init_mmio(
        base: *mut u8,
        irqs: MctIrqs,
        topology: DeliveryTopology,
        config: MctConfig,
        platform: Platform<'a>,
    ) -> MctResult<Self> {
        config.validate()?;
        let clk_rate = platform::enable_clocks(platform.clocks)?;
        // SAFETY: Forwarded from the caller.
        let regs = unsafe { MmioRegisters::new(base) }?;
        Self::init_clocked(regs, clk_rate, irqs, topology, config, platform)
    }
}
