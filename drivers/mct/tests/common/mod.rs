//! Fake platform for MCT integration tests.
//!
//! `Board` plays every collaborator the driver talks to: clock tree,
//! interrupt controller, CPU identity, time-keeping framework and event
//! sink. `Registers` is a register file that acknowledges every write.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use spin::Mutex;
use veridian_mct::{
    framework::{ClockEventDesc, ClockSourceDesc},
    irq::{IrqFlags, IrqRequest},
    regs::{
        ack_status, local_base, G_CNT_L, G_CNT_U, G_CNT_WSTAT, G_INT_CSTAT, G_WSTAT,
        L_INT_CSTAT, L_WSTAT, MAX_LOCAL_TIMERS,
    },
    ClockEventId, ClockProvider, CpuOps, DeliveryTopology, EventSink, IrqController,
    IrqHandlerKind, IrqNumber, Mct, MctConfig, MctError, MctIrqs, MctResult, Monotonic,
    Platform, RegisterSpace, TimeKeeping,
};

pub const CLK_RATE: u64 = 24_000_000;
pub const G0_IRQ: u32 = 89;
/// First local timer line; CPU n uses `L0_IRQ + n`.
pub const L0_IRQ: u32 = 120;

// ---------------------------------------------------------------------------
// Register file
// ---------------------------------------------------------------------------

fn is_w1c(offset: usize) -> bool {
    matches!(offset, G_WSTAT | G_CNT_WSTAT | G_INT_CSTAT)
        || (0..MAX_LOCAL_TIMERS).any(|cpu| {
            offset == local_base(cpu) + L_WSTAT || offset == local_base(cpu) + L_INT_CSTAT
        })
}

/// Register file with instant write acknowledgment and a settable counter.
#[derive(Default)]
pub struct Registers {
    regs: Mutex<HashMap<usize, u32>>,
    writes: Mutex<Vec<(usize, u32)>>,
    counter: AtomicU64,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reg(&self, offset: usize) -> u32 {
        self.regs.lock().get(&offset).copied().unwrap_or(0)
    }

    pub fn set_reg(&self, offset: usize, value: u32) {
        self.regs.lock().insert(offset, value);
    }

    pub fn writes_to(&self, offset: usize) -> Vec<u32> {
        self.writes
            .lock()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|&(_, v)| v)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn set_counter(&self, value: u64) {
        self.counter.store(value, Ordering::Relaxed);
    }
}

impl RegisterSpace for Registers {
    fn read(&self, offset: usize) -> u32 {
        match offset {
            G_CNT_L => self.counter.load(Ordering::Relaxed) as u32,
            G_CNT_U => (self.counter.load(Ordering::Relaxed) >> 32) as u32,
            _ => self.reg(offset),
        }
    }

    fn write(&self, offset: usize, value: u32) {
        self.writes.lock().push((offset, value));
        let mut regs = self.regs.lock();
        if is_w1c(offset) {
            *regs.entry(offset).or_insert(0) &= !value;
            return;
        }
        regs.insert(offset, value);
        if let Some(status) = ack_status(offset) {
            *regs.entry(status.offset).or_insert(0) |= status.mask;
        }
    }
}

/// Nanosecond clock advancing 100 ns per read.
#[derive(Default)]
pub struct Clock(AtomicU64);

impl Monotonic for Clock {
    fn now_ns(&self) -> u64 {
        self.0.fetch_add(100, Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Interrupt controller call, as seen by the fake controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqCall {
    Request {
        irq: u32,
        flags: IrqFlags,
        handler: IrqHandlerKind,
    },
    RequestPercpu {
        irq: u32,
    },
    FreePercpu {
        irq: u32,
    },
    Enable {
        irq: u32,
    },
    DisableNosync {
        irq: u32,
    },
    EnablePercpu {
        irq: u32,
        cpu: usize,
    },
    DisablePercpu {
        irq: u32,
        cpu: usize,
    },
    Affinity {
        irq: u32,
        cpu: usize,
    },
}

/// Clockevent registration, as seen by the fake framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: ClockEventId,
    pub name: String,
    pub rating: u32,
    pub cpu: usize,
    pub freq_hz: u64,
    pub min_delta_ticks: u64,
    pub max_delta_ticks: u64,
}

pub struct Board {
    cpu: AtomicUsize,
    possible_cpus: usize,
    refused_irqs: Mutex<Vec<u32>>,
    refused_affinity: Mutex<Vec<u32>>,
    notifier_fails: bool,
    pub irq_calls: Mutex<Vec<IrqCall>>,
    pub clocksources: Mutex<Vec<ClockSourceDesc>>,
    pub clockevents: Mutex<Vec<Registration>>,
    pub sched_clock: Mutex<Option<(u32, u64)>>,
    pub delay_timer: Mutex<Option<u64>>,
    pub fired: Mutex<Vec<(usize, ClockEventId)>>,
}

impl Board {
    pub fn new(possible_cpus: usize) -> Self {
        Self {
            cpu: AtomicUsize::new(0),
            possible_cpus,
            refused_irqs: Mutex::new(Vec::new()),
            refused_affinity: Mutex::new(Vec::new()),
            notifier_fails: false,
            irq_calls: Mutex::new(Vec::new()),
            clocksources: Mutex::new(Vec::new()),
            clockevents: Mutex::new(Vec::new()),
            sched_clock: Mutex::new(None),
            delay_timer: Mutex::new(None),
            fired: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failing_notifier(mut self) -> Self {
        self.notifier_fails = true;
        self
    }

    /// Make every request of `irq` fail.
    pub fn refuse_irq(&self, irq: u32) {
        self.refused_irqs.lock().push(irq);
    }

    /// Make every attempt to route `irq` to a CPU fail.
    pub fn refuse_affinity(&self, irq: u32) {
        self.refused_affinity.lock().push(irq);
    }

    /// Pretend to execute on `cpu` from now on.
    pub fn run_on(&self, cpu: usize) {
        self.cpu.store(cpu, Ordering::Relaxed);
    }

    pub fn platform<'a>(&'a self, clock: &'a Clock) -> Platform<'a> {
        Platform {
            clocks: self,
            clock,
            irq: self,
            cpus: self,
            timekeeping: self,
        }
    }

    pub fn irq_calls(&self) -> Vec<IrqCall> {
        self.irq_calls.lock().clone()
    }

    pub fn clear_irq_calls(&self) {
        self.irq_calls.lock().clear();
    }

    pub fn tick_registrations(&self, cpu: usize) -> usize {
        self.clockevents
            .lock()
            .iter()
            .filter(|r| r.id == ClockEventId::Tick(cpu))
            .count()
    }

    fn record(&self, call: IrqCall) {
        self.irq_calls.lock().push(call);
    }

    fn refused(&self, irq: IrqNumber) -> MctResult<()> {
        if self.refused_irqs.lock().contains(&irq.0) {
            Err(MctError::IrqRequestFailed { irq: irq.0 })
        } else {
            Ok(())
        }
    }
}

impl ClockProvider for Board {
    fn rate(&self, name: &str) -> Option<u64> {
        (name == "fin_pll").then_some(CLK_RATE)
    }

    fn prepare_enable(&self, name: &'static str) -> MctResult<()> {
        if name == "mct" {
            Ok(())
        } else {
            Err(MctError::ClockEnableFailed { clock: name })
        }
    }
}

impl CpuOps for Board {
    fn current_cpu(&self) -> usize {
        self.cpu.load(Ordering::Relaxed)
    }

    fn possible_cpus(&self) -> usize {
        self.possible_cpus
    }

    fn register_notifier(&self) -> MctResult<()> {
        if self.notifier_fails {
            Err(MctError::NotifierFailed)
        } else {
            Ok(())
        }
    }
}

impl IrqController for Board {
    fn request(&self, req: &IrqRequest<'_>) -> MctResult<()> {
        self.record(IrqCall::Request {
            irq: req.irq.0,
            flags: req.flags,
            handler: req.handler,
        });
        self.refused(req.irq)
    }

    fn request_percpu(&self, req: &IrqRequest<'_>) -> MctResult<()> {
        self.record(IrqCall::RequestPercpu { irq: req.irq.0 });
        self.refused(req.irq)
    }

    fn free_percpu(&self, irq: IrqNumber) {
        self.record(IrqCall::FreePercpu { irq: irq.0 });
    }

    fn enable(&self, irq: IrqNumber) {
        self.record(IrqCall::Enable { irq: irq.0 });
    }

    fn disable_nosync(&self, irq: IrqNumber) {
        self.record(IrqCall::DisableNosync { irq: irq.0 });
    }

    fn enable_percpu(&self, irq: IrqNumber) {
        self.record(IrqCall::EnablePercpu {
            irq: irq.0,
            cpu: self.current_cpu(),
        });
    }

    fn disable_percpu(&self, irq: IrqNumber) {
        self.record(IrqCall::DisablePercpu {
            irq: irq.0,
            cpu: self.current_cpu(),
        });
    }

    fn force_affinity(&self, irq: IrqNumber, cpu: usize) -> MctResult<()> {
        self.record(IrqCall::Affinity { irq: irq.0, cpu });
        if self.refused_affinity.lock().contains(&irq.0) {
            return Err(MctError::AffinityFailed { irq: irq.0, cpu });
        }
        Ok(())
    }
}

impl EventSink for Board {
    fn on_fire(&self, device: ClockEventId) {
        let cpu = self.current_cpu();
        self.fired.lock().push((cpu, device));
    }
}

impl TimeKeeping for Board {
    fn register_clocksource(&self, cs: &ClockSourceDesc) -> MctResult<()> {
        self.clocksources.lock().push(*cs);
        Ok(())
    }

    fn register_sched_clock(&self, bits: u32, rate_hz: u64) -> MctResult<()> {
        *self.sched_clock.lock() = Some((bits, rate_hz));
        Ok(())
    }

    fn register_delay_timer(&self, rate_hz: u64) -> MctResult<()> {
        *self.delay_timer.lock() = Some(rate_hz);
        Ok(())
    }

    fn register_clockevent(&self, dev: &ClockEventDesc<'_>) -> MctResult<&dyn EventSink> {
        self.clockevents.lock().push(Registration {
            id: dev.id,
            name: dev.name.to_string(),
            rating: dev.rating,
            cpu: dev.cpu,
            freq_hz: dev.freq_hz,
            min_delta_ticks: dev.min_delta_ticks,
            max_delta_ticks: dev.max_delta_ticks,
        });
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Firmware interrupt list: four global comparators, then `nr_local` local
/// lines.
pub fn irq_list(nr_local: usize) -> MctIrqs {
    let mut list: Vec<IrqNumber> = (0..4).map(|i| IrqNumber(G0_IRQ + i)).collect();
    list.extend((0..nr_local as u32).map(|i| IrqNumber(L0_IRQ + i)));
    MctIrqs::from_list(&list).expect("global comparator line present")
}

/// Bring up an MCT on the boot CPU (CPU 0).
pub fn boot<'a>(
    regs: &'a Registers,
    clock: &'a Clock,
    board: &'a Board,
    topology: DeliveryTopology,
) -> Mct<'a, &'a Registers> {
    board.run_on(0);
    Mct::init(
        regs,
        irq_list(board.possible_cpus),
        topology,
        MctConfig::default(),
        board.platform(clock),
    )
    .expect("MCT init")
}

/// Bring `cpu` online: run its starting notification on it.
pub fn bring_up(mct: &Mct<'_, &Registers>, board: &Board, cpu: usize) {
    board.run_on(cpu);
    mct.cpu_notify(veridian_mct::CpuAction::Starting, cpu)
        .expect("cpu starting");
}

/// Take `cpu` offline: run its dying notification on it.
pub fn take_down(mct: &Mct<'_, &Registers>, board: &Board, cpu: usize) {
    board.run_on(cpu);
    mct.cpu_notify(veridian_mct::CpuAction::Dying, cpu)
        .expect("cpu dying");
}
