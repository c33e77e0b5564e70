//! Interrupt wiring for the MCT.
//!
//! The global comparator always has its own line. Local tick interrupts
//! come in one of two wirings, fixed by the SoC:
//!
//! - [`DeliveryTopology::PrivatePerCpuInterrupt`]: every local timer raises
//!   its own shared peripheral interrupt. Each line is requested once,
//!   kept disabled until its CPU comes online and then forced onto that CPU.
//! - [`DeliveryTopology::SharedInterruptPerCpuDemux`]: all local timers
//!   raise the same private-peripheral interrupt number, banked per core by
//!   the interrupt controller. The line is requested once for all CPUs and
//!   enabled/disabled on the calling CPU only.
//!
//! The difference is confined to the two [`InterruptBinder`] strategies;
//! the local tick code only sees "the line assigned to this CPU, if any".

use bitflags::bitflags;
use log::warn;

use crate::{
    error::{MctError, MctResult},
    name::DeviceName,
    regs::MAX_LOCAL_TIMERS,
};

// ---------------------------------------------------------------------------
// IRQ number newtype
// ---------------------------------------------------------------------------

/// Interrupt number as understood by the platform interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrqNumber(pub u32);

impl core::fmt::Display for IrqNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "IRQ#{}", self.0)
    }
}

bitflags! {
    /// Flags attached to an interrupt request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags: u32 {
        /// Timer interrupt; never threaded, not suspended.
        const TIMER = 1 << 0;
        /// Exclude from interrupt balancing.
        const NOBALANCING = 1 << 1;
        /// Line is bound to a single CPU.
        const PERCPU = 1 << 2;
        /// May be used for polling spurious interrupts.
        const IRQPOLL = 1 << 3;
        /// Leave the line disabled after the request.
        const NOAUTOEN = 1 << 4;
    }
}

/// Which driver handler an interrupt line must be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqHandlerKind {
    /// Global comparator interrupt.
    Comparator,
    /// Dedicated local tick line of the given CPU.
    Tick(usize),
    /// Banked local tick line; the receiving CPU identifies the device.
    PercpuTick,
}

/// Result of running an interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was not for this device.
    None,
    Handled,
}

/// An interrupt request handed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqRequest<'n> {
    pub irq: IrqNumber,
    pub name: &'n str,
    pub flags: IrqFlags,
    /// Handler the platform must invoke (through [`crate::Mct::handle_irq`])
    /// when the line fires.
    pub handler: IrqHandlerKind,
}

// ---------------------------------------------------------------------------
// Interrupt controller seam
// ---------------------------------------------------------------------------

/// Platform interrupt controller operations used by the driver.
pub trait IrqController: Sync {
    /// Request an ordinary line.
    fn request(&self, req: &IrqRequest<'_>) -> MctResult<()>;

    /// Request a banked per-CPU line on behalf of every CPU.
    fn request_percpu(&self, req: &IrqRequest<'_>) -> MctResult<()>;

    /// Release a banked per-CPU line.
    fn free_percpu(&self, irq: IrqNumber);

    fn enable(&self, irq: IrqNumber);

    /// Disable without waiting for a running handler to finish.
    fn disable_nosync(&self, irq: IrqNumber);

    /// Enable a banked line on the calling CPU.
    fn enable_percpu(&self, irq: IrqNumber);

    /// Disable a banked line on the calling CPU.
    fn disable_percpu(&self, irq: IrqNumber);

    /// Route `irq` to `cpu`, even if that CPU is not yet marked online.
    fn force_affinity(&self, irq: IrqNumber, cpu: usize) -> MctResult<()>;
}

// ---------------------------------------------------------------------------
// Interrupt numbers and topology
// ---------------------------------------------------------------------------

/// Firmware interrupt list index of global comparator 0.
const G0_INDEX: usize = 0;
/// Firmware interrupt list index of the first local timer.
const L0_INDEX: usize = 4;

/// Interrupt numbers assigned to the MCT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MctIrqs {
    /// Global comparator 0 line.
    pub global: IrqNumber,
    /// Local timer lines. With the banked wiring only entry 0 is used.
    pub local: [Option<IrqNumber>; MAX_LOCAL_TIMERS],
}

impl MctIrqs {
    /// Build the table from the global line and the first two local lines,
    /// the layout used by boards without a firmware description.
    pub fn from_legacy(g0: IrqNumber, l0: IrqNumber, l1: IrqNumber) -> Self {
        let mut local = [None; MAX_LOCAL_TIMERS];
        local[0] = Some(l0);
        local[1] = Some(l1);
        Self { global: g0, local }
    }

    /// Build the table from a firmware interrupt list.
    ///
    /// The list holds the four global comparator lines (only the first is
    /// used) followed by the local timer lines.
    pub fn from_list(list: &[IrqNumber]) -> MctResult<Self> {
        let global = *list
            .get(G0_INDEX)
            .ok_or(MctError::IrqMissing { index: G0_INDEX })?;
        let mut local = [None; MAX_LOCAL_TIMERS];
        for (slot, &irq) in local.iter_mut().zip(list.iter().skip(L0_INDEX)) {
            *slot = Some(irq);
        }
        Ok(Self { global, local })
    }

    /// Local line of `cpu`, if one was provided.
    pub fn local(&self, cpu: usize) -> Option<IrqNumber> {
        self.local.get(cpu).copied().flatten()
    }
}

/// How local tick interrupts reach their CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTopology {
    /// One banked interrupt number shared by all CPUs.
    SharedInterruptPerCpuDemux,
    /// One dedicated interrupt line per CPU.
    PrivatePerCpuInterrupt,
}

impl DeliveryTopology {
    /// Topology implied by a firmware compatible string.
    pub fn from_compatible(compatible: &str) -> Option<Self> {
        match compatible {
            "samsung,exynos4210-mct" => Some(Self::PrivatePerCpuInterrupt),
            "samsung,exynos4412-mct" => Some(Self::SharedInterruptPerCpuDemux),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Binder strategies
// ---------------------------------------------------------------------------

/// Name of the banked local tick interrupt.
const PERCPU_IRQ_NAME: &str = "MCT";

/// Per-topology interrupt registration and masking for local ticks.
pub trait InterruptBinder {
    /// Boot-time request of the local tick lines for the first
    /// `lines.len()` CPUs. Each slot receives the line assigned to that CPU,
    /// or `None` if its request failed.
    fn request_lines(&self, ctl: &dyn IrqController, lines: &mut [Option<IrqNumber>]);

    /// First-time binding of `cpu`'s line. `assigned` is what boot-time
    /// requests produced; the returned value becomes the new assignment.
    fn bind(
        &self,
        ctl: &dyn IrqController,
        cpu: usize,
        name: &DeviceName,
        assigned: Option<IrqNumber>,
    ) -> Option<IrqNumber>;

    /// Deliver `line` to `cpu`. Called on `cpu`.
    fn enable(&self, ctl: &dyn IrqController, cpu: usize, line: IrqNumber);

    /// Stop delivering `line` to the calling CPU.
    fn disable(&self, ctl: &dyn IrqController, line: IrqNumber);

    /// Undo [`request_lines`](Self::request_lines) after a failed boot.
    fn release(&self, ctl: &dyn IrqController);
}

/// One dedicated line per CPU.
#[derive(Debug, Clone, Copy)]
pub struct PrivateLines {
    irqs: MctIrqs,
}

impl PrivateLines {
    pub fn new(irqs: MctIrqs) -> Self {
        Self { irqs }
    }

    fn request_one(
        &self,
        ctl: &dyn IrqController,
        cpu: usize,
        name: &DeviceName,
        flags: IrqFlags,
    ) -> Option<IrqNumber> {
        let Some(irq) = self.irqs.local(cpu) else {
            warn!("mct: no local timer interrupt for cpu{}", cpu);
            return None;
        };
        let req = IrqRequest {
            irq,
            name: name.as_str(),
            flags,
            handler: IrqHandlerKind::Tick(cpu),
        };
        match ctl.request(&req) {
            Ok(()) => Some(irq),
            Err(err) => {
                warn!("mct: cannot register IRQ {} (cpu{}): {}", irq.0, cpu, err);
                None
            }
        }
    }
}

impl InterruptBinder for PrivateLines {
    fn request_lines(&self, ctl: &dyn IrqController, lines: &mut [Option<IrqNumber>]) {
        for (cpu, slot) in lines.iter_mut().enumerate() {
            *slot = self.request_one(
                ctl,
                cpu,
                &DeviceName::tick(cpu),
                IrqFlags::TIMER | IrqFlags::NOBALANCING | IrqFlags::NOAUTOEN,
            );
        }
    }

    fn bind(
        &self,
        ctl: &dyn IrqController,
        cpu: usize,
        name: &DeviceName,
        assigned: Option<IrqNumber>,
    ) -> Option<IrqNumber> {
        if assigned.is_some() {
            return assigned;
        }
        self.request_one(
            ctl,
            cpu,
            name,
            IrqFlags::TIMER | IrqFlags::NOBALANCING | IrqFlags::PERCPU | IrqFlags::NOAUTOEN,
        )
    }

    fn enable(&self, ctl: &dyn IrqController, cpu: usize, line: IrqNumber) {
        // The line is still enabled: the CPU's tick is registered either way.
        if let Err(err) = ctl.force_affinity(line, cpu) {
            warn!("mct: cannot route {} to cpu{}: {}", line, cpu, err);
        }
        ctl.enable(line);
    }

    fn disable(&self, ctl: &dyn IrqController, line: IrqNumber) {
        ctl.disable_nosync(line);
    }

    fn release(&self, _ctl: &dyn IrqController) {}
}

/// One banked line demultiplexed per CPU by the interrupt controller.
#[derive(Debug, Clone, Copy)]
pub struct SharedLine {
    irq: Option<IrqNumber>,
}

impl SharedLine {
    pub fn new(irqs: MctIrqs) -> Self {
        Self { irq: irqs.local(0) }
    }
}

impl InterruptBinder for SharedLine {
    fn request_lines(&self, ctl: &dyn IrqController, lines: &mut [Option<IrqNumber>]) {
        let Some(irq) = self.irq else {
            warn!("mct: no local timer interrupt provided");
            return;
        };
        let req = IrqRequest {
            irq,
            name: PERCPU_IRQ_NAME,
            flags: IrqFlags::TIMER | IrqFlags::PERCPU,
            handler: IrqHandlerKind::PercpuTick,
        };
        if let Err(err) = ctl.request_percpu(&req) {
            warn!("mct: can't request IRQ {} ({})", irq.0, err);
            return;
        }
        lines.fill(Some(irq));
    }

    fn bind(
        &self,
        _ctl: &dyn IrqController,
        _cpu: usize,
        _name: &DeviceName,
        assigned: Option<IrqNumber>,
    ) -> Option<IrqNumber> {
        assigned
    }

    fn enable(&self, ctl: &dyn IrqController, _cpu: usize, line: IrqNumber) {
        ctl.enable_percpu(line);
    }

    fn disable(&self, ctl: &dyn IrqController, line: IrqNumber) {
        ctl.disable_percpu(line);
    }

    fn release(&self, ctl: &dyn IrqController) {
        if let Some(irq) = self.irq {
            ctl.free_percpu(irq);
        }
    }
}

/// The binder selected for this boot.
#[derive(Debug, Clone, Copy)]
pub enum Binder {
    Shared(SharedLine),
    Private(PrivateLines),
}

impl Binder {
    pub fn new(topology: DeliveryTopology, irqs: MctIrqs) -> Self {
        match topology {
            DeliveryTopology::SharedInterruptPerCpuDemux => Self::Shared(SharedLine::new(irqs)),
            DeliveryTopology::PrivatePerCpuInterrupt => Self::Private(PrivateLines::new(irqs)),
        }
    }

    fn strategy(&self) -> &dyn InterruptBinder {
        match self {
            Self::Shared(b) => b,
            Self::Private(b) => b,
        }
    }
}

impl InterruptBinder for Binder {
    fn request_lines(&self, ctl: &dyn IrqController, lines: &mut [Option<IrqNumber>]) {
        self.strategy().request_lines(ctl, lines)
    }

    fn bind(
        &self,
        ctl: &dyn IrqController,
        cpu: usize,
        name: &DeviceName,
        assigned: Option<IrqNumber>,
    ) -> Option<IrqNumber> {
        self.strategy().bind(ctl, cpu, name, assigned)
    }

    fn enable(&self, ctl: &dyn IrqController, cpu: usize, line: IrqNumber) {
        self.strategy().enable(ctl, cpu, line)
    }

    fn disable(&self, ctl: &dyn IrqController, line: IrqNumber) {
        self.strategy().disable(ctl, line)
    }

    fn release(&self, ctl: &dyn IrqController) {
        self.strategy().release(ctl)
    }
}
