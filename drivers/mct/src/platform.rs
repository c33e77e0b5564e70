//! Platform services the driver depends on.
//!
//! The driver never reaches into global kernel state. Everything it needs
//! from the surrounding system (clocks, interrupt controller, CPU
//! identity, time-keeping framework, a bounded-wait clock) is handed to
//! [`crate::Mct::init`] as a [`Platform`] bundle.

use crate::{
    config::{GATE_CLOCK, RATE_CLOCK},
    error::{MctError, MctResult},
    framework::TimeKeeping,
    io::Monotonic,
    irq::IrqController,
};

/// Clock tree lookups.
pub trait ClockProvider: Sync {
    /// Rate of clock `name` in Hz, or `None` if the clock does not exist.
    fn rate(&self, name: &str) -> Option<u64>;

    /// Prepare and enable clock `name`.
    fn prepare_enable(&self, name: &'static str) -> MctResult<()>;
}

/// CPU identity and hotplug registration.
pub trait CpuOps: Sync {
    /// Index of the CPU executing the call.
    fn current_cpu(&self) -> usize;

    /// Number of CPUs that may ever come online.
    fn possible_cpus(&self) -> usize;

    /// Subscribe the driver to CPU starting/dying notifications. The
    /// platform then calls [`crate::Mct::cpu_notify`] on the affected CPU.
    fn register_notifier(&self) -> MctResult<()>;
}

/// Platform services used by one driver instance.
#[derive(Clone, Copy)]
pub struct Platform<'a> {
    pub clocks: &'a dyn ClockProvider,
    /// Clock bounding the write acknowledgment wait.
    pub clock: &'a dyn Monotonic,
    pub irq: &'a dyn IrqController,
    pub cpus: &'a dyn CpuOps,
    pub timekeeping: &'a dyn TimeKeeping,
}

/// Look up the counter input rate and ungate the block.
pub fn enable_clocks(clocks: &dyn ClockProvider) -> MctResult<u64> {
    let rate = clocks
        .rate(RATE_CLOCK)
        .filter(|&rate| rate != 0)
        .ok_or(MctError::ClockUnavailable { clock: RATE_CLOCK })?;

    clocks
        .prepare_enable(GATE_CLOCK)
        .map_err(|_| MctError::ClockEnableFailed { clock: GATE_CLOCK })?;

    Ok(rate)
}
