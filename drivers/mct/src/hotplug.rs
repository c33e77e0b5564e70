//! CPU bring-up and teardown of local tick timers.
//!
//! A local timer is set up on its own CPU when that CPU starts (and for the
//! boot CPU during [`crate::Mct::init`]), and torn down on its own CPU when
//! it is about to go offline. The register base, device name and interrupt
//! binding are derived on the first setup only; later setups of the same
//! CPU reuse them.

use log::{debug, warn};

use crate::{
    error::MctResult,
    framework::ClockEventMode,
    irq::InterruptBinder,
    regs::RegisterSpace,
    tick::LocalTick,
    Mct,
};

/// CPU hotplug notification delivered to [`Mct::cpu_notify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuAction {
    /// The CPU is coming online; interrupts are still disabled on it.
    Starting,
    /// The CPU is going offline.
    Dying,
    /// Any other notification; ignored.
    Other,
}

impl<'a, R: RegisterSpace> Mct<'a, R> {
    /// Handle a hotplug notification for `cpu`. Must run on `cpu`.
    pub fn cpu_notify(&self, action: CpuAction, cpu: usize) -> MctResult<()> {
        match action {
            CpuAction::Starting => self.on_cpu_starting(cpu),
            CpuAction::Dying => self.on_cpu_dying(cpu),
            CpuAction::Other => Ok(()),
        }
    }

    /// Set up and register the local timer of `cpu`.
    pub fn on_cpu_starting(&self, cpu: usize) -> MctResult<()> {
        self.setup_local_timer(cpu)
    }

    /// Stop the local timer of `cpu` and mask its interrupt.
    pub fn on_cpu_dying(&self, cpu: usize) -> MctResult<()> {
        self.stop_local_timer(cpu)
    }

    pub(crate) fn setup_local_timer(&self, cpu: usize) -> MctResult<()> {
        let cell = self.local_tick(cpu)?;

        {
            let mut tick = cell.lock();

            if tick.derive_identity() {
                let line = self.binder.bind(self.ctl, cpu, tick.name(), tick.irq());
                tick.set_irq(line);
            }

            tick.load_tick_count(&self.io);

            match tick.irq() {
                Some(line) if !tick.irq_enabled() => {
                    self.binder.enable(self.ctl, cpu, line);
                    tick.set_irq_enabled(true);
                }
                Some(_) => {}
                None => warn!("mct: {} has no interrupt, its events are lost", tick.name()),
            }
        }

        // Unlocked: the framework may program the device while registering it.
        LocalTick::register(cell, self.timekeeping, self.clk_rate, self.config.tick_rating)?;

        let mut tick = cell.lock();
        tick.mark_setup();
        debug!("mct: {} up (irq {:?})", tick.name(), tick.irq());
        Ok(())
    }

    pub(crate) fn stop_local_timer(&self, cpu: usize) -> MctResult<()> {
        let mut tick = self.local_tick(cpu)?.lock();

        if !tick.is_setup() {
            warn!("mct: cpu{} local timer was never set up", cpu);
            return Ok(());
        }

        tick.set_mode(&self.io, ClockEventMode::Unused, self.config.hz);

        if let Some(line) = tick.irq() {
            if tick.irq_enabled() {
                self.binder.disable(self.ctl, line);
                tick.set_irq_enabled(false);
            }
        }
        debug!("mct: {} down", tick.name());
        Ok(())
    }
}
