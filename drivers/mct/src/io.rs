//! Register access layer and write acknowledgment protocol.
//!
//! The MCT runs from a clock that is asynchronous to the bus. A store to a
//! register in the timer clock domain is only guaranteed to have landed once
//! the matching bit in a write-status register is set. Every such write is
//! therefore followed by a bounded poll of that bit, and the bit is cleared
//! (write-1-to-clear) once seen.
//!
//! If the bit never shows up the block is considered wedged. Nothing after
//! that point can be trusted, so [`RegisterIo::write`] panics with the value
//! and offset that were being written.

use log::error;

use crate::{
    error::{MctError, MctResult},
    regs::{ack_status, RegisterSpace},
};

/// Default upper bound for one acknowledgment wait (1 ms).
pub const DEFAULT_ACK_TIMEOUT_NS: u64 = 1_000_000;

/// Monotonic nanosecond clock used to bound the acknowledgment wait.
///
/// Must not be backed by the MCT itself: the counter may not be running
/// yet when the first acknowledged write is issued.
pub trait Monotonic: Sync {
    /// Current time in nanoseconds from an arbitrary fixed origin.
    fn now_ns(&self) -> u64;
}

/// Register access wrapper implementing the acknowledgment protocol.
pub struct RegisterIo<'a, R> {
    regs: R,
    clock: &'a dyn Monotonic,
    ack_timeout_ns: u64,
}

impl<'a, R: RegisterSpace> RegisterIo<'a, R> {
    /// Create the access layer over `regs`.
    pub fn new(regs: R, clock: &'a dyn Monotonic, ack_timeout_ns: u64) -> Self {
        Self {
            regs,
            clock,
            ack_timeout_ns,
        }
    }

    /// Underlying register space.
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Plain, non-blocking register read.
    #[inline]
    pub fn read(&self, offset: usize) -> u32 {
        self.regs.read(offset)
    }

    /// Write `value` at `offset` and wait for the hardware to acknowledge it.
    ///
    /// Registers outside the acknowledged set are written and the call
    /// returns immediately. Returns [`MctError::AckTimeout`] if the status
    /// bit is not observed within the configured bound.
    pub fn try_write(&self, value: u32, offset: usize) -> MctResult<()> {
        self.regs.write(offset, value);

        let Some(status) = ack_status(offset) else {
            return Ok(());
        };

        let start = self.clock.now_ns();
        loop {
            if self.regs.read(status.offset) & status.mask != 0 {
                self.regs.write(status.offset, status.mask);
                return Ok(());
            }

            let waited_ns = self.clock.now_ns().saturating_sub(start);
            if waited_ns > self.ack_timeout_ns {
                return Err(MctError::AckTimeout {
                    offset,
                    value,
                    waited_ns,
                });
            }
            core::hint::spin_loop();
        }
    }

    /// Write `value` at `offset`, treating a missing acknowledgment as fatal.
    ///
    /// # Panics
    ///
    /// Panics if the hardware does not acknowledge the write in time.
    pub fn write(&self, value: u32, offset: usize) {
        if let Err(err) = self.try_write(value, offset) {
            hang(err);
        }
    }
}

#[cold]
#[inline(never)]
fn hang(err: MctError) -> ! {
    error!("{}", err);
    panic!("{}", err);
}
