//! MCT register map and raw register access.
//!
//! The timer block is split into three register groups:
//!
//! - **Global counter** (`0x100..0x114`): 64-bit free-running counter exposed
//!   as two 32-bit halves plus a write-status register.
//! - **Global comparator 0** (`0x200..0x250`): 64-bit compare value, an
//!   auto-increment amount, the global control register and the interrupt
//!   status/enable registers.
//! - **Local timers** (`0x300 + 0x100 * cpu`): one tick counter and interrupt
//!   counter per CPU, each with its own control and status registers.
//!
//! Writes to registers that live in the timer clock domain only take effect
//! once the hardware reports them in a write-status register. Which status
//! register and bit acknowledge a given offset is answered by
//! [`ack_status`]; the wait itself is implemented in [`crate::io`].

use core::ptr::{self, NonNull};

use bitflags::bitflags;

use crate::error::{MctError, MctResult};

// ---------------------------------------------------------------------------
// Global register offsets
// ---------------------------------------------------------------------------

/// Global counter, lower 32 bits.
pub const G_CNT_L: usize = 0x100;
/// Global counter, upper 32 bits.
pub const G_CNT_U: usize = 0x104;
/// Global counter write status.
pub const G_CNT_WSTAT: usize = 0x110;
/// Comparator 0 value, lower 32 bits.
pub const G_COMP0_L: usize = 0x200;
/// Comparator 0 value, upper 32 bits.
pub const G_COMP0_U: usize = 0x204;
/// Comparator 0 auto-increment amount.
pub const G_COMP0_ADD_INCR: usize = 0x208;
/// Global timer control.
pub const G_TCON: usize = 0x240;
/// Global interrupt status (write 1 to clear).
pub const G_INT_CSTAT: usize = 0x244;
/// Global interrupt enable.
pub const G_INT_ENB: usize = 0x248;
/// Global write status for the comparator and control registers.
pub const G_WSTAT: usize = 0x24C;

// ---------------------------------------------------------------------------
// Local register offsets
// ---------------------------------------------------------------------------

/// Start of the first local timer block.
const L_BASE_0: usize = 0x300;
/// Size of one local timer block.
const L_STRIDE: usize = 0x100;
/// Mask selecting the local block base out of a local register offset.
const L_MASK: usize = 0xffff_ff00;

/// Tick count buffer.
pub const L_TCNTB: usize = 0x00;
/// Interrupt count buffer.
pub const L_ICNTB: usize = 0x08;
/// Local timer control.
pub const L_TCON: usize = 0x20;
/// Local interrupt status (write 1 to clear).
pub const L_INT_CSTAT: usize = 0x30;
/// Local interrupt enable.
pub const L_INT_ENB: usize = 0x34;
/// Local write status.
pub const L_WSTAT: usize = 0x40;

/// Number of local timer blocks implemented by the hardware.
pub const MAX_LOCAL_TIMERS: usize = 8;

/// Value loaded into the tick count buffer. The tick counter divides the
/// input clock by `TICK_BASE_CNT + 1` before feeding the interrupt counter.
pub const TICK_BASE_CNT: u32 = 1;

/// Set in the interrupt count buffer to make the hardware latch a new count.
pub const ICNTB_UPDATE: u32 = 1 << 31;

/// Base offset of the local timer block that belongs to `cpu`.
pub const fn local_base(cpu: usize) -> usize {
    L_BASE_0 + L_STRIDE * cpu
}

// ---------------------------------------------------------------------------
// Register bit definitions
// ---------------------------------------------------------------------------

bitflags! {
    /// Global timer control register (`G_TCON`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlobalTcon: u32 {
        const COMP0_ENABLE = 1 << 0;
        const COMP0_AUTO_INC = 1 << 1;
        const TIMER_START = 1 << 8;
    }
}

bitflags! {
    /// Local timer control register (`L_TCON`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LocalTcon: u32 {
        const TIMER_START = 1 << 0;
        const INT_START = 1 << 1;
        const INTERVAL_MODE = 1 << 2;
    }
}

bitflags! {
    /// Write status bits in `G_WSTAT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlobalWstat: u32 {
        const COMP0_L = 1 << 0;
        const COMP0_U = 1 << 1;
        const COMP0_ADD_INCR = 1 << 2;
        const TCON = 1 << 16;
    }
}

bitflags! {
    /// Write status bits in `G_CNT_WSTAT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlobalCntWstat: u32 {
        const CNT_L = 1 << 0;
        const CNT_U = 1 << 1;
    }
}

bitflags! {
    /// Write status bits in `L_WSTAT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LocalWstat: u32 {
        const TCNTB = 1 << 0;
        const ICNTB = 1 << 1;
        const TCON = 1 << 3;
    }
}

// ---------------------------------------------------------------------------
// Write acknowledgment classification
// ---------------------------------------------------------------------------

/// Where the hardware acknowledges a write to a given register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckStatus {
    /// Offset of the write-status register to poll.
    pub offset: usize,
    /// Bit that is set once the write has been applied.
    pub mask: u32,
}

/// Return the write-status register and bit for `offset`, or `None` for
/// registers that are written without acknowledgment.
pub fn ack_status(offset: usize) -> Option<AckStatus> {
    if offset >= local_base(0) {
        let mask = match offset & !L_MASK {
            L_TCON => LocalWstat::TCON,
            L_ICNTB => LocalWstat::ICNTB,
            L_TCNTB => LocalWstat::TCNTB,
            _ => return None,
        };
        return Some(AckStatus {
            offset: (offset & L_MASK) + L_WSTAT,
            mask: mask.bits(),
        });
    }

    let (status, mask) = match offset {
        G_TCON => (G_WSTAT, GlobalWstat::TCON.bits()),
        G_COMP0_L => (G_WSTAT, GlobalWstat::COMP0_L.bits()),
        G_COMP0_U => (G_WSTAT, GlobalWstat::COMP0_U.bits()),
        G_COMP0_ADD_INCR => (G_WSTAT, GlobalWstat::COMP0_ADD_INCR.bits()),
        G_CNT_L => (G_CNT_WSTAT, GlobalCntWstat::CNT_L.bits()),
        G_CNT_U => (G_CNT_WSTAT, GlobalCntWstat::CNT_U.bits()),
        _ => return None,
    };
    Some(AckStatus {
        offset: status,
        mask,
    })
}

// ---------------------------------------------------------------------------
// Register space
// ---------------------------------------------------------------------------

/// Raw 32-bit access to the mapped MCT register block.
///
/// Offsets are byte offsets from the start of the block. Implementations
/// perform plain accesses; the acknowledgment protocol lives one layer up.
pub trait RegisterSpace {
    /// Read the register at `offset`.
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`.
    fn write(&self, offset: usize, value: u32);
}

impl<T: RegisterSpace + ?Sized> RegisterSpace for &T {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        (**self).write(offset, value)
    }
}

/// Memory-mapped MCT register block.
pub struct MmioRegisters {
    base: NonNull<u8>,
}

impl MmioRegisters {
    /// Wrap the virtual address of an already mapped register block.
    ///
    /// Returns [`MctError::UnmappedRegisters`] if `base` is null.
    ///
    /// # Safety
    ///
    /// `base` must point to the MCT register block, mapped as device memory
    /// for the lifetime of the returned value, and nothing else may access
    /// the block other than through this driver.
    pub unsafe fn new(base: *mut u8) -> MctResult<Self> {
        NonNull::new(base)
            .map(|base| Self { base })
            .ok_or(MctError::UnmappedRegisters)
    }

    /// Virtual base address of the register block.
    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }
}

// SAFETY: The register block is device memory shared by all CPUs; every
// access is a single volatile 32-bit load or store which the interconnect
// serializes per register.
unsafe impl Send for MmioRegisters {}
// SAFETY: See the `Send` impl above. No Rust-visible state is mutated.
unsafe impl Sync for MmioRegisters {}

impl RegisterSpace for MmioRegisters {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `base` maps the whole MCT block (guaranteed by `new`'s
        // contract) and all offsets used by the driver are register offsets
        // inside it. Volatile read is required for MMIO.
        unsafe { ptr::read_volatile(self.base.as_ptr().add(offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        // SAFETY: Same as `read`. Volatile write is required so the store
        // reaches the device and is not merged or elided.
        unsafe { ptr::write_volatile(self.base.as_ptr().add(offset) as *mut u32, value) }
    }
}
