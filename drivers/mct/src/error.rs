//! Error types for the MCT driver
//!
//! Every fallible driver step returns [`MctResult`]. Initialization errors
//! are meant to abort boot; the platform glue decides how to report them.
//! The only failure the driver escalates on its own is an unacknowledged
//! register write, see [`crate::io::RegisterIo::write`].

use core::fmt;

/// Main driver error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MctError {
    /// Clock-related errors
    ClockUnavailable {
        clock: &'static str,
    },
    ClockEnableFailed {
        clock: &'static str,
    },

    /// Register block errors
    UnmappedRegisters,
    AckTimeout {
        offset: usize,
        value: u32,
        waited_ns: u64,
    },

    /// Interrupt errors
    IrqRequestFailed {
        irq: u32,
    },
    IrqMissing {
        index: usize,
    },
    AffinityFailed {
        irq: u32,
        cpu: usize,
    },

    /// Per-CPU errors
    InvalidCpu {
        cpu: usize,
    },
    WrongCpu {
        expected: usize,
        actual: usize,
    },

    /// Framework errors
    RegistrationFailed {
        device: &'static str,
    },
    NotifierFailed,

    /// Generic errors
    InvalidArgument {
        name: &'static str,
        value: &'static str,
    },
}

/// Result type alias for driver operations
pub type MctResult<T> = Result<T, MctError>;

impl fmt::Display for MctError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockUnavailable { clock } => {
                write!(f, "Unable to determine rate of clock '{}'", clock)
            }
            Self::ClockEnableFailed { clock } => write!(f, "Unable to enable clock '{}'", clock),
            Self::UnmappedRegisters => write!(f, "MCT register block is not mapped"),
            Self::AckTimeout {
                offset,
                value,
                waited_ns,
            } => {
                write!(
                    f,
                    "MCT hangs after writing {} (offset:0x{:x}), waited {} ns",
                    value, offset, waited_ns
                )
            }
            Self::IrqRequestFailed { irq } => write!(f, "Cannot request IRQ {}", irq),
            Self::IrqMissing { index } => {
                write!(f, "No interrupt number provided for MCT line {}", index)
            }
            Self::AffinityFailed { irq, cpu } => {
                write!(f, "Cannot force IRQ {} onto cpu{}", irq, cpu)
            }
            Self::InvalidCpu { cpu } => write!(f, "cpu{} has no MCT local timer", cpu),
            Self::WrongCpu { expected, actual } => {
                write!(
                    f,
                    "Local timer of cpu{} accessed from cpu{}",
                    expected, actual
                )
            }
            Self::RegistrationFailed { device } => write!(f, "Can't register {}", device),
            Self::NotifierFailed => write!(f, "Can't register CPU hotplug notifier"),
            Self::InvalidArgument { name, value } => {
                write!(f, "Invalid argument '{}': {}", name, value)
            }
        }
    }
}
