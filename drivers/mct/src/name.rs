//! Fixed-size device names.
//!
//! Per-CPU device names (`mct_tick0`, `mct_tick1`, ...) are built once at
//! setup and then handed to the interrupt controller and the framework by
//! reference, so they are stored inline without heap allocation.

use core::fmt;

/// Maximum length (in bytes) of a device name.
pub const DEVICE_NAME_MAX_LEN: usize = 16;

/// Inline, length-tracked device name. Text beyond
/// [`DEVICE_NAME_MAX_LEN`] bytes is truncated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DeviceName {
    buf: [u8; DEVICE_NAME_MAX_LEN],
    len: u8,
}

impl DeviceName {
    /// An empty name.
    pub const fn empty() -> Self {
        Self {
            buf: [0u8; DEVICE_NAME_MAX_LEN],
            len: 0,
        }
    }

    /// Name of the local tick device of `cpu`.
    pub fn tick(cpu: usize) -> Self {
        let mut name = Self::empty();
        // Truncation is the only failure mode and is handled by write_str.
        let _ = fmt::write(&mut name, format_args!("mct_tick{}", cpu));
        name
    }

    pub fn as_str(&self) -> &str {
        // Only whole `&str` chunks are ever appended, cut on char boundaries.
        core::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Write for DeviceName {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = DEVICE_NAME_MAX_LEN - self.len as usize;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        let start = self.len as usize;
        self.buf[start..start + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take as u8;
        if take < s.len() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
