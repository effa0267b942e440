// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.
#![doc = include_str!("../README.md")]

use std::time::Duration;

pub mod hw;
#[cfg(target_os = "linux")]
pub mod mmio;
pub mod program;
pub mod regs;
pub mod session;
pub mod sim;
pub mod sync;
pub mod wan;

pub use hw::{Clock, ProgrammingPort, RegisterBank, StdClock};
pub use program::{Completion, Timing};
pub use regs::{Control, Status};
pub use session::{Device, Session};
pub use sync::ScanState;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("FPGA device busy, a programming session is already open.")]
    Busy,
    #[error("Sync word not found in the first {scanned} bytes of the bitstream.")]
    SyncNotFound { scanned: u32 },
    #[error("Timed out after {waited:?} waiting for the FPGA to assert INIT.")]
    InitTimeout { waited: Duration },
    #[error("FPGA configuration failed after {bytes} bytes written, DONE not set.")]
    ConfigurationFailed { bytes: u64 },
    #[error("Register index {index} out of range, device has {count} registers.")]
    RegisterIndex { index: usize, count: usize },
    #[error("Could not map {size} bytes of physical memory at 0x{address:08X}")]
    MemoryMap {
        address: u64,
        size: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reverse the bit order of a bitstream byte.
///
/// The slave parallel port latches D0 as the most significant bit of each
/// configuration byte, so bytes taken from a `.bit` file have to be mirrored
/// before they are put on the data lines.
pub fn reverse_bits(byte: u8) -> u8 {
    byte.reverse_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_bits_values() {
        assert_eq!(reverse_bits(0x01), 0x80);
        assert_eq!(reverse_bits(0xF0), 0x0F);
        assert_eq!(reverse_bits(0x00), 0x00);
        assert_eq!(reverse_bits(0xFF), 0xFF);
        assert_eq!(reverse_bits(0xA5), 0xA5);
        assert_eq!(reverse_bits(0x12), 0x48);
    }

    #[test]
    fn test_reverse_bits_involution() {
        for b in 0..=255u8 {
            assert_eq!(reverse_bits(reverse_bits(b)), b);
        }
    }
}
