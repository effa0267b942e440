// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! Memory-mapped programming port on Linux.
//!
//! The board exposes three windows in physical memory:
//!
//! * the write-only programming register (one 16-bit word),
//! * the design register bank (16-bit words, one per register index),
//! * a 32-bit input port carrying the INIT and DONE signals.
//!
//! All three are mapped through `/dev/mem`, which requires root.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use crate::hw::{ProgrammingPort, RegisterBank};
use crate::regs::Status;
use crate::{Error, Result};

/// Physical addresses and bit positions of the programming hardware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MmioConfig {
    /// Address of the programming register.
    pub prog_addr: u64,
    /// Base address of the design register bank.
    pub reg_addr: u64,
    /// Address of the input port holding INIT and DONE.
    pub status_addr: u64,
    /// Bit of the input port connected to INIT.
    pub init_bit: u8,
    /// Bit of the input port connected to DONE.
    pub done_bit: u8,
    /// Number of 16-bit registers in the design register bank.
    pub register_count: usize,
}

impl Default for MmioConfig {
    fn default() -> Self {
        MmioConfig {
            prog_addr: 0,
            reg_addr: 0,
            status_addr: 0,
            init_bit: 27,
            done_bit: 28,
            register_count: 8,
        }
    }
}

impl MmioConfig {
    pub fn new(prog_addr: u64, reg_addr: u64, status_addr: u64) -> Self {
        MmioConfig {
            prog_addr,
            reg_addr,
            status_addr,
            ..Default::default()
        }
    }

    pub fn with_status_bits(mut self, init_bit: u8, done_bit: u8) -> Self {
        self.init_bit = init_bit;
        self.done_bit = done_bit;
        self
    }

    pub fn with_register_count(mut self, count: usize) -> Self {
        self.register_count = count;
        self
    }

    /// Translate a raw input port value into [`Status`].
    ///
    /// Bit positions past the width of the port read as clear.
    pub fn decode_status(&self, port: u32) -> Status {
        let bit_set = |bit: u8| 1u32.checked_shl(bit as u32).is_some_and(|mask| port & mask != 0);
        let mut status = Status::empty();
        if bit_set(self.init_bit) {
            status |= Status::INIT;
        }
        if bit_set(self.done_bit) {
            status |= Status::DONE;
        }
        status
    }
}

/// A mapped region of physical memory.
pub struct PhysMap {
    /// Pointer to `phys_addr` inside the mapping.
    ptr: *mut u8,
    /// Length of the page-aligned mapping.
    map_size: usize,
    /// Offset of `phys_addr` from the start of the mapping.
    offset: usize,
    /// Bytes requested, starting at `phys_addr`.
    size: usize,
    phys_addr: u64,
}

impl PhysMap {
    /// Map `size` bytes of physical memory at `phys_addr`, uncached.
    pub fn new(phys_addr: u64, size: usize) -> Result<Self> {
        let map_err = |source| Error::MemoryMap { address: phys_addr, size, source };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(map_err)?;

        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        let page_mask = page_size - 1;
        let offset = (phys_addr as usize) & page_mask;
        let aligned_addr = phys_addr & !(page_mask as u64);
        let map_size = (size + offset + page_mask) & !page_mask;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                aligned_addr as libc::off_t,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(map_err(std::io::Error::last_os_error()));
        }
        log::debug!("Mapped {size} bytes at 0x{phys_addr:08X}");

        Ok(PhysMap {
            ptr: unsafe { (ptr as *mut u8).add(offset) },
            map_size,
            offset,
            size,
            phys_addr,
        })
    }

    #[inline]
    pub fn read16(&self, offset: usize) -> u16 {
        assert!(offset + 2 <= self.size && offset & 1 == 0);
        unsafe { core::ptr::read_volatile(self.ptr.add(offset) as *const u16) }
    }

    #[inline]
    pub fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size && offset & 3 == 0);
        unsafe { core::ptr::read_volatile(self.ptr.add(offset) as *const u32) }
    }

    #[inline]
    pub fn write16(&self, offset: usize, value: u16) {
        assert!(offset + 2 <= self.size && offset & 1 == 0);
        unsafe { core::ptr::write_volatile(self.ptr.add(offset) as *mut u16, value) }
    }

    pub fn phys_addr(&self) -> u64 {
        self.phys_addr
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

// Accesses go straight to device registers through volatile reads and
// writes, there is no Rust-visible memory behind the pointer to alias.
unsafe impl Send for PhysMap {}
unsafe impl Sync for PhysMap {}

impl Drop for PhysMap {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.sub(self.offset) as *mut libc::c_void, self.map_size);
        }
    }
}

/// Programming port and design registers reached through `/dev/mem`.
pub struct MmioBoard {
    config: MmioConfig,
    prog: PhysMap,
    regs: PhysMap,
    status: PhysMap,
}

impl MmioBoard {
    pub fn open(config: &MmioConfig) -> Result<Self> {
        let prog = PhysMap::new(config.prog_addr, 2)?;
        let regs = PhysMap::new(config.reg_addr, config.register_count * 2)?;
        let status = PhysMap::new(config.status_addr, 4)?;
        log::info!(
            "Programming port at 0x{:08X}, {} registers at 0x{:08X}",
            prog.phys_addr(),
            config.register_count,
            regs.phys_addr(),
        );
        Ok(MmioBoard { config: config.clone(), prog, regs, status })
    }

    pub fn config(&self) -> &MmioConfig {
        &self.config
    }
}

impl ProgrammingPort for MmioBoard {
    fn write_control(&mut self, word: u16) {
        self.prog.write16(0, word);
    }

    fn status(&mut self) -> Status {
        self.config.decode_status(self.status.read32(0))
    }
}

impl RegisterBank for MmioBoard {
    fn register_count(&self) -> usize {
        self.config.register_count
    }

    fn write_register(&mut self, index: usize, value: u16) {
        self.regs.write16(index * 2, value);
    }

    fn read_register(&mut self, index: usize) -> u16 {
        self.regs.read16(index * 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_status() {
        let config = MmioConfig::default();
        assert_eq!(config.decode_status(0), Status::empty());
        assert_eq!(config.decode_status(1 << 27), Status::INIT);
        assert_eq!(config.decode_status(1 << 28), Status::DONE);
        assert_eq!(config.decode_status(0xFFFF_FFFF), Status::INIT | Status::DONE);

        let config = config.with_status_bits(0, 1);
        assert_eq!(config.decode_status(0b11), Status::INIT | Status::DONE);
        assert_eq!(config.decode_status(1 << 27), Status::empty());
    }

    #[test]
    fn test_decode_status_bit_out_of_range() {
        let config = MmioConfig::default().with_status_bits(32, 200);
        assert_eq!(config.decode_status(0xFFFF_FFFF), Status::empty());
    }

    #[test]
    fn test_device_is_sync() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<crate::Device<MmioBoard, crate::StdClock>>();
    }

    #[test]
    fn test_config_builder() {
        let config = MmioConfig::new(0x4000_0000, 0x5000_0000, 0xB000_0020).with_register_count(16);
        assert_eq!(config.prog_addr, 0x4000_0000);
        assert_eq!(config.register_count, 16);
        assert_eq!(config.init_bit, 27);
    }
}
