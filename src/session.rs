// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! Programming sessions.
//!
//! A [`Device`] owns the hardware and hands out at most one [`Session`] at a
//! time. Bytes written to a session are scanned for the sync word and then
//! clocked into the FPGA; closing the session finishes configuration and
//! reports whether the FPGA came up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::hw::{Clock, ProgrammingPort, RegisterBank};
use crate::program::{self, Completion, Timing};
use crate::regs::Status;
use crate::sync::{SCAN_LIMIT, SYNC_BYTE, Scan, ScanState, SyncScanner};
use crate::{Error, Result};

struct Board<H, C> {
    hw: H,
    clock: C,
}

/// An FPGA attached through a programming port.
pub struct Device<H, C> {
    board: Mutex<Board<H, C>>,
    timing: Timing,
    open_count: AtomicUsize,
}

impl<H, C> Device<H, C> {
    pub fn new(hw: H, clock: C, timing: Timing) -> Self {
        Device {
            board: Mutex::new(Board { hw, clock }),
            timing,
            open_count: AtomicUsize::new(0),
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Whether a session is currently open.
    pub fn is_busy(&self) -> bool {
        self.open_count.load(Ordering::Acquire) != 0
    }

    /// Give back the hardware and clock.
    pub fn into_parts(self) -> (H, C) {
        let board = self.board.into_inner().unwrap_or_else(PoisonError::into_inner);
        (board.hw, board.clock)
    }

    fn lock(&self) -> MutexGuard<'_, Board<H, C>> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H: ProgrammingPort, C: Clock> Device<H, C> {
    /// Open a programming session.
    ///
    /// Fails immediately with [`Error::Busy`] if a session is already open.
    pub fn open(&self) -> Result<Session<'_, H, C>> {
        if self
            .open_count
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("FPGA device busy, aborting");
            return Err(Error::Busy);
        }
        log::debug!("Programming session opened");
        Ok(Session {
            device: self,
            scanner: SyncScanner::new(),
            started: false,
            bytes: 0,
            closed: false,
        })
    }

    /// Sample INIT and DONE.
    pub fn status(&self) -> Status {
        self.lock().hw.status()
    }
}

impl<H: RegisterBank, C> Device<H, C> {
    pub fn register_count(&self) -> usize {
        self.lock().hw.register_count()
    }

    /// Write `value` to design register `index`.
    pub fn write_register(&self, index: usize, value: u16) -> Result<()> {
        let mut board = self.lock();
        check_index(&board.hw, index)?;
        log::debug!("virtex wr 0x{index:x} = 0x{value:x}");
        board.hw.write_register(index, value);
        Ok(())
    }

    /// Read design register `index`.
    pub fn read_register(&self, index: usize) -> Result<u16> {
        let mut board = self.lock();
        check_index(&board.hw, index)?;
        let value = board.hw.read_register(index);
        log::debug!("virtex rd 0x{index:x} = 0x{value:x}");
        Ok(value)
    }
}

fn check_index<H: RegisterBank>(hw: &H, index: usize) -> Result<()> {
    let count = hw.register_count();
    if index >= count {
        Err(Error::RegisterIndex { index, count })
    } else {
        Ok(())
    }
}

/// Exclusive programming session on a [`Device`].
///
/// Dropping a session without calling [`close`](Session::close) finishes it
/// the same way, logging the outcome.
pub struct Session<'a, H: ProgrammingPort, C: Clock> {
    device: &'a Device<H, C>,
    scanner: SyncScanner,
    started: bool,
    bytes: u64,
    closed: bool,
}

impl<H: ProgrammingPort, C: Clock> Session<'_, H, C> {
    /// Feed bitstream bytes to the device.
    ///
    /// Bytes before the sync word are discarded. Always returns `buf.len()`;
    /// if the sync word is not found within the scan budget nothing is sent
    /// and the session reports [`ScanState::Exhausted`].
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        log::trace!("Write FPGA count {}", buf.len());
        let exhausted = self.scanner.state() == ScanState::Exhausted;

        // Scan on a copy: the scanner only moves to Synced once the device
        // has been started, so a failed start leaves the marker to be found
        // again by the next write.
        let mut scanner = self.scanner.clone();
        let (carried, payload) = match scanner.scan(buf) {
            Scan::Pending => {
                self.scanner = scanner;
                return Ok(buf.len());
            }
            Scan::Aborted => {
                self.scanner = scanner;
                if exhausted {
                    log::debug!("Sync not found, write ignored");
                } else {
                    log::warn!("Sync not found within {SCAN_LIMIT} bytes, aborting");
                }
                return Ok(buf.len());
            }
            Scan::Found { carried, start } => (carried, &buf[start..]),
        };

        let mut board = self.device.lock();
        let Board { hw, clock } = &mut *board;
        if !self.started {
            program::start(hw, clock, &self.device.timing)?;
            self.started = true;
        }
        self.scanner = scanner;

        let marker = std::iter::repeat_n(SYNC_BYTE, carried);
        self.bytes += program::stream(hw, marker.chain(payload.iter().copied()));
        Ok(buf.len())
    }

    pub fn scan_state(&self) -> ScanState {
        self.scanner.state()
    }

    /// Bytes examined while looking for the sync word.
    pub fn scanned(&self) -> u32 {
        self.scanner.scanned()
    }

    /// Whether the start sequence has run in this session.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Bytes clocked into the device so far, sync word included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Finish the session.
    ///
    /// If any configuration data was sent the device is released and DONE
    /// is checked, returning [`Error::ConfigurationFailed`] if it is not set.
    pub fn close(mut self) -> Result<Completion> {
        self.finish()
    }

    fn finish(&mut self) -> Result<Completion> {
        if self.closed {
            return Ok(Completion::Idle);
        }
        self.closed = true;
        if !self.started {
            log::debug!("Programming session closed without writing");
            return Ok(Completion::Idle);
        }
        let mut board = self.device.lock();
        program::stop(&mut board.hw, self.bytes)
    }
}

impl<H: ProgrammingPort, C: Clock> Drop for Session<'_, H, C> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("Error closing programming session: {e}");
        }
        self.device.open_count.fetch_sub(1, Ordering::AcqRel);
    }
}
