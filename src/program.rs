// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! Slave parallel programming sequence.
//!
//! Configuration is framed by [`start`], which pulses PROGRAM, waits for
//! INIT and selects the device, and [`stop`], which deselects it and checks
//! DONE. In between each byte is clocked in by [`clock_byte`].

use std::fmt;
use std::time::Duration;

use crate::hw::{Clock, ProgrammingPort};
use crate::regs::{Control, Status};
use crate::{Error, Result, reverse_bits};

/// Timing parameters for the programming sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Minimum time between changes of CS and PROGRAM during start-up.
    pub settle: Duration,
    /// How long to wait for INIT after PROGRAM is asserted.
    pub init_timeout: Duration,
    /// Interval between INIT samples.
    pub init_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            settle: Duration::from_nanos(300),
            init_timeout: Duration::from_millis(500),
            init_poll: Duration::from_micros(10),
        }
    }
}

impl Timing {
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn with_init_poll(mut self, poll: Duration) -> Self {
        self.init_poll = poll;
        self
    }
}

/// Outcome of closing a programming session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// No configuration data reached the device, so it was left alone.
    Idle,
    /// The device reported DONE after `bytes` were written.
    Configured { bytes: u64 },
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Completion::Idle => write!(f, "No configuration data written"),
            Completion::Configured { bytes } => {
                write!(f, "FPGA configuration completed, {bytes} bytes written")
            }
        }
    }
}

/// Reset the FPGA and prepare it to receive configuration data.
pub fn start<P, C>(port: &mut P, clock: &mut C, timing: &Timing) -> Result<()>
where
    P: ProgrammingPort + ?Sized,
    C: Clock + ?Sized,
{
    log::info!("Start writing to FPGA");

    // Deselected with PROGRAM low.
    let mut ctrl = Control::CS;
    port.write_control(ctrl.word(0));
    clock.delay(timing.settle);

    ctrl |= Control::PROGRAM;
    port.write_control(ctrl.word(0));
    clock.delay(timing.settle);

    wait_for_init(port, clock, timing)?;

    ctrl |= Control::WRITE;
    port.write_control(ctrl.word(0));

    ctrl.remove(Control::CS);
    port.write_control(ctrl.word(0));
    log::debug!("FPGA selected, ready for configuration data");
    Ok(())
}

/// Poll INIT until it is set or `timing.init_timeout` has elapsed.
pub fn wait_for_init<P, C>(port: &mut P, clock: &mut C, timing: &Timing) -> Result<()>
where
    P: ProgrammingPort + ?Sized,
    C: Clock + ?Sized,
{
    let t0 = clock.elapsed();
    loop {
        if port.status().contains(Status::INIT) {
            log::trace!("INIT set after {:?}", clock.elapsed().saturating_sub(t0));
            return Ok(());
        }
        let waited = clock.elapsed().saturating_sub(t0);
        if waited >= timing.init_timeout {
            log::error!("FPGA did not assert INIT within {:?}", timing.init_timeout);
            return Err(Error::InitTimeout { waited });
        }
        clock.delay(timing.init_poll);
    }
}

/// Bit-reverse `byte` and clock it into the device with one CCLK pulse.
pub fn clock_byte<P: ProgrammingPort + ?Sized>(port: &mut P, byte: u8) {
    let data = reverse_bits(byte);
    let ctrl = Control::STREAMING;
    port.write_control(ctrl.word(data));
    port.write_control((ctrl | Control::CCLK).word(data));
    port.write_control(ctrl.word(data));
}

/// Clock every byte of `bytes` into the device, returning how many were sent.
pub fn stream<P, I>(port: &mut P, bytes: I) -> u64
where
    P: ProgrammingPort + ?Sized,
    I: IntoIterator<Item = u8>,
{
    let mut count = 0;
    for byte in bytes {
        clock_byte(port, byte);
        count += 1;
    }
    log::trace!("Streamed {count} bytes");
    count
}

/// Release the device after `bytes` have been written and check DONE.
pub fn stop<P: ProgrammingPort + ?Sized>(port: &mut P, bytes: u64) -> Result<Completion> {
    let mut ctrl = (Control::STREAMING | Control::CS) - Control::CCLK;
    port.write_control(ctrl.word(0));

    // WRITE has to be released as well or the port is left in an invalid state.
    ctrl.remove(Control::WRITE);
    port.write_control(ctrl.word(0));

    log::info!("{bytes} bytes written");
    if port.status().contains(Status::DONE) {
        log::info!("FPGA configuration completed, no errors");
        Ok(Completion::Configured { bytes })
    } else {
        log::error!("FPGA configuration failed, DONE not set");
        Err(Error::ConfigurationFailed { bytes })
    }
}
