// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! In-memory stand-in for the programming hardware.
//!
//! [`SimBoard`] records every word written to the programming register and
//! models just enough of the FPGA to drive INIT and DONE: INIT follows
//! PROGRAM after a configurable number of polls, and DONE is raised once a
//! configurable number of bytes has been latched. [`SimClock`] is a virtual
//! clock that only advances when asked to delay.

use std::time::Duration;

use crate::hw::{Clock, ProgrammingPort, RegisterBank};
use crate::regs::{Control, Status};

#[derive(Clone, Debug)]
pub struct SimBoard {
    writes: Vec<u16>,
    control: Control,
    latched: Vec<u8>,
    program_pulses: u32,
    init_delay: Option<u32>,
    init_polls: u32,
    keep_init_polls: bool,
    done_after: Option<u64>,
    registers: Vec<u16>,
}

impl SimBoard {
    /// New board with `register_count` design registers.
    ///
    /// INIT is set as soon as PROGRAM is asserted and DONE once a byte has
    /// been latched.
    pub fn new(register_count: usize) -> Self {
        SimBoard {
            writes: Vec::new(),
            control: Control::empty(),
            latched: Vec::new(),
            program_pulses: 0,
            init_delay: Some(0),
            init_polls: 0,
            keep_init_polls: false,
            done_after: Some(1),
            registers: vec![0; register_count],
        }
    }

    /// Hold INIT low for `polls` status reads after PROGRAM is asserted.
    pub fn with_init_delay(mut self, polls: u32) -> Self {
        self.init_delay = Some(polls);
        self
    }

    /// Count INIT polls from power-up rather than from the last PROGRAM
    /// pulse, so a restarted sequence sees INIT sooner.
    pub fn keep_init_polls(mut self) -> Self {
        self.keep_init_polls = true;
        self
    }

    /// Never assert INIT.
    pub fn with_init_stuck(mut self) -> Self {
        self.init_delay = None;
        self
    }

    /// Assert DONE once `bytes` bytes have been latched.
    pub fn with_done_after(mut self, bytes: u64) -> Self {
        self.done_after = Some(bytes);
        self
    }

    /// Never assert DONE.
    pub fn without_done(mut self) -> Self {
        self.done_after = None;
        self
    }

    /// Every word written to the programming register, oldest first.
    pub fn writes(&self) -> &[u16] {
        &self.writes
    }

    /// Control bits of the last word written.
    pub fn control(&self) -> Control {
        self.control
    }

    /// Data bytes latched on CCLK rising edges since PROGRAM was last asserted.
    pub fn latched(&self) -> &[u8] {
        &self.latched
    }

    /// Number of times PROGRAM has gone from clear to set.
    pub fn program_pulses(&self) -> u32 {
        self.program_pulses
    }

    pub fn registers(&self) -> &[u16] {
        &self.registers
    }
}

impl ProgrammingPort for SimBoard {
    fn write_control(&mut self, word: u16) {
        log::trace!("sim: control 0x{word:04X}");
        let (ctrl, data) = Control::split(word);
        let prev = self.control;

        if ctrl.contains(Control::PROGRAM) && !prev.contains(Control::PROGRAM) {
            self.program_pulses += 1;
            if !self.keep_init_polls {
                self.init_polls = 0;
            }
            self.latched.clear();
        }

        let rising = ctrl.contains(Control::CCLK) && !prev.contains(Control::CCLK);
        if rising && ctrl.contains(Control::STREAMING) && ctrl.selected() {
            self.latched.push(data);
        }

        self.control = ctrl;
        self.writes.push(word);
    }

    fn status(&mut self) -> Status {
        let mut status = Status::empty();
        if self.control.contains(Control::PROGRAM) {
            match self.init_delay {
                Some(delay) if self.init_polls >= delay => status |= Status::INIT,
                Some(_) => self.init_polls += 1,
                None => (),
            }
        }
        if self.done_after.is_some_and(|n| self.latched.len() as u64 >= n) {
            status |= Status::DONE;
        }
        status
    }
}

impl RegisterBank for SimBoard {
    fn register_count(&self) -> usize {
        self.registers.len()
    }

    fn write_register(&mut self, index: usize, value: u16) {
        self.registers[index] = value;
    }

    fn read_register(&mut self, index: usize) -> u16 {
        self.registers[index]
    }
}

/// Virtual clock advanced only by [`Clock::delay`].
#[derive(Copy, Clone, Debug, Default)]
pub struct SimClock {
    now: Duration,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SimClock {
    fn elapsed(&self) -> Duration {
        self.now
    }

    fn delay(&mut self, duration: Duration) {
        self.now += duration;
    }
}
