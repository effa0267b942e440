// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! Hardware capabilities used by the programming logic.
//!
//! Programming only needs to write whole words to the control register and
//! sample the INIT and DONE inputs. Keeping that behind [`ProgrammingPort`]
//! lets the same sequencing run on the memory-mapped port or on
//! [`SimBoard`](crate::sim::SimBoard).

use std::time::{Duration, Instant};

use crate::regs::Status;

/// Write side of the programming register plus the status inputs.
pub trait ProgrammingPort {
    /// Write a full 16-bit word to the write-only programming register.
    fn write_control(&mut self, word: u16);

    /// Sample the INIT and DONE inputs.
    fn status(&mut self) -> Status;
}

/// Registers exposed by the design loaded into the FPGA.
///
/// Indices passed to these methods are already checked against
/// [`register_count`](RegisterBank::register_count).
pub trait RegisterBank {
    fn register_count(&self) -> usize;
    fn write_register(&mut self, index: usize, value: u16);
    fn read_register(&mut self, index: usize) -> u16;
}

/// Monotonic time source and delay provider.
pub trait Clock {
    /// Time since an arbitrary fixed point.
    fn elapsed(&self) -> Duration;

    /// Wait for at least `duration`.
    fn delay(&mut self, duration: Duration);
}

/// Delays below this are spun rather than slept.
const SPIN_THRESHOLD: Duration = Duration::from_millis(1);

/// [`Clock`] backed by [`Instant`].
#[derive(Copy, Clone, Debug)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        StdClock { epoch: Instant::now() }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn delay(&mut self, duration: Duration) {
        if duration >= SPIN_THRESHOLD {
            std::thread::sleep(duration);
        } else {
            let t0 = Instant::now();
            while t0.elapsed() < duration {
                std::hint::spin_loop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_clock_delay() {
        let mut clock = StdClock::new();
        let t0 = clock.elapsed();
        clock.delay(Duration::from_micros(50));
        assert!(clock.elapsed() - t0 >= Duration::from_micros(50));
        clock.delay(Duration::from_millis(2));
        assert!(clock.elapsed() - t0 >= Duration::from_millis(2));
    }
}
