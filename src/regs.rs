// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! Register layouts for the programming port.
//!
//! ```text
//!  Bit:       15         14      13    12      9   8   7   0
//!        ____________________________________________________
//!       | fpga_write | program | cclk | reserved | cs | data |
//!       |____________|_________|______|__________|____|______|
//! ```

bitflags::bitflags! {
    /// Control bits of the write-only programming register.
    ///
    /// The low byte of the register carries data and is not part of these
    /// flags, see [`Control::word`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Control: u16 {
        /// Chip select. Active low: set means the FPGA is *not* selected.
        const CS = 1 << 8;
        /// Configuration clock, data is latched on the rising edge.
        const CCLK = 1 << 13;
        const PROGRAM = 1 << 14;
        const WRITE = 1 << 15;
    }
}

impl Control {
    /// Bits held on the port while configuration bytes are clocked in.
    pub const STREAMING: Control = Control::PROGRAM.union(Control::WRITE);

    /// Full register word with `data` on the low byte.
    pub fn word(self, data: u8) -> u16 {
        self.bits() | data as u16
    }

    /// Split a register word into its control bits and data byte.
    pub fn split(word: u16) -> (Control, u8) {
        (Control::from_bits_truncate(word), (word & 0xFF) as u8)
    }

    /// Whether chip select is driven low, selecting the FPGA.
    pub fn selected(self) -> bool {
        !self.contains(Control::CS)
    }
}

bitflags::bitflags! {
    /// Status signals read back from the FPGA.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Status: u8 {
        /// The FPGA has cleared its configuration memory and is ready for data.
        const INIT = 1 << 0;
        /// Configuration has completed and the FPGA has started up.
        const DONE = 1 << 1;
    }
}
