// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

//! Search for the sync word at the start of a bitstream.
//!
//! A `.bit` file starts with a header (design name, part, date) that must
//! not reach the FPGA. The configuration data proper begins with the
//! sync word `FF FF FF FF`, and everything from there on, the sync word
//! included, is sent to the device.

/// Byte making up the sync word.
pub const SYNC_BYTE: u8 = 0xFF;

/// Length of the sync word in bytes.
pub const SYNC_LEN: usize = 4;

/// Number of bytes scanned before giving up on finding the sync word.
///
/// The count is kept across writes for the whole session, so once it is
/// spent every later write is rejected as well.
pub const SCAN_LIMIT: u32 = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanState {
    Scanning,
    Synced,
    /// [`SCAN_LIMIT`] bytes were scanned without finding the sync word.
    Exhausted,
}

/// Result of scanning one chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scan {
    /// The whole chunk was consumed without finding the sync word.
    Pending,
    /// Sync word found. Payload starts at `start` in this chunk, preceded by
    /// `carried` sync bytes that arrived in earlier chunks.
    Found { carried: usize, start: usize },
    /// The scan budget ran out in this chunk.
    Aborted,
}

#[derive(Clone, Debug, Default)]
pub struct SyncScanner {
    scanned: u32,
    run: u8,
    synced: bool,
}

impl SyncScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        if self.synced {
            ScanState::Synced
        } else if self.scanned >= SCAN_LIMIT {
            ScanState::Exhausted
        } else {
            ScanState::Scanning
        }
    }

    /// Total bytes examined so far.
    pub fn scanned(&self) -> u32 {
        self.scanned
    }

    /// Length of the current run of sync bytes.
    pub fn run(&self) -> u8 {
        self.run
    }

    /// Scan `chunk` for the sync word.
    ///
    /// Once synced every chunk is payload from its first byte.
    pub fn scan(&mut self, chunk: &[u8]) -> Scan {
        if self.synced {
            return Scan::Found { carried: 0, start: 0 };
        }

        for (idx, &byte) in chunk.iter().enumerate() {
            self.scanned = self.scanned.saturating_add(1);
            if self.scanned >= SCAN_LIMIT {
                return Scan::Aborted;
            }

            if byte == SYNC_BYTE {
                self.run += 1;
            } else {
                self.run = 0;
            }

            if self.run as usize == SYNC_LEN {
                self.synced = true;
                let in_chunk = (idx + 1).min(SYNC_LEN);
                log::debug!("Sync found at offset {}", self.scanned as usize - SYNC_LEN);
                return Scan::Found {
                    carried: SYNC_LEN - in_chunk,
                    start: idx + 1 - in_chunk,
                };
            }
        }

        Scan::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_after_header() {
        let mut scanner = SyncScanner::new();
        let data = [0x00, 0xAB, 0xFF, 0xFF, 0xFF, 0xFF, 0x42];
        assert_eq!(scanner.scan(&data), Scan::Found { carried: 0, start: 2 });
        assert_eq!(&data[2..], &[0xFF, 0xFF, 0xFF, 0xFF, 0x42]);
        assert_eq!(scanner.state(), ScanState::Synced);
        assert_eq!(scanner.scanned(), 6);
    }

    #[test]
    fn test_synced_passes_everything() {
        let mut scanner = SyncScanner::new();
        scanner.scan(&[0xFF; 4]);
        assert_eq!(scanner.scan(&[0x00, 0x01]), Scan::Found { carried: 0, start: 0 });
        assert_eq!(scanner.scanned(), 4);
    }

    #[test]
    fn test_run_reset_by_other_byte() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0xFF, 0xFF, 0xFF, 0xFE, 0xFF]), Scan::Pending);
        assert_eq!(scanner.run(), 1);
        assert_eq!(scanner.state(), ScanState::Scanning);
    }

    #[test]
    fn test_sync_split_across_chunks() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0x12, 0xFF, 0xFF, 0xFF]), Scan::Pending);
        assert_eq!(scanner.scan(&[0xFF, 0x34]), Scan::Found { carried: 3, start: 0 });
    }

    #[test]
    fn test_abort_after_limit() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0x00; 255]), Scan::Pending);
        assert_eq!(scanner.state(), ScanState::Scanning);
        assert_eq!(scanner.scan(&[0x00]), Scan::Aborted);
        assert_eq!(scanner.state(), ScanState::Exhausted);
    }

    #[test]
    fn test_abort_in_single_chunk() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0xA5; 256]), Scan::Aborted);
        assert_eq!(scanner.state(), ScanState::Exhausted);
    }

    #[test]
    fn test_budget_is_cumulative() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0x00; 300]), Scan::Aborted);
        // A later chunk holding a sync word is still rejected.
        assert_eq!(scanner.scan(&[0xFF; 8]), Scan::Aborted);
        assert_eq!(scanner.state(), ScanState::Exhausted);
    }

    #[test]
    fn test_sync_just_inside_limit() {
        let mut scanner = SyncScanner::new();
        let mut data = vec![0x00; 251];
        data.extend_from_slice(&[0xFF; 4]);
        assert_eq!(scanner.scan(&data), Scan::Found { carried: 0, start: 251 });
    }
}
