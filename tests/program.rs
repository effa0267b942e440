// Copyright 2025 Adam Greig
// Licensed under the Apache-2.0 and MIT licenses.

use std::time::Duration;

use virtexload::sim::{SimBoard, SimClock};
use virtexload::{Clock, Completion, Control, Device, Error, ScanState, Timing, reverse_bits};

/// A small bitstream with a `.bit` style header in front of the sync word.
fn bitstream() -> Vec<u8> {
    let mut data = vec![0x00, 0x09, 0x0F, 0xF0, 0x0F, 0xF0, 0x0F, 0xF0, 0x0F, 0xF0, 0x00, 0x00, 0x01];
    data.extend_from_slice(b"a\x00\x0cdesign.ncd\x00b\x00\x0bv50bg256\x00");
    data.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
    data.extend_from_slice(&[0xAA, 0x99, 0x55, 0x66, 0x30, 0x00, 0x80, 0x01, 0x00, 0x00, 0x00, 0x07]);
    data
}

fn payload() -> Vec<u8> {
    let data = bitstream();
    let start = data.windows(4).position(|w| w == [0xFF; 4]).unwrap();
    data[start..].to_vec()
}

#[test]
fn program_in_one_write() {
    let device = Device::new(SimBoard::new(8), SimClock::new(), Timing::default());
    let data = bitstream();

    let mut session = device.open().unwrap();
    assert_eq!(session.write(&data).unwrap(), data.len());
    let expected = payload();
    assert_eq!(
        session.close().unwrap(),
        Completion::Configured { bytes: expected.len() as u64 }
    );

    let (board, _) = device.into_parts();
    let reversed: Vec<u8> = expected.iter().map(|&b| reverse_bits(b)).collect();
    assert_eq!(board.latched(), reversed.as_slice());
    assert_eq!(board.program_pulses(), 1);
    // Device deselected and WRITE released at the end.
    assert_eq!(board.control(), Control::PROGRAM | Control::CS);
}

#[test]
fn chunking_does_not_change_output() {
    let data = bitstream();
    let mut reference = None;

    for chunk_size in [1, 2, 3, 5, 7, 64] {
        let device = Device::new(SimBoard::new(0), SimClock::new(), Timing::default());
        let mut session = device.open().unwrap();
        for chunk in data.chunks(chunk_size) {
            session.write(chunk).unwrap();
        }
        assert_eq!(session.scan_state(), ScanState::Synced);
        session.close().unwrap();

        let (board, _) = device.into_parts();
        match &reference {
            None => reference = Some(board.writes().to_vec()),
            Some(writes) => assert_eq!(board.writes(), writes.as_slice(), "chunk size {chunk_size}"),
        }
    }
}

#[test]
fn slow_init_within_timeout() {
    let board = SimBoard::new(0).with_init_delay(40);
    let timing = Timing::default()
        .with_init_poll(Duration::from_micros(100))
        .with_init_timeout(Duration::from_millis(5));
    let device = Device::new(board, SimClock::new(), timing);

    let mut session = device.open().unwrap();
    session.write(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]).unwrap();
    assert!(session.has_started());
    session.close().unwrap();

    let (_, clock) = device.into_parts();
    assert!(clock.elapsed() >= Duration::from_millis(4));
}

#[test]
fn slow_init_past_timeout() {
    let board = SimBoard::new(0).with_init_delay(100);
    let timing = Timing::default()
        .with_init_poll(Duration::from_micros(100))
        .with_init_timeout(Duration::from_millis(5));
    let device = Device::new(board, SimClock::new(), timing);

    let mut session = device.open().unwrap();
    match session.write(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]) {
        Err(Error::InitTimeout { waited }) => assert!(waited >= Duration::from_millis(5)),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn header_without_sync() {
    let device = Device::new(SimBoard::new(0), SimClock::new(), Timing::default());
    let mut session = device.open().unwrap();
    let mut data = vec![0x00; 300];
    data[280..284].copy_from_slice(&[0xFF; 4]);
    session.write(&data).unwrap();
    assert_eq!(session.scan_state(), ScanState::Exhausted);
    assert_eq!(session.bytes_written(), 0);
    assert_eq!(session.close().unwrap(), Completion::Idle);
}

#[test]
fn sessions_are_exclusive() {
    let device = Device::new(SimBoard::new(0), SimClock::new(), Timing::default());
    let session = device.open().unwrap();
    assert!(matches!(device.open(), Err(Error::Busy)));
    drop(session);
    assert!(device.open().is_ok());
}

#[test]
fn resend_after_init_timeout_skips_header() {
    let board = SimBoard::new(0).with_init_delay(60).keep_init_polls();
    let timing = Timing::default()
        .with_init_poll(Duration::from_micros(100))
        .with_init_timeout(Duration::from_millis(5));
    let device = Device::new(board, SimClock::new(), timing);
    let data = bitstream();

    let mut session = device.open().unwrap();
    assert!(matches!(session.write(&data), Err(Error::InitTimeout { .. })));
    assert_eq!(session.write(&data).unwrap(), data.len());
    let expected = payload();
    assert_eq!(
        session.close().unwrap(),
        Completion::Configured { bytes: expected.len() as u64 }
    );

    let (board, _) = device.into_parts();
    let reversed: Vec<u8> = expected.iter().map(|&b| reverse_bits(b)).collect();
    assert_eq!(board.latched(), reversed.as_slice());
}
