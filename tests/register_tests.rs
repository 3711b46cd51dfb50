//! Register list and transmitter tests through the public API

use rs_dcc_station::hal::MockSignal;
use rs_dcc_station::{
    Direction, Frame, MainRegisters, Packet, PacketError, ProgRegisters, StationConfig,
    Transmitter,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

fn data(packet: &Packet) -> Vec<u8> {
    packet.decode().unwrap().data().to_vec()
}

/// Runs the transmitter until every queued update has been taken.
fn flush<const N: usize>(tx: &mut Transmitter<'_, N>) {
    while !tx.registers().is_idle() {
        tx.next_bit();
    }
}

// ============================================================================
// Packet Encoding
// ============================================================================

/// Finishes the copy in progress, then captures `n_bits` more bits.
fn capture<const N: usize>(tx: &mut Transmitter<'_, N>, n_bits: u8) -> Vec<bool> {
    while tx.cursor().1 < n_bits {
        tx.next_bit();
    }
    let mut signal = MockSignal::new();
    for _ in 0..n_bits {
        tx.drive(&mut signal);
    }
    signal.bits
}

#[test]
fn throttle_packet_on_the_wire() {
    let regs = MainRegisters::new(&StationConfig::default());
    let mut tx = Transmitter::new(regs.consumer().unwrap());

    regs.set_throttle(5, 3, 60, Direction::Forward).unwrap();
    flush(&mut tx);
    assert_eq!(tx.cursor(), (regs.slot_of(5).unwrap(), 1));

    let expected = Packet::encode(&Frame::new(&[0x03, 0x3F, 0xBD]).unwrap()).unwrap();
    assert_eq!(expected.n_bits(), 49);
    // only one register loaded, so the same packet repeats
    let wire = capture(&mut tx, expected.n_bits());
    assert_eq!(wire, expected.bits().collect::<Vec<_>>());
}

#[test]
fn long_address_packet_on_the_wire() {
    let regs = MainRegisters::new(&StationConfig::default());
    let mut tx = Transmitter::new(regs.consumer().unwrap());

    regs.set_throttle(1, 150, 0, Direction::Reverse).unwrap();
    flush(&mut tx);

    let expected = Packet::encode(&Frame::new(&[0xC0, 0x96, 0x3F, 0x00]).unwrap()).unwrap();
    assert_eq!(expected.n_bits(), 67);
    let wire = capture(&mut tx, expected.n_bits());
    assert!(wire[..22].iter().all(|&b| b));
    assert!(!wire[22]);
    assert_eq!(wire, expected.bits().collect::<Vec<_>>());
}

#[test]
fn oversized_raw_packet_rejected() {
    let regs = MainRegisters::new(&StationConfig::default());
    assert_eq!(
        regs.load_packet(1, &[1, 2, 3, 4, 5, 6], 0, false),
        Err(PacketError::InvalidLength(6))
    );
    assert!(regs.is_idle());
    assert_eq!(regs.max_loaded(), 0);
}

// ============================================================================
// Register Allocation
// ============================================================================

#[test]
fn registers_keep_their_slot() {
    let regs = MainRegisters::new(&StationConfig::default());
    let mut tx = Transmitter::new(regs.consumer().unwrap());

    for reg in [3, 9, 3, 1, 9] {
        regs.set_throttle(reg, 3, 10, Direction::Forward).unwrap();
        flush(&mut tx);
    }

    assert_eq!(regs.slot_of(3), Some(1));
    assert_eq!(regs.slot_of(9), Some(2));
    assert_eq!(regs.slot_of(1), Some(3));
    assert_eq!(regs.slot_of(2), None);
    assert_eq!(regs.max_loaded(), 3);
}

#[test]
fn register_numbers_wrap() {
    let regs = ProgRegisters::new(&StationConfig::default());
    let mut tx = Transmitter::new(regs.consumer().unwrap());

    // 4 % 3 == 1
    regs.load_packet(4, &[0xFF, 0x00], 0, false).unwrap();
    flush(&mut tx);
    assert_eq!(regs.slot_of(1), Some(1));
}

#[test]
fn throttle_register_out_of_range() {
    let regs = MainRegisters::new(&StationConfig::default());
    assert!(regs.set_throttle(0, 3, 10, Direction::Forward).is_err());
    assert!(regs.set_throttle(13, 3, 10, Direction::Forward).is_err());
    assert!(regs.is_idle());
}

// ============================================================================
// Handoff
// ============================================================================

#[test]
fn second_load_waits_for_transmitter() {
    let regs = MainRegisters::new(&StationConfig::default());
    let mut consumer = regs.consumer().unwrap();
    let second_done = AtomicBool::new(false);

    regs.load_packet(1, &[0x03, 0x3F, 0x80], 0, false).unwrap();

    thread::scope(|s| {
        s.spawn(|| {
            regs.load_packet(2, &[0x04, 0x3F, 0x80], 0, false).unwrap();
            second_done.store(true, Ordering::Release);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!second_done.load(Ordering::Acquire));

        let first = consumer.take_update().unwrap();
        assert_eq!(data(first.packet()), vec![0x03, 0x3F, 0x80]);
        drop(first);

        // the blocked producer can now publish
        let second = loop {
            if let Some(update) = consumer.take_update() {
                break data(update.packet());
            }
            std::hint::spin_loop();
        };
        assert_eq!(second, vec![0x04, 0x3F, 0x80]);
    });

    assert!(second_done.load(Ordering::Acquire));
}

#[test]
fn same_register_reload_waits_for_transmitter() {
    let regs = MainRegisters::new(&StationConfig::default());
    let mut consumer = regs.consumer().unwrap();
    let second_done = AtomicBool::new(false);

    regs.set_throttle(1, 3, 10, Direction::Forward).unwrap();
    assert_eq!(regs.speed(1), 10);

    thread::scope(|s| {
        s.spawn(|| {
            regs.set_throttle(1, 3, 20, Direction::Forward).unwrap();
            second_done.store(true, Ordering::Release);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!second_done.load(Ordering::Acquire));

        // the pending update still carries the first speed
        let first = consumer.take_update().unwrap();
        let slot = first.slot();
        assert_eq!(data(first.packet()), vec![0x03, 0x3F, 0x80 | 11]);
        drop(first);

        let second = loop {
            if let Some(update) = consumer.take_update() {
                break (update.slot(), data(update.packet()));
            }
            std::hint::spin_loop();
        };
        assert_eq!(second, (slot, vec![0x03, 0x3F, 0x80 | 21]));
    });

    assert!(second_done.load(Ordering::Acquire));
    assert_eq!(regs.speed(1), 20);
    assert_eq!(regs.max_loaded(), 1);
}

#[test]
fn concurrent_producers_are_serialized() {
    let regs = MainRegisters::new(&StationConfig::default());
    let stop = AtomicBool::new(false);

    let sent = thread::scope(|s| {
        let tx = s.spawn(|| {
            let mut consumer = regs.consumer().unwrap();
            let mut sent = Vec::new();
            loop {
                if let Some(update) = consumer.take_update() {
                    sent.push((update.slot(), data(update.packet())));
                } else if stop.load(Ordering::Acquire) {
                    break;
                }
                std::hint::spin_loop();
            }
            sent
        });

        let producers: Vec<_> = (1..=4u8)
            .map(|cab| {
                let regs = &regs;
                s.spawn(move || {
                    for speed in 0..25 {
                        regs.set_throttle(usize::from(cab), u16::from(cab), speed, Direction::Forward)
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        while !regs.is_idle() {
            std::hint::spin_loop();
        }
        stop.store(true, Ordering::Release);
        tx.join().unwrap()
    });

    assert_eq!(sent.len(), 100);
    for (slot, bytes) in &sent {
        // every packet landed in the slot mapped to its cab's register
        assert_eq!(regs.slot_of(usize::from(bytes[0])), Some(*slot));
    }
    assert_eq!(regs.max_loaded(), 4);
    for cab in 1..=4 {
        assert_eq!(regs.speed(cab), 24);
    }
}
