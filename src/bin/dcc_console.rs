//! Desktop DCC command station console.
//!
//! Runs the main and programming track transmitters on their own threads
//! and reads `<...>` commands from stdin. The programming track carries a
//! simulated decoder, so service-mode reads and writes answer the way a
//! real locomotive on the programming track would.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dcc_console
//! <1>              # power on
//! <t1 3 60 1>      # cab 3 forward at speed step 60
//! <R1 7 1>         # read CV1, answers <r7|1|1 3>
//! ```
//!
//! Set `RUST_LOG` to control logging; `RUST_LOG=dcc::packets=info` shows
//! packet traces only.

use anyhow::anyhow;
use rs_dcc_station::hal::{AckLine, MockCurrentSense, MockDecoder, MockTrackPower};
use rs_dcc_station::traits::{Clock, SignalOutput};
use rs_dcc_station::{
    CommandFramer, CommandStation, MainRegisters, PacketObserver, ProgRegisters, StationConfig,
    Transmitter,
};
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long the main loop waits for input before checking current.
const POLL_INTERVAL_MS: u64 = 10;

/// Bits sent between 1ms sleeps, roughly the real DCC bit rate.
const BITS_PER_MS: u32 = 8;

/// Quiescent current of the simulated tracks.
const IDLE_CURRENT: u16 = 8;

/// Sawtooth noise on the simulated current sense.
const CURRENT_NOISE: u16 = 3;

/// Signal output that paces the transmitter to about real time.
#[derive(Default)]
struct PacedSignal {
    bits: u32,
}

impl SignalOutput for PacedSignal {
    fn write_bit(&mut self, _bit: bool) {
        self.bits += 1;
        if self.bits >= BITS_PER_MS {
            self.bits = 0;
            thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Milliseconds since the console started.
struct InstantClock(Instant);

impl Clock for InstantClock {
    fn now_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }
}

fn run_track<const N: usize, O: PacketObserver>(mut tx: Transmitter<'_, N, O>, stop: &AtomicBool) {
    let mut signal = PacedSignal::default();
    while !stop.load(Ordering::Acquire) {
        tx.drive(&mut signal);
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = StationConfig::default().with_show_packets(true);
    let main = MainRegisters::new(&config);
    let prog = ProgRegisters::new(&config);

    // Decoder on the programming track: short address 3, 28/128 speed steps
    let ack_line = Arc::new(AckLine::new());
    let decoder = MockDecoder::new(ack_line.clone())
        .with_cv(1, 3)
        .with_cv(29, 6)
        .with_history(false);

    let main_consumer = main
        .consumer()
        .ok_or_else(|| anyhow!("main track consumer already taken"))?;
    let prog_consumer = prog
        .consumer()
        .ok_or_else(|| anyhow!("programming track consumer already taken"))?;

    let lines = spawn_stdin_reader();
    let stop = AtomicBool::new(false);

    thread::scope(|s| {
        let stop = &stop;
        s.spawn(move || run_track(Transmitter::new(main_consumer), stop));
        s.spawn(move || run_track(Transmitter::with_observer(prog_consumer, decoder), stop));

        let result = run_console(&main, &prog, ack_line, config, &lines);
        stop.store(true, Ordering::Release);
        result
    })
}

fn run_console(
    main: &MainRegisters,
    prog: &ProgRegisters,
    ack_line: Arc<AckLine>,
    config: StationConfig,
    lines: &Receiver<String>,
) -> anyhow::Result<()> {
    let mut station = CommandStation::new(
        main,
        prog,
        MockCurrentSense::new(IDLE_CURRENT).with_noise(CURRENT_NOISE),
        MockCurrentSense::new(IDLE_CURRENT)
            .with_noise(CURRENT_NOISE)
            .with_ack_line(ack_line),
        MockTrackPower::new(),
        config,
    )?;

    let clock = InstantClock(Instant::now());
    let mut framer = CommandFramer::new();
    let mut out = String::new();

    println!("DCC console ready, type <s> for status, Ctrl-D to quit");

    loop {
        match lines.recv_timeout(Duration::from_millis(POLL_INTERVAL_MS)) {
            Ok(line) => {
                for c in line.chars() {
                    if let Some(body) = framer.push(c) {
                        station.process(&body, &mut out)?;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        station.check_current(clock.now_ms(), &mut out)?;

        if !out.is_empty() {
            println!("{}", out);
            out.clear();
        }
    }

    log::info!("console closed");
    Ok(())
}
