//! ESP32-C3 SuperMini DCC command station.
//!
//! This is the main entry point for the physical command station. It:
//! - Generates the DCC signal for the main and programming tracks
//! - Reads `<...>` commands from the console UART
//! - Samples track current for service-mode acks and overload protection
//!
//! # Hardware Setup
//!
//! See [`rs_dcc_station::hal::esp32::pins`] for the wiring.
//!
//! # Build
//!
//! ```bash
//! cargo build --release --features esp32 --bin esp32_main
//! espflash flash --monitor target/riscv32imc-esp-espidf/release/esp32_main
//! ```

use esp_idf_hal::adc::oneshot::AdcDriver;
use esp_idf_hal::peripherals::Peripherals;
use rs_dcc_station::hal::esp32::{Esp32Clock, Esp32CurrentSense, Esp32Signal, Esp32TrackPower};
use rs_dcc_station::traits::{Clock, SignalOutput};
use rs_dcc_station::{
    CommandFramer, CommandStation, MainRegisters, ProgRegisters, StationConfig, Transmitter,
};
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

/// Main loop interval in milliseconds; matches the current sample interval.
const LOOP_INTERVAL_MS: u64 = 10;

/// Stack size for the transmitter threads.
const TRANSMITTER_STACK: usize = 4096;

fn spawn_console_reader() -> anyhow::Result<Receiver<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(receiver)
}

fn spawn_transmitter<const N: usize, S>(
    name: &str,
    registers: &'static rs_dcc_station::RegisterList<N>,
    mut signal: S,
) -> anyhow::Result<()>
where
    S: SignalOutput + Send + 'static,
{
    let consumer = registers
        .consumer()
        .ok_or_else(|| anyhow::anyhow!("{} consumer already taken", name))?;
    thread::Builder::new()
        .name(name.into())
        .stack_size(TRANSMITTER_STACK)
        .spawn(move || {
            let mut tx = Transmitter::new(consumer);
            loop {
                tx.drive(&mut signal);
            }
        })?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF
    esp_idf_hal::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!();
    println!("================================");
    println!("  rs-dcc-station SuperMini");
    println!("================================");
    println!();

    // =========================================================================
    // Configuration
    // =========================================================================
    let config = StationConfig::default().with_show_packets(option_env!("SHOW_PACKETS").is_some());

    let peripherals = Peripherals::take()?;

    // =========================================================================
    // Register lists (live for the whole program)
    // =========================================================================
    let main: &'static MainRegisters = Box::leak(Box::new(MainRegisters::new(&config)));
    let prog: &'static ProgRegisters = Box::leak(Box::new(ProgRegisters::new(&config)));

    // =========================================================================
    // Track Power (booster enables on GPIO6/7)
    // =========================================================================
    let power = Esp32TrackPower::new(peripherals.pins.gpio6, peripherals.pins.gpio7)?;
    println!("[OK] Track power initialized (GPIO6/7), power off");

    // =========================================================================
    // Current Sense (ADC on GPIO0/1)
    // =========================================================================
    let adc1 = AdcDriver::new(peripherals.adc1)?;
    let main_sense = Esp32CurrentSense::new(&adc1, peripherals.pins.gpio0)?;
    let prog_sense = Esp32CurrentSense::new(&adc1, peripherals.pins.gpio1)?;
    println!("[OK] Current sense initialized (GPIO0/1 ADC)");

    // =========================================================================
    // DCC Signal (GPIO2/3)
    // =========================================================================
    let main_signal = Esp32Signal::new(peripherals.pins.gpio2)?;
    let prog_signal = Esp32Signal::new(peripherals.pins.gpio3)?;
    spawn_transmitter("dcc-main", main, main_signal)?;
    spawn_transmitter("dcc-prog", prog, prog_signal)?;
    println!("[OK] DCC signal started (GPIO2/3)");

    // =========================================================================
    // Station
    // =========================================================================
    let mut station = CommandStation::new(main, prog, main_sense, prog_sense, power, config)?;
    let lines = spawn_console_reader()?;
    let clock = Esp32Clock::new();
    let mut framer = CommandFramer::new();
    let mut out = String::new();

    println!();
    println!("Commands:");
    println!("  <1> / <0>          Track power on / off");
    println!("  <t REG CAB SPD D>  Throttle");
    println!("  <R CV CB SUB>      Read CV on programming track");
    println!("  <s>                Status");
    println!();

    // =========================================================================
    // Main Loop
    // =========================================================================
    loop {
        while let Ok(line) = lines.try_recv() {
            for c in line.chars() {
                if let Some(body) = framer.push(c) {
                    station.process(&body, &mut out)?;
                }
            }
        }

        station.check_current(clock.now_ms(), &mut out)?;

        if !out.is_empty() {
            println!("{}", out);
            out.clear();
        }

        thread::sleep(Duration::from_millis(LOOP_INTERVAL_MS));
    }
}
