//! The command station: dispatches parsed commands to the register lists.
//!
//! [`CommandStation`] borrows the main and programming register lists (the
//! transmitters hold their consumers) and owns the current sensors, track
//! power and overload monitors. Replies are written to any
//! [`core::fmt::Write`] sink, one reply per `<...>` group.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc_station::{CommandStation, MainRegisters, ProgRegisters, StationConfig};
//! use rs_dcc_station::hal::{MockCurrentSense, MockTrackPower};
//!
//! let config = StationConfig::default();
//! let main = MainRegisters::new(&config);
//! let prog = ProgRegisters::new(&config);
//! let mut station = CommandStation::new(
//!     &main,
//!     &prog,
//!     MockCurrentSense::new(0),
//!     MockCurrentSense::new(0),
//!     MockTrackPower::new(),
//!     config,
//! )
//! .unwrap();
//!
//! let mut out = String::new();
//! station.process("1", &mut out).unwrap();
//! assert_eq!(out, "<p1>");
//! ```

use core::fmt::{self, Write};

use crate::commands::{Command, Track};
use crate::config::StationConfig;
use crate::error::{CommandError, PacketError, ParseError};
use crate::monitor::CurrentMonitor;
use crate::packet::IDLE_PAYLOAD;
use crate::register::RegisterList;
use crate::reply::{CurrentReply, InvalidPacketReply, PowerReply, VersionReply};
use crate::traits::{CurrentSense, TrackPower};

/// Composition root for one main track and one programming track.
#[derive(Debug)]
pub struct CommandStation<'a, const M: usize, const P: usize, MS, PS, PW> {
    main: &'a RegisterList<M>,
    prog: &'a RegisterList<P>,
    main_sense: MS,
    prog_sense: PS,
    power: PW,
    main_monitor: CurrentMonitor,
    prog_monitor: CurrentMonitor,
    last_sample_ms: Option<u64>,
    config: StationConfig,
}

impl<'a, const M: usize, const P: usize, MS, PS, PW> CommandStation<'a, M, P, MS, PS, PW>
where
    MS: CurrentSense,
    PS: CurrentSense,
    PW: TrackPower,
{
    /// Creates the station and loads an idle packet into register 1 of both
    /// tracks so the rails carry valid DCC from the start.
    ///
    /// Blocks until both transmitters have taken their idle packet if they
    /// are already running.
    pub fn new(
        main: &'a RegisterList<M>,
        prog: &'a RegisterList<P>,
        main_sense: MS,
        prog_sense: PS,
        power: PW,
        config: StationConfig,
    ) -> Result<Self, PacketError> {
        main.load_packet(1, &IDLE_PAYLOAD, 0, false)?;
        prog.load_packet(1, &IDLE_PAYLOAD, 0, false)?;
        log::info!(
            "{} v{} ready: {} main, {} programming registers",
            config.device.name,
            config.device.version,
            main.max_num_regs(),
            prog.max_num_regs()
        );

        Ok(Self {
            main,
            prog,
            main_sense,
            prog_sense,
            power,
            main_monitor: CurrentMonitor::new(Track::Main, config.monitor),
            prog_monitor: CurrentMonitor::new(Track::Prog, config.monitor),
            last_sample_ms: None,
            config,
        })
    }

    /// Main track register list.
    pub fn main(&self) -> &'a RegisterList<M> {
        self.main
    }

    /// Programming track register list.
    pub fn prog(&self) -> &'a RegisterList<P> {
        self.prog
    }

    /// Track power.
    pub fn power(&self) -> &PW {
        &self.power
    }

    /// Main track monitor.
    pub fn main_monitor(&self) -> &CurrentMonitor {
        &self.main_monitor
    }

    /// Programming track monitor.
    pub fn prog_monitor(&self) -> &CurrentMonitor {
        &self.prog_monitor
    }

    /// Station configuration.
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Parses and executes one command body.
    ///
    /// Unparseable commands are dropped without a reply, except raw
    /// packets with a bad byte list which answer `<mInvalid Packet>`.
    pub fn process<W: Write>(&mut self, line: &str, out: &mut W) -> fmt::Result {
        match Command::parse(line) {
            Ok(cmd) => self.execute(cmd, out),
            Err(ParseError::InvalidPacket) => write!(out, "{}", InvalidPacketReply),
            Err(e) => {
                log::debug!("dropped command {:?}: {}", line, e);
                Ok(())
            }
        }
    }

    /// Executes one parsed command and writes its reply, if any.
    pub fn execute<W: Write>(&mut self, cmd: Command, out: &mut W) -> fmt::Result {
        let result = match cmd {
            Command::Throttle {
                reg,
                cab,
                speed,
                direction,
            } => self
                .main
                .set_throttle(reg, cab, speed, direction)
                .map(|reply| write!(out, "{}", reply)),
            Command::Function { cab, byte1, byte2 } => {
                self.main.set_function(cab, byte1, byte2).map(|()| Ok(()))
            }
            Command::Accessory {
                addr,
                subaddr,
                activate,
            } => self
                .main
                .set_accessory(addr, subaddr, activate)
                .map(|()| Ok(())),
            Command::WriteCvByteMain { cab, cv, value } => self
                .main
                .write_cv_byte_main(cab, cv, value)
                .map(|()| Ok(())),
            Command::WriteCvBitMain {
                cab,
                cv,
                bit,
                value,
            } => self
                .main
                .write_cv_bit_main(cab, cv, bit, value)
                .map(|()| Ok(())),
            Command::WriteCvByte {
                cv,
                value,
                callback,
            } => self
                .prog
                .write_cv_byte(&mut self.prog_sense, cv, value, callback)
                .map(|reply| write!(out, "{}", reply)),
            Command::WriteCvBit {
                cv,
                bit,
                value,
                callback,
            } => self
                .prog
                .write_cv_bit(&mut self.prog_sense, cv, bit, value, callback)
                .map(|reply| write!(out, "{}", reply)),
            Command::ReadCv { cv, callback } => self
                .prog
                .read_cv(&mut self.prog_sense, cv, callback)
                .map(|reply| write!(out, "{}", reply)),
            Command::RawPacket { track, reg, bytes } => {
                let loaded = match track {
                    Track::Main => self.main.write_text_packet(reg, &bytes),
                    Track::Prog => self.prog.write_text_packet(reg, &bytes),
                };
                loaded.map(|()| Ok(()))
            }
            Command::PowerOn => Ok(self.switch_power(true, out)),
            Command::PowerOff => Ok(self.switch_power(false, out)),
            Command::Current => Ok(write!(
                out,
                "{}",
                CurrentReply(self.main_monitor.current() as i32)
            )),
            Command::Status => Ok(self.status(out)),
            Command::Newline => Ok(writeln!(out)),
        };

        match result {
            Ok(written) => written,
            Err(CommandError::InvalidPacket) => write!(out, "{}", InvalidPacketReply),
            Err(e) => {
                log::debug!("command failed: {}", e);
                Ok(())
            }
        }
    }

    fn switch_power<W: Write>(&mut self, on: bool, out: &mut W) -> fmt::Result {
        if self.power.set_enabled(on).is_err() {
            log::warn!("failed to switch track power {}", if on { "on" } else { "off" });
            return Ok(());
        }
        write!(out, "{}", PowerReply::from_enabled(on))
    }

    fn status<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(out, "{}", PowerReply::from_enabled(self.power.is_enabled()))?;
        for throttle in self.main.throttles() {
            write!(out, "{}", throttle)?;
        }
        write!(
            out,
            "{}",
            VersionReply {
                name: &self.config.device.name,
                version: &self.config.device.version,
            }
        )
    }

    /// Samples both tracks if the sample interval has elapsed and cuts
    /// power on overload.
    ///
    /// Call this from the main loop as often as convenient.
    pub fn check_current<W: Write>(&mut self, now_ms: u64, out: &mut W) -> fmt::Result {
        if let Some(last) = self.last_sample_ms {
            if now_ms.saturating_sub(last) < self.config.monitor.sample_interval_ms {
                return Ok(());
            }
        }
        self.last_sample_ms = Some(now_ms);

        self.main_monitor.sample(&mut self.main_sense);
        self.prog_monitor.sample(&mut self.prog_sense);

        for monitor in [self.main_monitor, self.prog_monitor] {
            if monitor.is_overloaded() && self.power.is_enabled() {
                log::warn!(
                    "{} track overload ({:.0}), cutting power",
                    monitor.track().as_str(),
                    monitor.current()
                );
                if self.power.power_off().is_err() {
                    log::warn!("failed to cut track power");
                }
                write!(out, "{}", monitor.overload_reply())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::{MockCurrentSense, MockTrackPower};
    use crate::register::{MainRegisters, ProgRegisters};
    use std::string::String;

    type TestStation<'a> =
        CommandStation<'a, 13, 3, MockCurrentSense, MockCurrentSense, MockTrackPower>;

    fn station<'a>(main: &'a MainRegisters, prog: &'a ProgRegisters) -> TestStation<'a> {
        let station = CommandStation::new(
            main,
            prog,
            MockCurrentSense::new(0),
            MockCurrentSense::new(0),
            MockTrackPower::new(),
            StationConfig::default(),
        )
        .unwrap();
        // drain the idle packets loaded at startup
        drop(main.consumer().unwrap().take_update());
        drop(prog.consumer().unwrap().take_update());
        station
    }

    fn lists() -> (MainRegisters, ProgRegisters) {
        let config = StationConfig::default();
        (MainRegisters::new(&config), ProgRegisters::new(&config))
    }

    fn reply(station: &mut TestStation<'_>, line: &str) -> String {
        let mut out = String::new();
        station.process(line, &mut out).unwrap();
        out
    }

    // ========================================================================
    // Startup
    // ========================================================================

    #[test]
    fn idle_loaded_into_register_one() {
        let (main, prog) = lists();
        let _station = CommandStation::new(
            &main,
            &prog,
            MockCurrentSense::new(0),
            MockCurrentSense::new(0),
            MockTrackPower::new(),
            StationConfig::default(),
        )
        .unwrap();

        let mut consumer = main.consumer().unwrap();
        let update = consumer.take_update().unwrap();
        assert_eq!(update.slot(), 1);
        assert_eq!(update.packet().decode().unwrap().data(), &IDLE_PAYLOAD);
        assert_eq!(prog.slot_of(1), Some(1));
    }

    // ========================================================================
    // Power and status
    // ========================================================================

    #[test]
    fn power_commands() {
        let (main, prog) = lists();
        let mut station = station(&main, &prog);

        assert_eq!(reply(&mut station, "1"), "<p1>");
        assert!(station.power().is_enabled());
        assert_eq!(reply(&mut station, "0"), "<p0>");
        assert!(!station.power().is_enabled());
    }

    #[test]
    fn status_lists_power_throttles_and_version() {
        let (main, prog) = lists();
        let mut station = station(&main, &prog);
        let mut consumer = main.consumer().unwrap();

        assert_eq!(reply(&mut station, "t 1 3 60 1"), "<T1 60 1>");
        drop(consumer.take_update());
        assert_eq!(reply(&mut station, "t 2 4 20 0"), "<T2 20 0>");
        drop(consumer.take_update());

        let expected = std::format!(
            "<p0><T1 60 1><T2 20 0><iDCC++ BASE STATION v{}>",
            env!("CARGO_PKG_VERSION")
        );
        assert_eq!(reply(&mut station, "s"), expected);
    }

    #[test]
    fn current_and_newline() {
        let (main, prog) = lists();
        let mut station = station(&main, &prog);
        assert_eq!(reply(&mut station, "c"), "<a0>");
        assert_eq!(reply(&mut station, " "), "\n");
    }

    // ========================================================================
    // Silent failures
    // ========================================================================

    #[test]
    fn bad_commands_are_silent() {
        let (main, prog) = lists();
        let mut station = station(&main, &prog);

        assert_eq!(reply(&mut station, "x"), "");
        assert_eq!(reply(&mut station, "t 1 3"), "");
        assert_eq!(reply(&mut station, "t 13 3 60 1"), "");
        assert!(main.is_idle());
    }

    #[test]
    fn invalid_raw_packet_replies() {
        let (main, prog) = lists();
        let mut station = station(&main, &prog);

        assert_eq!(reply(&mut station, "M 1 03"), "<mInvalid Packet>");
        assert_eq!(reply(&mut station, "P 1 1 2 3 4 5 6"), "<mInvalid Packet>");
        assert!(main.is_idle());
        assert!(prog.is_idle());
    }

    #[test]
    fn raw_packet_goes_to_its_track() {
        let (main, prog) = lists();
        let mut station = station(&main, &prog);
        let mut consumer = prog.consumer().unwrap();

        assert_eq!(reply(&mut station, "P 2 03 3F 80"), "");
        let update = consumer.take_update().unwrap();
        assert_eq!(update.packet().decode().unwrap().data(), &[0x03, 0x3F, 0x80]);
        assert!(main.is_idle());
    }

    // ========================================================================
    // Overload
    // ========================================================================

    #[test]
    fn overload_cuts_power() {
        let (main, prog) = lists();
        let mut station = CommandStation::new(
            &main,
            &prog,
            MockCurrentSense::new(1023),
            MockCurrentSense::new(0),
            MockTrackPower::new(),
            StationConfig::default(),
        )
        .unwrap();

        let mut out = String::new();
        station.process("1", &mut out).unwrap();
        out.clear();

        let mut now = 0;
        while station.power().is_enabled() {
            station.check_current(now, &mut out).unwrap();
            now += 10;
            assert!(now < 10_000);
        }
        assert_eq!(out, "<p2>");
        assert!(station.main_monitor().is_overloaded());

        // no repeat announcement while power stays off
        out.clear();
        station.check_current(now, &mut out).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn sampling_respects_interval() {
        let (main, prog) = lists();
        let mut station = CommandStation::new(
            &main,
            &prog,
            MockCurrentSense::new(100),
            MockCurrentSense::new(0),
            MockTrackPower::new(),
            StationConfig::default(),
        )
        .unwrap();

        let mut out = String::new();
        station.check_current(0, &mut out).unwrap();
        let first = station.main_monitor().current();
        station.check_current(5, &mut out).unwrap();
        assert_eq!(station.main_monitor().current(), first);
        station.check_current(10, &mut out).unwrap();
        assert!(station.main_monitor().current() > first);
    }
}
