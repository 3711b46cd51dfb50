//! Track current overload monitoring.
//!
//! Each track gets a [`CurrentMonitor`] that keeps a heavily smoothed
//! current reading. Short spikes (an acknowledgment pulse, a locomotive
//! starting) barely move it; a sustained short pushes it over the limit.

use crate::commands::Track;
use crate::config::MonitorConfig;
use crate::reply::PowerReply;
use crate::traits::CurrentSense;

/// Smoothed current of one track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurrentMonitor {
    track: Track,
    config: MonitorConfig,
    current: f32,
}

impl CurrentMonitor {
    /// Creates a monitor for `track` with zero current.
    pub const fn new(track: Track, config: MonitorConfig) -> Self {
        Self {
            track,
            config,
            current: 0.0,
        }
    }

    /// Track being monitored.
    pub fn track(&self) -> Track {
        self.track
    }

    /// Smoothed current in raw units.
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Folds one reading into the smoothed current.
    pub fn sample<S: CurrentSense>(&mut self, sense: &mut S) -> f32 {
        let alpha = self.config.smoothing;
        let read = f32::from(sense.read_raw());
        self.current = read * alpha + self.current * (1.0 - alpha);
        self.current
    }

    /// True if the smoothed current is above the limit.
    pub fn is_overloaded(&self) -> bool {
        self.current > self.config.max_current
    }

    /// Reply announcing that this track's overload cut power.
    pub fn overload_reply(&self) -> PowerReply {
        match self.track {
            Track::Main => PowerReply::MainOverload,
            Track::Prog => PowerReply::ProgOverload,
        }
    }
}
