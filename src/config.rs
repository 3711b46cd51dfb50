//! Station configuration shared by desktop and ESP32 builds.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use rs_dcc_station::config::{AckConfig, StationConfig};
//!
//! // Use defaults
//! let config = StationConfig::default();
//! assert_eq!(config.ack.threshold, 30);
//!
//! // Or customize
//! let config = StationConfig::default()
//!     .with_show_packets(true)
//!     .with_ack(AckConfig::default().with_threshold(40));
//! ```

use heapless::String as HString;

/// Maximum length for short config strings (station name, version)
pub const MAX_SHORT_STRING: usize = 32;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Reads taken to establish the acknowledgment baseline.
pub const ACK_BASE_COUNT: u16 = 100;

/// Reads taken while watching for an acknowledgment pulse.
pub const ACK_SAMPLE_COUNT: u16 = 500;

/// Exponential smoothing factor for acknowledgment samples.
pub const ACK_SAMPLE_SMOOTHING: f32 = 0.2;

/// Smoothed rise above baseline that counts as an acknowledgment.
pub const ACK_SAMPLE_THRESHOLD: i32 = 30;

/// Smoothing factor for the overload monitor.
pub const CURRENT_SAMPLE_SMOOTHING: f32 = 0.01;

/// Milliseconds between overload monitor samples.
pub const CURRENT_SAMPLE_INTERVAL_MS: u64 = 10;

/// Smoothed reading above which track power is cut.
pub const CURRENT_SAMPLE_MAX: f32 = 300.0;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    // Cut on a char boundary
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|&end| end <= MAX_SHORT_STRING)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

// ============================================================================
// Station Config
// ============================================================================

/// Complete command station configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StationConfig {
    /// Identification reported by the status command
    pub device: DeviceConfig,
    /// Service-mode acknowledgment detection
    pub ack: AckConfig,
    /// Overload monitoring
    pub monitor: MonitorConfig,
    /// Log a `<*...>` trace for every traced packet load
    pub show_packets: bool,
}

impl StationConfig {
    /// Set device identification
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Set acknowledgment detection parameters
    pub fn with_ack(mut self, ack: AckConfig) -> Self {
        self.ack = ack;
        self
    }

    /// Set overload monitor parameters
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Enable or disable packet tracing
    pub fn with_show_packets(mut self, show: bool) -> Self {
        self.show_packets = show;
        self
    }
}

// ============================================================================
// Ack Config
// ============================================================================

/// Acknowledgment detection parameters for the programming track.
///
/// A decoder acknowledges by drawing a short current pulse. The sampler
/// averages `base_count` reads for a baseline, then smooths `sample_count`
/// reads and reports an ack if the smoothed rise ever exceeds `threshold`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AckConfig {
    /// Reads averaged into the baseline
    pub base_count: u16,
    /// Reads in the detection window
    pub sample_count: u16,
    /// Weight of the newest read (0.0 - 1.0)
    pub smoothing: f32,
    /// Smoothed rise required for an ack
    pub threshold: i32,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            base_count: ACK_BASE_COUNT,
            sample_count: ACK_SAMPLE_COUNT,
            smoothing: ACK_SAMPLE_SMOOTHING,
            threshold: ACK_SAMPLE_THRESHOLD,
        }
    }
}

impl AckConfig {
    /// Set baseline read count
    pub fn with_base_count(mut self, count: u16) -> Self {
        self.base_count = count;
        self
    }

    /// Set detection window length
    pub fn with_sample_count(mut self, count: u16) -> Self {
        self.sample_count = count;
        self
    }

    /// Set smoothing factor (clamped to 0.0 - 1.0)
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    /// Set ack threshold
    pub fn with_threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold;
        self
    }
}

// ============================================================================
// Monitor Config
// ============================================================================

/// Overload monitor parameters, applied to both tracks.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorConfig {
    /// Weight of the newest read (0.0 - 1.0)
    pub smoothing: f32,
    /// Minimum time between samples
    pub sample_interval_ms: u64,
    /// Smoothed reading that trips the overload
    pub max_current: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            smoothing: CURRENT_SAMPLE_SMOOTHING,
            sample_interval_ms: CURRENT_SAMPLE_INTERVAL_MS,
            max_current: CURRENT_SAMPLE_MAX,
        }
    }
}

impl MonitorConfig {
    /// Set smoothing factor (clamped to 0.0 - 1.0)
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    /// Set sample interval
    pub fn with_sample_interval_ms(mut self, ms: u64) -> Self {
        self.sample_interval_ms = ms;
        self
    }

    /// Set overload trip level
    pub fn with_max_current(mut self, max: f32) -> Self {
        self.max_current = max;
        self
    }
}

// ============================================================================
// Device Config
// ============================================================================

/// Station identification, reported as `<iNAME vVERSION>`
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Station name
    pub name: ShortString,
    /// Firmware version string
    pub version: ShortString,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: short_string("DCC++ BASE STATION"),
            version: short_string(env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DeviceConfig {
    /// Set the station name
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = short_string(name);
        self
    }

    /// Set the version string
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = short_string(version);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StationConfig::default();
        assert_eq!(config.ack.base_count, 100);
        assert_eq!(config.ack.sample_count, 500);
        assert_eq!(config.monitor.sample_interval_ms, 10);
        assert!(!config.show_packets);
    }

    #[test]
    fn builder_pattern() {
        let config = StationConfig::default()
            .with_show_packets(true)
            .with_ack(AckConfig::default().with_threshold(45))
            .with_monitor(MonitorConfig::default().with_max_current(500.0))
            .with_device(DeviceConfig::default().with_name("Layout"));

        assert!(config.show_packets);
        assert_eq!(config.ack.threshold, 45);
        assert_eq!(config.monitor.max_current, 500.0);
        assert_eq!(config.device.name.as_str(), "Layout");
    }

    // =========================================================================
    // AckConfig Tests
    // =========================================================================

    #[test]
    fn ack_config_default() {
        let ack = AckConfig::default();
        assert_eq!(ack.smoothing, 0.2);
        assert_eq!(ack.threshold, 30);
    }

    #[test]
    fn ack_config_builder() {
        let ack = AckConfig::default()
            .with_base_count(10)
            .with_sample_count(50)
            .with_smoothing(0.5)
            .with_threshold(5);

        assert_eq!(ack.base_count, 10);
        assert_eq!(ack.sample_count, 50);
        assert_eq!(ack.smoothing, 0.5);
        assert_eq!(ack.threshold, 5);
    }

    #[test]
    fn ack_smoothing_clamped() {
        assert_eq!(AckConfig::default().with_smoothing(1.5).smoothing, 1.0);
        assert_eq!(AckConfig::default().with_smoothing(-0.5).smoothing, 0.0);
    }

    // =========================================================================
    // MonitorConfig Tests
    // =========================================================================

    #[test]
    fn monitor_config_default() {
        let monitor = MonitorConfig::default();
        assert_eq!(monitor.smoothing, 0.01);
        assert_eq!(monitor.max_current, 300.0);
    }

    #[test]
    fn monitor_config_builder() {
        let monitor = MonitorConfig::default()
            .with_smoothing(0.1)
            .with_sample_interval_ms(20)
            .with_max_current(250.0);

        assert_eq!(monitor.smoothing, 0.1);
        assert_eq!(monitor.sample_interval_ms, 20);
        assert_eq!(monitor.max_current, 250.0);
    }

    // =========================================================================
    // DeviceConfig Tests
    // =========================================================================

    #[test]
    fn device_config_default() {
        let device = DeviceConfig::default();
        assert_eq!(device.name.as_str(), "DCC++ BASE STATION");
        assert_eq!(device.version.as_str(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn device_config_builder() {
        let device = DeviceConfig::default()
            .with_name("Club Layout")
            .with_version("2.0");

        assert_eq!(device.name.as_str(), "Club Layout");
        assert_eq!(device.version.as_str(), "2.0");
    }

    // =========================================================================
    // String Helper Tests
    // =========================================================================

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_utf8_boundary() {
        // 2 bytes each, 34 bytes total
        let input = "ééééééééééééééééé";
        let s = short_string(input);
        assert!(s.len() <= MAX_SHORT_STRING);
        assert!(core::str::from_utf8(s.as_bytes()).is_ok());
    }
}
