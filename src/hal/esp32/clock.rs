//! ESP32 clock for overload sampling, using the ESP-IDF timer.

use crate::traits::Clock;

/// Millisecond clock backed by `esp_timer_get_time()` (microseconds since
/// boot).
///
/// # Example
///
/// ```ignore
/// use rs_dcc_station::hal::esp32::Esp32Clock;
/// use rs_dcc_station::traits::Clock;
///
/// let clock = Esp32Clock::new();
/// station.check_current(clock.now_ms(), &mut out)?;
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Esp32Clock;

impl Esp32Clock {
    /// Creates a new ESP32 clock instance.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for Esp32Clock {
    #[inline]
    fn now_ms(&self) -> u64 {
        // SAFETY: plain read of the free-running system timer
        let micros = unsafe { esp_idf_hal::sys::esp_timer_get_time() };
        (micros / 1000) as u64
    }
}
