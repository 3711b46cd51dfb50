//! Service-mode acknowledgment detection.
//!
//! A decoder on the programming track acknowledges an instruction by
//! drawing roughly 60 mA for about 6 ms. The sampler averages a baseline
//! before the instruction goes out, then watches an exponentially smoothed
//! rise above that baseline.

use crate::config::AckConfig;
use crate::traits::CurrentSense;

/// Baseline averaging and pulse detection over a [`CurrentSense`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AckSampler {
    config: AckConfig,
}

impl AckSampler {
    /// Creates a sampler with the given parameters.
    pub const fn new(config: AckConfig) -> Self {
        Self { config }
    }

    /// Sampler parameters.
    pub fn config(&self) -> &AckConfig {
        &self.config
    }

    /// Integer mean of `base_count` reads.
    pub fn baseline<S: CurrentSense>(&self, sense: &mut S) -> i32 {
        let count = i32::from(self.config.base_count);
        if count == 0 {
            return 0;
        }
        let sum: i32 = (0..count).map(|_| i32::from(sense.read_raw())).sum();
        sum / count
    }

    /// One smoothing step, truncated toward zero.
    pub fn smooth(&self, previous: i32, read: i32, base: i32) -> i32 {
        let alpha = self.config.smoothing;
        ((read - base) as f32 * alpha + previous as f32 * (1.0 - alpha)) as i32
    }

    /// Reads the full window and reports whether the smoothed rise ever
    /// exceeded the threshold.
    pub fn detect<S: CurrentSense>(&self, sense: &mut S, base: i32) -> bool {
        let mut smoothed = 0;
        let mut acked = false;
        for _ in 0..self.config.sample_count {
            smoothed = self.smooth(smoothed, i32::from(sense.read_raw()), base);
            if smoothed > self.config.threshold {
                acked = true;
            }
        }
        acked
    }
}

impl Default for AckSampler {
    fn default() -> Self {
        Self::new(AckConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        reads: std::vec::Vec<u16>,
        pos: usize,
        fallback: u16,
    }

    impl Scripted {
        fn new(reads: std::vec::Vec<u16>, fallback: u16) -> Self {
            Self {
                reads,
                pos: 0,
                fallback,
            }
        }
    }

    impl CurrentSense for Scripted {
        fn read_raw(&mut self) -> u16 {
            let read = self.reads.get(self.pos).copied().unwrap_or(self.fallback);
            self.pos += 1;
            read
        }
    }

    // ========================================================================
    // Baseline
    // ========================================================================

    #[test]
    fn baseline_is_integer_mean() {
        let mut reads = std::vec![10u16; 99];
        reads.push(109);
        let mut sense = Scripted::new(reads, 0);
        // (990 + 109) / 100 = 10.99
        assert_eq!(AckSampler::default().baseline(&mut sense), 10);
        assert_eq!(sense.pos, 100);
    }

    #[test]
    fn baseline_with_zero_count() {
        let sampler = AckSampler::new(AckConfig::default().with_base_count(0));
        let mut sense = Scripted::new(std::vec![], 50);
        assert_eq!(sampler.baseline(&mut sense), 0);
        assert_eq!(sense.pos, 0);
    }

    // ========================================================================
    // Smoothing
    // ========================================================================

    #[test]
    fn smoothing_truncates_each_step() {
        let sampler = AckSampler::default();
        // 60 * 0.2 = 12
        assert_eq!(sampler.smooth(0, 60, 0), 12);
        // 60 * 0.2 + 12 * 0.8 = 21.6
        assert_eq!(sampler.smooth(12, 60, 0), 21);
        // 4 * 0.2 = 0.8
        assert_eq!(sampler.smooth(0, 14, 10), 0);
    }

    #[test]
    fn smoothing_below_baseline_goes_negative() {
        assert_eq!(AckSampler::default().smooth(0, 0, 50), -10);
    }

    // ========================================================================
    // Detection
    // ========================================================================

    #[test]
    fn quiet_line_is_not_an_ack() {
        let mut sense = Scripted::new(std::vec![], 20);
        assert!(!AckSampler::default().detect(&mut sense, 20));
        assert_eq!(sense.pos, 500);
    }

    #[test]
    fn pulse_is_an_ack() {
        let mut reads = std::vec![20u16; 50];
        reads.extend(std::iter::repeat(80).take(40));
        let mut sense = Scripted::new(reads, 20);
        assert!(AckSampler::default().detect(&mut sense, 20));
        // window is always read to the end
        assert_eq!(sense.pos, 500);
    }

    #[test]
    fn single_spike_is_filtered() {
        let mut reads = std::vec![20u16; 10];
        reads.push(170);
        let mut sense = Scripted::new(reads, 20);
        // 150 * 0.2 = 30, not above threshold
        assert!(!AckSampler::default().detect(&mut sense, 20));
    }

    #[test]
    fn threshold_is_exclusive() {
        let sampler = AckSampler::new(
            AckConfig::default()
                .with_smoothing(1.0)
                .with_sample_count(1),
        );
        let mut at = Scripted::new(std::vec![30], 0);
        assert!(!sampler.detect(&mut at, 0));
        let mut above = Scripted::new(std::vec![31], 0);
        assert!(sampler.detect(&mut above, 0));
    }
}
