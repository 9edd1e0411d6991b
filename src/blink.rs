//! Blink signal processing
//!
//! Smooths the per-frame EAR, detects open→closed→open cycles against a
//! single threshold, and emits a `BlinkEvent` for every cycle whose closed
//! duration is plausible. A debounce window after each accepted blink stops
//! a noisy re-opening from being counted twice.

use crate::error::BlinkMorseError;
use crate::types::{BlinkEvent, FrameMetrics};
use serde::{Deserialize, Serialize};

/// Blink detector tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Smoothed EAR below this counts as closed
    pub eye_ar_threshold: f64,
    /// Weight of the new raw sample in the exponential filter
    pub smoothing_factor: f64,
    /// Shortest accepted closed duration (seconds)
    pub min_blink_duration: f64,
    /// Longest accepted closed duration (seconds)
    pub max_blink_duration: f64,
    /// Transitions are ignored this long after an accepted blink (seconds)
    pub debounce_time: f64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            eye_ar_threshold: 0.18,
            smoothing_factor: 0.7,
            min_blink_duration: 0.03,
            max_blink_duration: 3.0,
            debounce_time: 0.08,
        }
    }
}

impl BlinkConfig {
    pub fn validate(&self) -> Result<(), BlinkMorseError> {
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(BlinkMorseError::InvalidConfig(format!(
                "smoothing_factor must be in (0, 1], got {}",
                self.smoothing_factor
            )));
        }
        if !(self.eye_ar_threshold > 0.0) {
            return Err(BlinkMorseError::InvalidConfig(format!(
                "eye_ar_threshold must be positive, got {}",
                self.eye_ar_threshold
            )));
        }
        if !(self.min_blink_duration >= 0.0 && self.min_blink_duration <= self.max_blink_duration)
        {
            return Err(BlinkMorseError::InvalidConfig(format!(
                "blink duration range [{}, {}] is empty",
                self.min_blink_duration, self.max_blink_duration
            )));
        }
        if !(self.debounce_time >= 0.0) {
            return Err(BlinkMorseError::InvalidConfig(format!(
                "debounce_time must be non-negative, got {}",
                self.debounce_time
            )));
        }
        Ok(())
    }
}

/// Stateful EAR → blink event processor
#[derive(Debug, Clone)]
pub struct BlinkSignalProcessor {
    config: BlinkConfig,
    previous_smoothed_ear: Option<f64>,
    eye_closed: bool,
    blink_start: Option<f64>,
    last_blink_end: Option<f64>,
}

impl Default for BlinkSignalProcessor {
    fn default() -> Self {
        Self::new(BlinkConfig::default())
    }
}

impl BlinkSignalProcessor {
    pub fn new(config: BlinkConfig) -> Self {
        Self {
            config,
            previous_smoothed_ear: None,
            eye_closed: false,
            blink_start: None,
            last_blink_end: None,
        }
    }

    pub fn config(&self) -> &BlinkConfig {
        &self.config
    }

    pub fn is_eye_closed(&self) -> bool {
        self.eye_closed
    }

    /// Process one frame.
    ///
    /// `raw_ear` is `None` when the landmark detector found no face; the last
    /// smoothed value is reported and no transition is evaluated. A non-finite
    /// EAR is treated the same way so it never reaches the smoothing state.
    pub fn process_sample(
        &mut self,
        timestamp: f64,
        raw_ear: Option<f64>,
    ) -> (FrameMetrics, Option<BlinkEvent>) {
        let raw = match raw_ear {
            Some(raw) if raw.is_finite() => raw,
            _ => {
                let metrics = FrameMetrics {
                    ear: self.previous_smoothed_ear.unwrap_or(0.0),
                    face_detected: false,
                    eye_closed: self.eye_closed,
                };
                return (metrics, None);
            }
        };

        let smoothed = match self.previous_smoothed_ear {
            None => raw,
            Some(prev) => {
                let alpha = self.config.smoothing_factor;
                alpha * raw + (1.0 - alpha) * prev
            }
        };
        self.previous_smoothed_ear = Some(smoothed);

        let event = if self.in_debounce(timestamp) {
            None
        } else {
            self.evaluate_transition(timestamp, smoothed)
        };

        let metrics = FrameMetrics {
            ear: smoothed,
            face_detected: true,
            eye_closed: self.eye_closed,
        };
        (metrics, event)
    }

    /// Return to the initial state, keeping the configuration
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    fn in_debounce(&self, timestamp: f64) -> bool {
        match self.last_blink_end {
            Some(end) => timestamp - end < self.config.debounce_time,
            None => false,
        }
    }

    fn evaluate_transition(&mut self, timestamp: f64, smoothed: f64) -> Option<BlinkEvent> {
        let threshold = self.config.eye_ar_threshold;

        if !self.eye_closed && smoothed < threshold {
            self.eye_closed = true;
            self.blink_start = Some(timestamp);
            log::trace!("eye closed at {timestamp:.3} (ear {smoothed:.3})");
            return None;
        }

        if self.eye_closed && smoothed >= threshold {
            self.eye_closed = false;
            let start = self.blink_start.take()?;
            let duration = timestamp - start;

            if duration >= self.config.min_blink_duration
                && duration <= self.config.max_blink_duration
            {
                self.last_blink_end = Some(timestamp);
                log::debug!("blink {duration:.3}s ({start:.3} -> {timestamp:.3})");
                return Some(BlinkEvent {
                    is_blink: true,
                    duration,
                    start_time: start,
                    end_time: timestamp,
                });
            }
            log::debug!("discarded closure of {duration:.3}s outside blink range");
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: f64 = 0.30;
    const CLOSED: f64 = 0.05;

    fn crisp() -> BlinkSignalProcessor {
        BlinkSignalProcessor::new(BlinkConfig {
            smoothing_factor: 1.0,
            ..Default::default()
        })
    }

    /// Feed `(timestamp, ear)` pairs and collect the emitted events
    fn feed(
        processor: &mut BlinkSignalProcessor,
        samples: &[(f64, Option<f64>)],
    ) -> Vec<BlinkEvent> {
        samples
            .iter()
            .filter_map(|&(t, ear)| processor.process_sample(t, ear).1)
            .collect()
    }

    #[test]
    fn test_single_blink_emits_event() {
        let mut p = crisp();
        let events = feed(
            &mut p,
            &[
                (0.00, Some(OPEN)),
                (0.10, Some(CLOSED)),
                (0.20, Some(CLOSED)),
                (0.35, Some(OPEN)),
                (0.45, Some(OPEN)),
            ],
        );
        assert_eq!(events.len(), 1);
        let e = events[0];
        assert!(e.is_blink);
        assert_eq!(e.start_time, 0.10);
        assert_eq!(e.end_time, 0.35);
        assert!((e.duration - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_first_sample_is_not_smoothed() {
        let mut p = BlinkSignalProcessor::default();
        let (metrics, _) = p.process_sample(0.0, Some(0.3));
        assert_eq!(metrics.ear, 0.3);

        let (metrics, _) = p.process_sample(0.01, Some(0.1));
        // 0.7 * 0.1 + 0.3 * 0.3
        assert!((metrics.ear - 0.16).abs() < 1e-9);
    }

    #[test]
    fn test_no_face_holds_last_value() {
        let mut p = crisp();
        let (metrics, event) = p.process_sample(0.0, None);
        assert_eq!(metrics.ear, 0.0);
        assert!(!metrics.face_detected);
        assert!(event.is_none());

        p.process_sample(0.1, Some(CLOSED));
        let (metrics, _) = p.process_sample(0.2, None);
        assert_eq!(metrics.ear, CLOSED);
        assert!(metrics.eye_closed);

        // the closure spans the dropout
        let (_, event) = p.process_sample(0.4, Some(OPEN));
        let event = event.unwrap();
        assert_eq!(event.start_time, 0.1);
        assert!((event.duration - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_ear_is_skipped() {
        let mut p = BlinkSignalProcessor::default();
        p.process_sample(0.0, Some(OPEN));

        for (i, bad) in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY].iter().enumerate() {
            let (metrics, event) = p.process_sample(0.01 * (i + 1) as f64, Some(*bad));
            assert_eq!(metrics.ear, OPEN);
            assert!(!metrics.face_detected);
            assert!(event.is_none());
        }

        // detection keeps working afterwards
        let mut events = 0;
        let mut t = 1.0;
        for _ in 0..20 {
            for _ in 0..20 {
                if p.process_sample(t, Some(CLOSED)).1.is_some() {
                    events += 1;
                }
                t += 0.01;
            }
            for _ in 0..40 {
                if p.process_sample(t, Some(OPEN)).1.is_some() {
                    events += 1;
                }
                t += 0.01;
            }
        }
        assert_eq!(events, 20);
        assert!(p.process_sample(t, Some(OPEN)).0.ear.is_finite());
    }

    #[test]
    fn test_out_of_range_durations_are_discarded() {
        let mut p = crisp();
        // 0.02s flicker is below min_blink_duration
        let events = feed(&mut p, &[(0.00, Some(OPEN)), (0.10, Some(CLOSED)), (0.12, Some(OPEN))]);
        assert!(events.is_empty());
        assert!(!p.is_eye_closed());

        // 4s closure is above max_blink_duration
        let events = feed(&mut p, &[(1.00, Some(CLOSED)), (5.00, Some(OPEN))]);
        assert!(events.is_empty());

        // discarded blinks do not start a debounce window
        let events = feed(&mut p, &[(5.01, Some(CLOSED)), (5.20, Some(OPEN))]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_debounce_suppresses_second_cycle() {
        let mut p = crisp();
        let events = feed(
            &mut p,
            &[
                (0.00, Some(OPEN)),
                (0.10, Some(CLOSED)),
                (0.30, Some(OPEN)),
                // noise within the 0.08s debounce window
                (0.32, Some(CLOSED)),
                (0.35, Some(OPEN)),
                (0.37, Some(CLOSED)),
                (0.50, Some(OPEN)),
            ],
        );
        assert_eq!(events.len(), 1);
        assert!(!p.is_eye_closed());
    }

    #[test]
    fn test_blinks_after_debounce_are_counted() {
        let mut p = crisp();
        let events = feed(
            &mut p,
            &[
                (0.00, Some(OPEN)),
                (0.10, Some(CLOSED)),
                (0.30, Some(OPEN)),
                (0.40, Some(CLOSED)),
                (0.60, Some(OPEN)),
            ],
        );
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_reset_keeps_config() {
        let mut p = crisp();
        p.process_sample(0.0, Some(CLOSED));
        assert!(p.is_eye_closed());
        p.reset();
        assert!(!p.is_eye_closed());
        assert_eq!(p.config().smoothing_factor, 1.0);
        let (metrics, _) = p.process_sample(1.0, None);
        assert_eq!(metrics.ear, 0.0);
    }

    #[test]
    fn test_config_validation() {
        assert!(BlinkConfig::default().validate().is_ok());
        let bad = BlinkConfig {
            smoothing_factor: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = BlinkConfig {
            min_blink_duration: 2.0,
            max_blink_duration: 1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
