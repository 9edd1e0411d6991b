//! Adaptive threshold calibration
//!
//! This module learns per-user timing thresholds from observed blink
//! durations. Samples are accumulated until enough exist, outliers are
//! dropped, and the thresholds are derived from the mean of what remains.
//! Every derivation is floored so the result is always usable: the dot and
//! dash ranges never overlap and no gap is zero.

use crate::error::BlinkMorseError;
use crate::storage::ThresholdStore;
use crate::types::Thresholds;
use serde::{Deserialize, Serialize};

/// Samples needed before thresholds are recomputed
pub const DEFAULT_MIN_SAMPLES: usize = 8;

/// Minimum distance between `short_blink_max` and `long_blink_min` (seconds)
pub const MIN_SEPARATION: f64 = 0.25;

/// Calibration tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Samples needed before recomputing
    pub min_samples: usize,
    /// Shortest admissible sample (seconds)
    pub min_sample_duration: f64,
    /// Longest admissible sample (seconds)
    pub max_sample_duration: f64,
    /// Outlier rejection only runs with at least this many samples
    pub outlier_min_samples: usize,
    /// Samples further than this many standard deviations from the mean are dropped
    pub outlier_sigma: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_SAMPLES,
            min_sample_duration: 0.04,
            max_sample_duration: 2.5,
            outlier_min_samples: 5,
            outlier_sigma: 2.0,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), BlinkMorseError> {
        if self.min_samples == 0 {
            return Err(BlinkMorseError::InvalidConfig(
                "min_samples must be at least 1".to_string(),
            ));
        }
        if !(self.min_sample_duration >= 0.0
            && self.min_sample_duration <= self.max_sample_duration)
        {
            return Err(BlinkMorseError::InvalidConfig(format!(
                "sample range [{}, {}] is empty",
                self.min_sample_duration, self.max_sample_duration
            )));
        }
        if !(self.outlier_sigma > 0.0) {
            return Err(BlinkMorseError::InvalidConfig(format!(
                "outlier_sigma must be positive, got {}",
                self.outlier_sigma
            )));
        }
        Ok(())
    }
}

/// One admissible blink duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub duration: f64,
}

/// Sample accumulator and threshold derivation.
///
/// Pure: it never touches storage. See [`CalibrationManager`] for the
/// persisting wrapper.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    thresholds: Thresholds,
    samples: Vec<CalibrationSample>,
    config: CalibrationConfig,
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::new(CalibrationConfig::default(), Thresholds::default())
    }
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig, thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            samples: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Currently committed thresholds
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Whether enough samples exist to recompute
    pub fn is_ready(&self) -> bool {
        self.samples.len() >= self.config.min_samples
    }

    /// Samples still needed before the first recomputation
    pub fn remaining(&self) -> usize {
        self.config.min_samples.saturating_sub(self.samples.len())
    }

    /// Append a sample if it is admissible. Returns whether it was kept.
    pub fn add_sample(&mut self, duration: f64) -> bool {
        let admissible = duration.is_finite()
            && duration >= self.config.min_sample_duration
            && duration <= self.config.max_sample_duration;
        if admissible {
            self.samples.push(CalibrationSample { duration });
        } else {
            log::debug!("calibration sample {duration:.3}s rejected");
        }
        admissible
    }

    /// Add a sample and recompute once enough samples exist
    pub fn record(&mut self, duration: f64) -> Thresholds {
        self.add_sample(duration);
        if self.is_ready() {
            self.recompute()
        } else {
            self.thresholds
        }
    }

    /// Derive thresholds from the accumulated samples.
    ///
    /// With no samples the current thresholds are returned unchanged.
    pub fn recompute(&mut self) -> Thresholds {
        let durations: Vec<f64> = self.samples.iter().map(|s| s.duration).collect();
        if durations.is_empty() {
            return self.thresholds;
        }

        let filtered = self.reject_outliers(&durations);
        let avg = mean(&filtered);
        self.thresholds = derive_thresholds(avg);

        log::info!(
            "calibrated from {} of {} samples (mean {:.3}s): dot < {:.3}s, dash >= {:.3}s",
            filtered.len(),
            durations.len(),
            avg,
            self.thresholds.short_blink_max,
            self.thresholds.long_blink_min,
        );
        self.thresholds
    }

    /// Clear samples, keeping the committed thresholds
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    fn reject_outliers(&self, durations: &[f64]) -> Vec<f64> {
        if durations.len() < self.config.outlier_min_samples {
            return durations.to_vec();
        }
        let avg = mean(durations);
        let limit = self.config.outlier_sigma * sample_std_dev(durations, avg);
        let kept: Vec<f64> = durations
            .iter()
            .copied()
            .filter(|d| (d - avg).abs() <= limit)
            .collect();
        if kept.is_empty() {
            durations.to_vec()
        } else {
            kept
        }
    }
}

/// Threshold formulas for a mean blink duration
pub fn derive_thresholds(avg: f64) -> Thresholds {
    let short_blink_max = (avg * 0.65).max(0.08);
    let mut long_blink_min = (avg * 1.35).max(short_blink_max + MIN_SEPARATION);
    if long_blink_min - short_blink_max < MIN_SEPARATION {
        long_blink_min = short_blink_max + MIN_SEPARATION;
    }

    let symbol_gap = (avg * 1.5).max(0.4);
    let letter_gap = symbol_gap * 2.5;
    let word_gap = letter_gap * 2.0;

    Thresholds {
        short_blink_max,
        long_blink_min,
        symbol_gap,
        letter_gap,
        word_gap,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample (n - 1) standard deviation
fn sample_std_dev(values: &[f64], avg: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - avg) * (v - avg)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Calibration engine bound to a threshold store.
///
/// Loads thresholds once on construction and saves them after every
/// recomputation. Storage failures are logged and never interrupt
/// calibration.
pub struct CalibrationManager {
    engine: CalibrationEngine,
    store: Box<dyn ThresholdStore>,
}

impl CalibrationManager {
    pub fn new(config: CalibrationConfig, store: Box<dyn ThresholdStore>) -> Self {
        let thresholds = store.load();
        Self {
            engine: CalibrationEngine::new(config, thresholds),
            store,
        }
    }

    pub fn engine(&self) -> &CalibrationEngine {
        &self.engine
    }

    pub fn thresholds(&self) -> Thresholds {
        self.engine.thresholds()
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    pub fn remaining(&self) -> usize {
        self.engine.remaining()
    }

    /// Record a blink duration; recompute and persist once enough samples exist
    pub fn record(&mut self, duration: f64) -> Thresholds {
        self.engine.add_sample(duration);
        if !self.engine.is_ready() {
            return self.engine.thresholds();
        }
        let thresholds = self.engine.recompute();
        if let Err(e) = self.store.save(&thresholds) {
            log::warn!("failed to persist thresholds: {e}");
        }
        thresholds
    }

    /// Clear samples without touching stored thresholds
    pub fn reset(&mut self) {
        self.engine.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const SAMPLES: [f64; 8] = [0.10, 0.12, 0.11, 0.13, 0.30, 0.12, 0.11, 0.14];

    #[test]
    fn test_outlier_is_excluded() {
        let mut engine = CalibrationEngine::default();
        for d in SAMPLES {
            engine.record(d);
        }
        assert!(engine.is_ready());

        let without_outlier = [0.10, 0.12, 0.11, 0.13, 0.12, 0.11, 0.14];
        let expected = derive_thresholds(mean(&without_outlier));
        let t = engine.thresholds();
        assert!((t.short_blink_max - expected.short_blink_max).abs() < 1e-12);
        assert!((t.long_blink_min - expected.long_blink_min).abs() < 1e-12);
        assert!((t.symbol_gap - expected.symbol_gap).abs() < 1e-12);

        // mean of the seven is ~0.1186
        assert_eq!(t.short_blink_max, 0.08);
        assert!((t.long_blink_min - 0.33).abs() < 1e-12);
        assert!((t.symbol_gap - 0.4).abs() < 1e-12);
        assert!((t.letter_gap - 1.0).abs() < 1e-12);
        assert!((t.word_gap - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_not_ready_returns_current_thresholds() {
        let mut engine = CalibrationEngine::default();
        for d in &SAMPLES[..7] {
            let t = engine.record(*d);
            assert_eq!(t, Thresholds::default());
        }
        assert_eq!(engine.remaining(), 1);
    }

    #[test]
    fn test_inadmissible_samples_are_rejected() {
        let mut engine = CalibrationEngine::default();
        assert!(!engine.add_sample(0.01));
        assert!(!engine.add_sample(3.0));
        assert!(!engine.add_sample(f64::NAN));
        assert!(engine.add_sample(0.04));
        assert!(engine.add_sample(2.5));
        assert_eq!(engine.sample_count(), 2);
    }

    #[test]
    fn test_all_equal_samples_stay_separated() {
        for d in [0.04, 0.1, 0.5, 1.0, 2.5] {
            let mut engine = CalibrationEngine::default();
            for _ in 0..8 {
                engine.record(d);
            }
            let t = engine.thresholds();
            assert!(t.is_valid(), "invalid thresholds for {d}: {t:?}");
            assert!(t.long_blink_min - t.short_blink_max >= MIN_SEPARATION - 1e-12);
        }
    }

    #[test]
    fn test_separation_holds_across_distributions() {
        let mut avg = 0.0;
        while avg < 5.0 {
            let t = derive_thresholds(avg);
            assert!(t.short_blink_max < t.long_blink_min);
            assert!(t.long_blink_min - t.short_blink_max >= MIN_SEPARATION - 1e-12);
            assert!(t.symbol_gap >= 0.4);
            assert!(t.word_gap > t.letter_gap && t.letter_gap > t.symbol_gap);
            avg += 0.013;
        }
    }

    #[test]
    fn test_spread_distribution_keeps_floor() {
        let mut engine = CalibrationEngine::default();
        for d in [0.04, 2.5, 0.04, 2.5, 0.04, 2.5, 0.04, 2.5] {
            engine.record(d);
        }
        let t = engine.thresholds();
        assert!(t.is_valid());
        assert!((t.short_blink_max - 1.27 * 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_small_set_skips_outlier_filter() {
        let mut engine = CalibrationEngine::new(
            CalibrationConfig {
                min_samples: 3,
                ..Default::default()
            },
            Thresholds::default(),
        );
        for d in [0.2, 0.2, 2.0] {
            engine.record(d);
        }
        let expected = derive_thresholds(0.8);
        assert!((engine.thresholds().long_blink_min - expected.long_blink_min).abs() < 1e-9);
    }

    #[test]
    fn test_recompute_without_samples_is_noop() {
        let custom = Thresholds {
            short_blink_max: 0.2,
            ..Default::default()
        };
        let mut engine = CalibrationEngine::new(CalibrationConfig::default(), custom);
        assert_eq!(engine.recompute(), custom);
    }

    #[test]
    fn test_reset_keeps_thresholds() {
        let mut engine = CalibrationEngine::default();
        for d in SAMPLES {
            engine.record(d);
        }
        let calibrated = engine.thresholds();
        engine.reset();
        assert_eq!(engine.sample_count(), 0);
        assert!(!engine.is_ready());
        assert_eq!(engine.thresholds(), calibrated);
    }

    #[test]
    fn test_restart_restores_thresholds_but_not_samples() {
        let store = MemoryStore::new();
        let mut manager =
            CalibrationManager::new(CalibrationConfig::default(), Box::new(store.clone()));
        for d in SAMPLES {
            manager.record(d);
        }
        let calibrated = manager.thresholds();

        let restarted =
            CalibrationManager::new(CalibrationConfig::default(), Box::new(store.clone()));
        assert_eq!(restarted.thresholds(), calibrated);
        assert_eq!(restarted.engine().sample_count(), 0);
        assert!(!restarted.is_ready());
    }

    #[test]
    fn test_manager_persists_on_recompute() {
        let store = MemoryStore::new();
        let mut manager =
            CalibrationManager::new(CalibrationConfig::default(), Box::new(store.clone()));

        for d in &SAMPLES[..7] {
            manager.record(*d);
        }
        assert!(store.saved().is_none());

        let t = manager.record(SAMPLES[7]);
        assert_eq!(store.saved(), Some(t));
        assert!(manager.is_ready());

        manager.reset();
        assert_eq!(manager.remaining(), 8);
        assert_eq!(store.saved(), Some(t));
    }

    #[test]
    fn test_manager_loads_stored_thresholds() {
        let stored = Thresholds {
            short_blink_max: 0.15,
            long_blink_min: 0.6,
            ..Default::default()
        };
        let store = MemoryStore::with_thresholds(stored);
        let manager = CalibrationManager::new(CalibrationConfig::default(), Box::new(store));
        assert_eq!(manager.thresholds(), stored);
    }
}
