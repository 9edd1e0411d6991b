//! Pipeline orchestration
//!
//! This module provides the public API for Blink Morse. It composes the
//! blink processor, the calibration manager, and the Morse decoder, and runs
//! them in the order a frame loop needs:
//!
//! 1. `process_sample` - smooth the EAR and detect a blink
//! 2. calibration or classification of that blink
//! 3. `tick` - let silence finalize letters and words
//!
//! Symbol registration always happens before gap evaluation within a step.

use crate::blink::BlinkSignalProcessor;
use crate::calibration::CalibrationManager;
use crate::config::PipelineConfig;
use crate::decoder::MorseDecoder;
use crate::encoder::TranscriptEncoder;
use crate::error::BlinkMorseError;
use crate::schema::{FrameRecord, TraceAdapter};
use crate::storage::{MemoryStore, ThresholdStore};
use crate::types::{
    BlinkEvent, Classification, DecoderMode, DecoderSnapshot, FrameMetrics, SnapshotEvent,
    Thresholds, TraceStats, TranscriptReport,
};
use serde::{Deserialize, Serialize};

/// Decode a recorded trace in one call (stateless).
///
/// # Arguments
/// * `records` - Frame records in timestamp order
/// * `config` - Pipeline configuration
/// * `thresholds` - Thresholds to classify with (calibration may replace them)
///
/// # Example
/// ```ignore
/// let records = TraceAdapter::parse_ndjson(&ndjson)?;
/// let report = decode_trace(&records, PipelineConfig::default(), Thresholds::default())?;
/// println!("{}", report.text);
/// ```
pub fn decode_trace(
    records: &[FrameRecord],
    config: PipelineConfig,
    thresholds: Thresholds,
) -> Result<TranscriptReport, BlinkMorseError> {
    let mut pipeline =
        BlinkMorsePipeline::new(config, Box::new(MemoryStore::with_thresholds(thresholds)))?;
    let outcomes = pipeline.run_trace(records)?;
    Ok(TranscriptEncoder::new().encode(&pipeline, collect_snapshots(&outcomes)))
}

/// Decode an NDJSON trace in one call and return the report as JSON
pub fn decode_ndjson(ndjson: &str, thresholds: Thresholds) -> Result<String, BlinkMorseError> {
    let records = TraceAdapter::parse_ndjson(ndjson)?;
    let report = decode_trace(&records, PipelineConfig::default(), thresholds)?;
    TranscriptEncoder::to_json(&report)
}

/// Decoder snapshots produced by a run of steps, oldest first
pub fn collect_snapshots(outcomes: &[StepOutcome]) -> Vec<DecoderSnapshot> {
    outcomes.iter().filter_map(|o| o.snapshot.clone()).collect()
}

/// Everything that happened during one pipeline step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub timestamp: f64,
    pub metrics: FrameMetrics,
    pub blink: Option<BlinkEvent>,
    /// Set when a blink was classified (not while calibrating)
    pub classification: Option<Classification>,
    /// Set when a blink was used as a calibration sample
    pub calibration_remaining: Option<usize>,
    /// Last snapshot produced in this step
    pub snapshot: Option<DecoderSnapshot>,
}

/// Stateful blink-to-text pipeline
pub struct BlinkMorsePipeline {
    processor: BlinkSignalProcessor,
    calibration: CalibrationManager,
    decoder: MorseDecoder,
    calibrating: bool,
    stats: TraceStats,
}

impl BlinkMorsePipeline {
    /// Create a pipeline whose thresholds are loaded from `store`
    pub fn new(
        config: PipelineConfig,
        store: Box<dyn ThresholdStore>,
    ) -> Result<Self, BlinkMorseError> {
        config.validate()?;
        let calibration = CalibrationManager::new(config.calibration, store);
        let thresholds = calibration.thresholds();
        log::debug!("pipeline starting with thresholds {thresholds:?}");

        Ok(Self {
            processor: BlinkSignalProcessor::new(config.blink),
            calibration,
            decoder: MorseDecoder::new(config.decoder, thresholds),
            calibrating: config.calibrate_on_start,
            stats: TraceStats::default(),
        })
    }

    /// Create a pipeline with fixed starting thresholds and no durable storage
    pub fn with_thresholds(
        config: PipelineConfig,
        thresholds: Thresholds,
    ) -> Result<Self, BlinkMorseError> {
        Self::new(config, Box::new(MemoryStore::with_thresholds(thresholds)))
    }

    pub fn thresholds(&self) -> Thresholds {
        self.decoder.thresholds()
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Whether the current thresholds were derived from this session's samples
    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_ready()
    }

    /// Samples still needed while calibrating
    pub fn calibration_remaining(&self) -> usize {
        self.calibration.remaining()
    }

    pub fn mode(&self) -> DecoderMode {
        self.decoder.mode()
    }

    pub fn buffer(&self) -> &str {
        self.decoder.buffer()
    }

    pub fn stats(&self) -> TraceStats {
        self.stats
    }

    /// Discard old samples and collect a fresh calibration set
    pub fn start_calibration(&mut self) {
        self.calibration.reset();
        self.calibrating = true;
        log::info!(
            "calibration started, {} blinks needed",
            self.calibration.remaining()
        );
    }

    /// Smooth one EAR sample and detect a blink
    pub fn process_sample(
        &mut self,
        timestamp: f64,
        raw_ear: Option<f64>,
    ) -> (FrameMetrics, Option<BlinkEvent>) {
        self.processor.process_sample(timestamp, raw_ear)
    }

    /// Classify a blink duration and register the symbol, if any
    pub fn classify_and_register(
        &mut self,
        duration: f64,
        timestamp: f64,
    ) -> (Classification, Option<DecoderSnapshot>) {
        let (classification, snapshot) = self.decoder.classify_and_register(duration, timestamp);
        match classification {
            Classification::Dot => self.stats.dots += 1,
            Classification::Dash => self.stats.dashes += 1,
            Classification::Ignored => self.stats.ignored += 1,
        }
        if let Some(snapshot) = &snapshot {
            self.count_snapshot(snapshot);
        }
        (classification, snapshot)
    }

    /// Let silence finalize letters and words
    pub fn tick(&mut self, timestamp: f64) -> Option<DecoderSnapshot> {
        let snapshot = self.decoder.tick(timestamp)?;
        self.count_snapshot(&snapshot);
        Some(snapshot)
    }

    /// Run one full frame cycle
    pub fn step(&mut self, timestamp: f64, raw_ear: Option<f64>) -> StepOutcome {
        let (metrics, blink) = self.process_sample(timestamp, raw_ear);

        self.stats.frames += 1;
        if !metrics.face_detected {
            self.stats.frames_without_face += 1;
        }

        let mut outcome = StepOutcome {
            timestamp,
            metrics,
            blink,
            classification: None,
            calibration_remaining: None,
            snapshot: None,
        };

        if let Some(event) = blink.filter(|e| e.is_blink) {
            self.stats.blinks += 1;
            if self.calibrating {
                outcome.calibration_remaining = Some(self.record_calibration(event.duration));
            } else {
                let (classification, snapshot) =
                    self.classify_and_register(event.duration, timestamp);
                outcome.classification = Some(classification);
                outcome.snapshot = snapshot;
            }
        }

        if !self.calibrating {
            if let Some(snapshot) = self.tick(timestamp) {
                outcome.snapshot = Some(snapshot);
            }
        }

        outcome
    }

    /// Feed a whole trace through `step`
    pub fn run_trace(
        &mut self,
        records: &[FrameRecord],
    ) -> Result<Vec<StepOutcome>, BlinkMorseError> {
        TraceAdapter::check_monotonic(records)?;
        Ok(records
            .iter()
            .map(|record| self.step(record.timestamp, record.raw_ear()))
            .collect())
    }

    /// Committed text, trimmed
    pub fn get_translation(&self) -> String {
        self.decoder.get_translation()
    }

    /// Live lookup of the symbols being entered
    pub fn get_buffer_preview(&self) -> String {
        self.decoder.get_buffer_preview()
    }

    /// Clear the decoded text. Calibration and the blink processor are kept.
    pub fn reset(&mut self) {
        self.decoder.reset();
        log::info!("translation cleared");
    }

    fn record_calibration(&mut self, duration: f64) -> usize {
        let thresholds = self.calibration.record(duration);
        self.decoder.update_thresholds(thresholds);
        if self.calibration.is_ready() {
            self.calibrating = false;
            log::info!(
                "calibration complete: dot < {:.2}s, dash >= {:.2}s",
                thresholds.short_blink_max,
                thresholds.long_blink_min
            );
        }
        self.calibration.remaining()
    }

    fn count_snapshot(&mut self, snapshot: &DecoderSnapshot) {
        match snapshot.event {
            SnapshotEvent::LetterFinalized => self.stats.letters += 1,
            SnapshotEvent::WordGap => self.stats.word_gaps += 1,
            SnapshotEvent::Symbol => {}
        }
    }
}
