//! Transcript encoding
//!
//! This module turns a pipeline's final state into a `TranscriptReport`
//! stamped with producer metadata.

use crate::error::BlinkMorseError;
use crate::pipeline::BlinkMorsePipeline;
use crate::types::{DecoderSnapshot, ReportProducer, TranscriptReport};
use crate::{BLINK_MORSE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Report encoder with a stable instance ID
pub struct TranscriptEncoder {
    instance_id: String,
}

impl Default for TranscriptEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build a report from the pipeline's current state and the snapshots
    /// the caller collected while driving it
    pub fn encode(
        &self,
        pipeline: &BlinkMorsePipeline,
        snapshots: Vec<DecoderSnapshot>,
    ) -> TranscriptReport {
        TranscriptReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: BLINK_MORSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            text: pipeline.get_translation(),
            pending_buffer: pipeline.buffer().to_string(),
            thresholds: pipeline.thresholds(),
            calibrated: pipeline.is_calibrated(),
            stats: pipeline.stats(),
            snapshots,
        }
    }

    /// Pretty-printed report JSON
    pub fn to_json(report: &TranscriptReport) -> Result<String, BlinkMorseError> {
        serde_json::to_string_pretty(report).map_err(BlinkMorseError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::types::{Symbol, Thresholds};

    #[test]
    fn test_encode_producer_metadata() {
        let pipeline =
            BlinkMorsePipeline::with_thresholds(PipelineConfig::default(), Thresholds::default())
                .unwrap();
        let encoder = TranscriptEncoder::with_instance_id("test-instance".to_string());
        let report = encoder.encode(&pipeline, Vec::new());

        assert_eq!(report.producer.name, "blink-morse");
        assert_eq!(report.producer.instance_id, "test-instance");
        assert_eq!(report.producer.version, BLINK_MORSE_VERSION);
        assert!(chrono::DateTime::parse_from_rfc3339(&report.computed_at_utc).is_ok());
        assert_eq!(report.text, "");
    }

    #[test]
    fn test_pending_buffer_is_reported() {
        let mut pipeline =
            BlinkMorsePipeline::with_thresholds(PipelineConfig::default(), Thresholds::default())
                .unwrap();
        let snapshots: Vec<_> = [(0.1, 0.0), (0.9, 0.5)]
            .iter()
            .filter_map(|&(d, t)| pipeline.classify_and_register(d, t).1)
            .collect();
        let report = TranscriptEncoder::new().encode(&pipeline, snapshots);
        let expected = format!("{}{}", Symbol::Dot.as_char(), Symbol::Dash.as_char());
        assert_eq!(report.pending_buffer, expected);
        assert_eq!(report.snapshots.len(), 2);
        assert_eq!(report.stats.dots, 1);

        let json = TranscriptEncoder::to_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["pending_buffer"], ".-");
        assert_eq!(value["thresholds"]["short_blink_max"], 0.3);
    }

    #[test]
    fn test_unique_instance_ids() {
        assert_ne!(
            TranscriptEncoder::new().instance_id(),
            TranscriptEncoder::new().instance_id()
        );
    }
}
