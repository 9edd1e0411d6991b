//! Pipeline configuration
//!
//! Every section is optional in the JSON form; omitted fields keep their
//! defaults.

use crate::blink::BlinkConfig;
use crate::calibration::CalibrationConfig;
use crate::decoder::DecoderConfig;
use crate::error::BlinkMorseError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub blink: BlinkConfig,
    pub decoder: DecoderConfig,
    pub calibration: CalibrationConfig,
    /// Collect calibration samples before decoding
    pub calibrate_on_start: bool,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), BlinkMorseError> {
        self.blink.validate()?;
        self.decoder.validate()?;
        self.calibration.validate()
    }

    pub fn from_json(json: &str) -> Result<Self, BlinkMorseError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, BlinkMorseError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a config file. Unlike thresholds, a broken config is an error.
    pub fn load(path: &Path) -> Result<Self, BlinkMorseError> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}
