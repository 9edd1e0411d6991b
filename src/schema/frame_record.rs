//! Frame record schema
//!
//! One record per processed camera frame. A record carries either a
//! precomputed EAR, the twelve eye landmarks it can be computed from, or
//! neither when no face was found.

use crate::ear::average_ear;
use crate::types::{EyeLandmarks, Point};
use serde::{Deserialize, Serialize};

/// Schema identifier for recorded traces
pub const TRACE_SCHEMA_VERSION: &str = "blink.frame.v1";

/// Six `[x, y]` pairs per eye, `p1..p6` order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceLandmarks {
    pub left: [[f64; 2]; 6],
    pub right: [[f64; 2]; 6],
}

impl TraceLandmarks {
    pub fn to_eye_landmarks(&self) -> EyeLandmarks {
        EyeLandmarks {
            left: self.left.map(Point::from),
            right: self.right.map(Point::from),
        }
    }
}

/// A single frame of a recorded session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Monotonic timestamp (seconds)
    pub timestamp: f64,
    /// Precomputed eye aspect ratio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ear: Option<f64>,
    /// Raw eye landmarks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<TraceLandmarks>,
}

impl FrameRecord {
    pub fn with_ear(timestamp: f64, ear: f64) -> Self {
        Self {
            timestamp,
            ear: Some(ear),
            landmarks: None,
        }
    }

    pub fn no_face(timestamp: f64) -> Self {
        Self {
            timestamp,
            ear: None,
            landmarks: None,
        }
    }

    pub fn with_landmarks(timestamp: f64, landmarks: TraceLandmarks) -> Self {
        Self {
            timestamp,
            ear: None,
            landmarks: Some(landmarks),
        }
    }

    /// Raw EAR for this frame, `None` when no face was found
    pub fn raw_ear(&self) -> Option<f64> {
        match (self.ear, &self.landmarks) {
            (Some(ear), _) => Some(ear),
            (None, Some(landmarks)) => Some(average_ear(&landmarks.to_eye_landmarks())),
            (None, None) => None,
        }
    }

    /// Validate the record shape
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.timestamp.is_finite() {
            return Err(ValidationError::NonFiniteTimestamp);
        }
        if self.timestamp < 0.0 {
            return Err(ValidationError::NegativeTimestamp(self.timestamp));
        }
        if self.ear.is_some() && self.landmarks.is_some() {
            return Err(ValidationError::ConflictingMeasurements(self.timestamp));
        }
        if let Some(ear) = self.ear {
            if !ear.is_finite() || ear < 0.0 {
                return Err(ValidationError::InvalidEar {
                    timestamp: self.timestamp,
                    ear,
                });
            }
        }
        Ok(())
    }
}

/// Validation errors for frame records
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Timestamp is not a finite number")]
    NonFiniteTimestamp,

    #[error("Negative timestamp: {0}")]
    NegativeTimestamp(f64),

    #[error("Frame at {0} carries both ear and landmarks")]
    ConflictingMeasurements(f64),

    #[error("Frame at {timestamp} has invalid ear {ear}")]
    InvalidEar { timestamp: f64, ear: f64 },
}
