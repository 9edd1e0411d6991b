//! Error types for Blink Morse
//!
//! The decoding core never fails; these errors only surface at the edges
//! (trace parsing, configuration, threshold storage, FFI).

use thiserror::Error;

/// Errors that can occur outside the real-time core
#[derive(Debug, Error)]
pub enum BlinkMorseError {
    #[error("Failed to parse trace: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),
}
