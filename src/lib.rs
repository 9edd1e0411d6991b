//! Blink Morse - On-device blink-to-Morse decoding engine
//!
//! Blink Morse turns per-frame eye-openness measurements into text through a
//! deterministic pipeline: eye aspect ratio → blink detection → adaptive
//! calibration → Morse timing decoder.
//!
//! ## Modules
//!
//! - **Signal**: EAR estimation and blink detection (`ear`, `blink`)
//! - **Calibration**: per-user thresholds and their storage (`calibration`, `storage`)
//! - **Decoding**: Morse lexicon and the timing state machine (`lexicon`, `decoder`)
//! - **Pipeline**: orchestration, recorded traces, and reports (`pipeline`, `schema`, `encoder`)

pub mod blink;
pub mod calibration;
pub mod config;
pub mod decoder;
pub mod ear;
pub mod encoder;
pub mod error;
pub mod lexicon;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use blink::{BlinkConfig, BlinkSignalProcessor};
pub use calibration::{CalibrationEngine, CalibrationManager};
pub use config::PipelineConfig;
pub use decoder::{DecoderConfig, MorseDecoder};
pub use error::BlinkMorseError;
pub use pipeline::{collect_snapshots, decode_ndjson, decode_trace, BlinkMorsePipeline, StepOutcome};
pub use storage::{JsonFileStore, MemoryStore, ThresholdStore};
pub use types::{BlinkEvent, DecoderSnapshot, Symbol, Thresholds};

// Schema exports
pub use schema::{FrameRecord, TraceAdapter, TRACE_SCHEMA_VERSION};

/// Crate version embedded in transcript reports
pub const BLINK_MORSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for transcript reports
pub const PRODUCER_NAME: &str = "blink-morse";
