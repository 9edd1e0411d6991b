//! Core types for the Blink Morse pipeline
//!
//! This module defines the value types that flow between the stages of the
//! pipeline: eye samples, blink events, thresholds, Morse symbols, decoder
//! snapshots, and the transcript report.

use serde::{Deserialize, Serialize};

/// A 2-D landmark coordinate (pixels or normalized, the estimator does not care)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

/// Six contour points of one eye: outer corner, two upper-lid points,
/// inner corner, two lower-lid points (`p1..p6`).
pub type EyeContour = [Point; 6];

/// Both eye contours for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub left: EyeContour,
    pub right: EyeContour,
}

/// A validated close→open cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkEvent {
    pub is_blink: bool,
    /// Closed duration (seconds)
    pub duration: f64,
    pub start_time: f64,
    pub end_time: f64,
}

/// Per-sample metrics reported by the blink processor
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameMetrics {
    /// Smoothed EAR (or the last known value when no face was found)
    pub ear: f64,
    pub face_detected: bool,
    pub eye_closed: bool,
}

/// Default short blink ceiling (seconds)
pub const DEFAULT_SHORT_BLINK_MAX: f64 = 0.30;
/// Default long blink floor (seconds)
pub const DEFAULT_LONG_BLINK_MIN: f64 = 0.50;
/// Default symbol gap (seconds)
pub const DEFAULT_SYMBOL_GAP: f64 = 0.5;
/// Default letter gap (seconds)
pub const DEFAULT_LETTER_GAP: f64 = 1.5;
/// Default word gap (seconds)
pub const DEFAULT_WORD_GAP: f64 = 3.0;

/// Calibrated timing parameters for classification and segmentation.
///
/// `Thresholds` is `Copy`: consumers always hold a whole snapshot, and the
/// calibration engine replaces it in one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Blinks shorter than this are dots
    pub short_blink_max: f64,
    /// Blinks at least this long are dashes
    pub long_blink_min: f64,
    pub symbol_gap: f64,
    pub letter_gap: f64,
    pub word_gap: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            short_blink_max: DEFAULT_SHORT_BLINK_MAX,
            long_blink_min: DEFAULT_LONG_BLINK_MIN,
            symbol_gap: DEFAULT_SYMBOL_GAP,
            letter_gap: DEFAULT_LETTER_GAP,
            word_gap: DEFAULT_WORD_GAP,
        }
    }
}

impl Thresholds {
    /// Classify a blink duration against these thresholds.
    ///
    /// Durations in `[short_blink_max, long_blink_min)` fall in the dead zone
    /// and are ignored.
    pub fn classify(&self, duration: f64) -> Classification {
        if duration < self.short_blink_max {
            Classification::Dot
        } else if duration >= self.long_blink_min {
            Classification::Dash
        } else {
            Classification::Ignored
        }
    }

    /// Whether the dot/dash ranges are separated and all gaps are positive
    pub fn is_valid(&self) -> bool {
        let fields = [
            self.short_blink_max,
            self.long_blink_min,
            self.symbol_gap,
            self.letter_gap,
            self.word_gap,
        ];
        fields.iter().all(|v| v.is_finite() && *v > 0.0)
            && self.short_blink_max < self.long_blink_min
    }

    /// Load thresholds from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize thresholds to indented JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A Morse symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Dot,
    Dash,
}

impl Symbol {
    pub fn as_char(&self) -> char {
        match self {
            Symbol::Dot => '.',
            Symbol::Dash => '-',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Symbol::Dot),
            '-' => Some(Symbol::Dash),
            _ => None,
        }
    }
}

/// Outcome of classifying a blink duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Dot,
    Dash,
    /// Between `short_blink_max` and `long_blink_min`
    Ignored,
}

impl Classification {
    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Classification::Dot => Some(Symbol::Dot),
            Classification::Dash => Some(Symbol::Dash),
            Classification::Ignored => None,
        }
    }
}

/// Decoder mode discriminant, as exposed in snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderMode {
    Idle,
    BuildingSymbol,
    ConfirmingLetter,
    ConfirmingWord,
}

impl DecoderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecoderMode::Idle => "idle",
            DecoderMode::BuildingSymbol => "building_symbol",
            DecoderMode::ConfirmingLetter => "confirming_letter",
            DecoderMode::ConfirmingWord => "confirming_word",
        }
    }
}

/// What caused a decoder snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotEvent {
    Symbol,
    LetterFinalized,
    WordGap,
}

/// Decoder state as seen from outside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderSnapshot {
    pub event: SnapshotEvent,
    /// In-progress symbol buffer (dots and dashes)
    pub buffer: String,
    /// Committed output, trimmed
    pub output: String,
    pub mode: DecoderMode,
}

/// Producer metadata for transcript reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Counters accumulated while decoding a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraceStats {
    pub frames: u64,
    pub frames_without_face: u64,
    pub blinks: u64,
    pub dots: u64,
    pub dashes: u64,
    pub ignored: u64,
    pub letters: u64,
    pub word_gaps: u64,
}

/// Result of decoding a whole trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptReport {
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    /// Final translation, trimmed
    pub text: String,
    /// Symbols still buffered when the trace ended
    pub pending_buffer: String,
    pub thresholds: Thresholds,
    pub calibrated: bool,
    pub stats: TraceStats,
    /// Every snapshot emitted along the way, in order
    pub snapshots: Vec<DecoderSnapshot>,
}
