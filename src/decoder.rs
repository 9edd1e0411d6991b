//! Morse timing decoder
//!
//! A four-mode state machine that buffers dots and dashes into a letter and
//! uses silence to decide when the letter, and then the word, is finished:
//!
//! ```text
//! Idle ──symbol──▶ BuildingSymbol ──symbol_confirmation_time──▶ ConfirmingLetter
//!                      ▲  ▲                                          │
//!                      │  └──────────────symbol─────────────────────┤ letter_confirmation_time
//!                      │                                             ▼ (letter committed)
//!                      └──────────────symbol──────────────── ConfirmingWord
//!                                                                    │ word_confirmation_time
//!                                                                    ▼ (space committed)
//!                                                                   Idle
//! ```
//!
//! Every boundary decision is final once made.

use crate::error::BlinkMorseError;
use crate::lexicon::{self, Decoded, PLACEHOLDER};
use crate::types::{
    Classification, DecoderMode, DecoderSnapshot, SnapshotEvent, Symbol, Thresholds,
};
use serde::{Deserialize, Serialize};

/// Silence windows for letter and word segmentation (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Silence after the last symbol before the letter is considered complete
    pub symbol_confirmation_time: f64,
    /// Further silence before the letter is committed
    pub letter_confirmation_time: f64,
    /// Silence after a committed letter before a space is inserted
    pub word_confirmation_time: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            symbol_confirmation_time: 1.5,
            letter_confirmation_time: 1.0,
            word_confirmation_time: 2.0,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<(), BlinkMorseError> {
        let windows = [
            ("symbol_confirmation_time", self.symbol_confirmation_time),
            ("letter_confirmation_time", self.letter_confirmation_time),
            ("word_confirmation_time", self.word_confirmation_time),
        ];
        for (name, value) in windows {
            if !(value.is_finite() && value >= 0.0) {
                return Err(BlinkMorseError::InvalidConfig(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Internal mode, carrying only the clocks each mode needs
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    BuildingSymbol { last_symbol: f64 },
    ConfirmingLetter { since: f64 },
    ConfirmingWord { since: f64 },
}

impl Phase {
    fn mode(&self) -> DecoderMode {
        match self {
            Phase::Idle => DecoderMode::Idle,
            Phase::BuildingSymbol { .. } => DecoderMode::BuildingSymbol,
            Phase::ConfirmingLetter { .. } => DecoderMode::ConfirmingLetter,
            Phase::ConfirmingWord { .. } => DecoderMode::ConfirmingWord,
        }
    }
}

/// Morse decoder state machine
#[derive(Debug, Clone)]
pub struct MorseDecoder {
    config: DecoderConfig,
    thresholds: Thresholds,
    current_letter: String,
    output_text: String,
    phase: Phase,
}

impl Default for MorseDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default(), Thresholds::default())
    }
}

impl MorseDecoder {
    pub fn new(config: DecoderConfig, thresholds: Thresholds) -> Self {
        Self {
            config,
            thresholds,
            current_letter: String::new(),
            output_text: String::new(),
            phase: Phase::Idle,
        }
    }

    /// Replace the classification snapshot wholesale
    pub fn update_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn mode(&self) -> DecoderMode {
        self.phase.mode()
    }

    /// In-progress symbols, e.g. `".-"`
    pub fn buffer(&self) -> &str {
        &self.current_letter
    }

    /// Committed output, untrimmed
    pub fn output(&self) -> &str {
        &self.output_text
    }

    /// Append a symbol and restart the letter clock
    pub fn register_symbol(&mut self, symbol: Symbol, timestamp: f64) -> DecoderSnapshot {
        self.current_letter.push(symbol.as_char());
        self.phase = Phase::BuildingSymbol {
            last_symbol: timestamp,
        };
        log::debug!(
            "symbol '{}' at {timestamp:.3}, buffer {}",
            symbol.as_char(),
            self.current_letter
        );
        self.snapshot(SnapshotEvent::Symbol)
    }

    /// Classify a blink duration against the current thresholds and register
    /// the resulting symbol. Dead-zone durations change nothing.
    pub fn classify_and_register(
        &mut self,
        duration: f64,
        timestamp: f64,
    ) -> (Classification, Option<DecoderSnapshot>) {
        let classification = self.thresholds.classify(duration);
        let snapshot = classification
            .symbol()
            .map(|symbol| self.register_symbol(symbol, timestamp));
        if snapshot.is_none() {
            log::debug!("ignored {duration:.3}s blink between thresholds");
        }
        (classification, snapshot)
    }

    /// Advance the silence clocks. Returns a snapshot when a letter or word
    /// boundary was committed.
    pub fn tick(&mut self, timestamp: f64) -> Option<DecoderSnapshot> {
        match self.phase {
            Phase::Idle => None,
            Phase::BuildingSymbol { last_symbol } => {
                if timestamp - last_symbol >= self.config.symbol_confirmation_time {
                    self.phase = Phase::ConfirmingLetter { since: timestamp };
                }
                None
            }
            Phase::ConfirmingLetter { since } => {
                if timestamp - since < self.config.letter_confirmation_time {
                    return None;
                }
                self.finalize_letter();
                self.phase = Phase::ConfirmingWord { since: timestamp };
                Some(self.snapshot(SnapshotEvent::LetterFinalized))
            }
            Phase::ConfirmingWord { since } => {
                if timestamp - since < self.config.word_confirmation_time {
                    return None;
                }
                if !self.output_text.is_empty() && !self.output_text.ends_with(' ') {
                    self.output_text.push(' ');
                }
                self.phase = Phase::Idle;
                log::debug!("word gap at {timestamp:.3}");
                Some(self.snapshot(SnapshotEvent::WordGap))
            }
        }
    }

    /// Output with surrounding whitespace removed
    pub fn get_translation(&self) -> String {
        self.output_text.trim().to_string()
    }

    /// Live lookup of the in-progress buffer, without committing it
    pub fn get_buffer_preview(&self) -> String {
        if self.current_letter.is_empty() {
            return String::new();
        }
        lexicon::lookup(&self.current_letter)
            .unwrap_or(PLACEHOLDER)
            .to_string()
    }

    /// Drop all buffered and committed text
    pub fn reset(&mut self) {
        self.current_letter.clear();
        self.output_text.clear();
        self.phase = Phase::Idle;
    }

    fn finalize_letter(&mut self) {
        if self.current_letter.is_empty() {
            return;
        }
        match lexicon::decode(&self.current_letter) {
            Decoded::Phrase(phrase) => {
                self.output_text.push_str(phrase);
                self.output_text.push(' ');
            }
            Decoded::Char(c) => self.output_text.push(c),
            Decoded::Unknown => self.output_text.push(PLACEHOLDER),
        }
        log::debug!(
            "letter {} committed, output {:?}",
            self.current_letter,
            self.output_text
        );
        self.current_letter.clear();
    }

    fn snapshot(&self, event: SnapshotEvent) -> DecoderSnapshot {
        DecoderSnapshot {
            event,
            buffer: self.current_letter.clone(),
            output: self.get_translation(),
            mode: self.mode(),
        }
    }
}
