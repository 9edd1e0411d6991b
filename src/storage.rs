//! Threshold persistence
//!
//! Thresholds are the only durable state. Loading never fails: a missing,
//! unreadable or inconsistent record falls back to the compiled-in defaults.

use crate::error::BlinkMorseError;
use crate::types::Thresholds;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Durable home for calibrated thresholds
pub trait ThresholdStore {
    /// Stored thresholds, or defaults if none are available
    fn load(&self) -> Thresholds;

    /// Replace the stored thresholds
    fn save(&self, thresholds: &Thresholds) -> Result<(), BlinkMorseError>;
}

/// Pretty-printed JSON file with the five threshold fields
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file, surfacing the failure reason
    pub fn try_load(&self) -> Result<Option<Thresholds>, BlinkMorseError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(Some(Thresholds::from_json(&data)?))
    }
}

impl ThresholdStore for JsonFileStore {
    fn load(&self) -> Thresholds {
        match self.try_load() {
            Ok(Some(thresholds)) if thresholds.is_valid() => {
                log::info!("loaded thresholds from {}", self.path.display());
                thresholds
            }
            Ok(Some(thresholds)) => {
                log::warn!(
                    "invalid thresholds at {} ({thresholds:?}), using defaults",
                    self.path.display()
                );
                Thresholds::default()
            }
            Ok(None) => {
                log::debug!("no thresholds at {}, using defaults", self.path.display());
                Thresholds::default()
            }
            Err(e) => {
                log::warn!(
                    "unreadable thresholds at {} ({e}), using defaults",
                    self.path.display()
                );
                Thresholds::default()
            }
        }
    }

    fn save(&self, thresholds: &Thresholds) -> Result<(), BlinkMorseError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, thresholds.to_json()?)?;
        log::info!("saved thresholds to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Thresholds>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(thresholds))),
        }
    }

    /// Last saved (or seeded) thresholds
    pub fn saved(&self) -> Option<Thresholds> {
        self.slot.lock().map(|slot| *slot).unwrap_or(None)
    }
}

impl ThresholdStore for MemoryStore {
    fn load(&self) -> Thresholds {
        self.saved().unwrap_or_default()
    }

    fn save(&self, thresholds: &Thresholds) -> Result<(), BlinkMorseError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| BlinkMorseError::InvalidConfig(format!("store poisoned: {e}")))?;
        *slot = Some(*thresholds);
        Ok(())
    }
}
