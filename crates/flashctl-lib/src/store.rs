//! Saved intensity preference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::write_atomic;
use crate::intensity::Intensity;

/// Persisted last-chosen intensity.
///
/// `set` is fire-and-forget: failures are logged, not returned. A value set
/// is visible to the next `get` on the same store.
pub trait IntensityStore {
    /// Saved level, or [`Intensity::DEFAULT`] if absent or corrupt.
    fn get(&self) -> Intensity;
    fn set(&mut self, level: Intensity);
}

/// On-disk layout of the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SavedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flash_intensity: Option<i64>,
}

/// TOML state file holding `flash_intensity = N`.
pub struct FileIntensityStore {
    path: PathBuf,
}

impl FileIntensityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileIntensityStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<Intensity> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("could not read {}: {e}", self.path.display());
                return None;
            }
        };
        let state: SavedState = match toml::from_str(&contents) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("corrupt state file {}: {e}", self.path.display());
                return None;
            }
        };
        let raw = state.flash_intensity?;
        let level = Intensity::new(raw);
        if level.is_none() {
            log::warn!(
                "saved intensity {raw} in {} is out of range, using default",
                self.path.display()
            );
        }
        level
    }
}

impl IntensityStore for FileIntensityStore {
    fn get(&self) -> Intensity {
        self.read().unwrap_or_default()
    }

    fn set(&mut self, level: Intensity) {
        let state = SavedState {
            flash_intensity: Some(i64::from(level.get())),
        };
        let result = toml::to_string(&state)
            .map_err(std::io::Error::other)
            .and_then(|text| write_atomic(&self.path, &text));
        if let Err(e) = result {
            log::warn!(
                "could not save intensity {level} to {}: {e}",
                self.path.display()
            );
        }
    }
}

/// Volatile store that records every write.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    value: Option<Intensity>,
    /// Every level written, in order.
    pub writes: Vec<Intensity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `level`, with no recorded writes.
    pub fn with(level: Intensity) -> Self {
        MemoryStore {
            value: Some(level),
            writes: Vec::new(),
        }
    }
}

impl IntensityStore for MemoryStore {
    fn get(&self) -> Intensity {
        self.value.unwrap_or_default()
    }

    fn set(&mut self, level: Intensity) {
        self.value = Some(level);
        self.writes.push(level);
    }
}
