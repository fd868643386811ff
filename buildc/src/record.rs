//! Persistent staleness record
//!
//! Maps every tracked file (sources, headers and the project file) to the
//! modification time it had after the last fully successful build. Stored as
//! zstd-compressed JSON in `<build>/cache`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{BuildError, Result};
use crate::fs::{atomic_write, modified_time};

const COMPRESSION_LEVEL: i32 = 3;

/// Path to modification-time map from the previous successful build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StalenessRecord {
    entries: BTreeMap<PathBuf, f64>,
}

impl StalenessRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the record at `path`.
    ///
    /// A missing file yields an empty record, so does an unreadable or corrupt
    /// one (with a warning); either way the next build is a full build.
    pub fn load(path: &Path) -> Self {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No staleness record at {}", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("Ignoring unreadable staleness record {}: {}", path.display(), e);
                return Self::new();
            }
        };

        match Self::decode(&data) {
            Ok(record) => {
                debug!("Loaded {} record entries from {}", record.len(), path.display());
                record
            }
            Err(message) => {
                warn!("Ignoring corrupt staleness record {}: {}", path.display(), message);
                Self::new()
            }
        }
    }

    fn decode(data: &[u8]) -> std::result::Result<Self, String> {
        let json = zstd::decode_all(data).map_err(|e| e.to_string())?;
        serde_json::from_slice(&json).map_err(|e| e.to_string())
    }

    /// Current modification times of `tracked_files` and `config_file`.
    ///
    /// # Errors
    ///
    /// Fails if any of the files cannot be stat'ed.
    pub fn snapshot(tracked_files: &[PathBuf], config_file: &Path) -> Result<Self> {
        let mut record = Self::new();
        for path in tracked_files.iter().map(PathBuf::as_path).chain([config_file]) {
            record.insert(path, modified_time(path)?);
        }
        Ok(record)
    }

    /// Write the record to `destination`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be encoded or written.
    pub fn save(&self, destination: &Path) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        let compressed =
            zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL).map_err(|e| BuildError::Cache {
                path: destination.to_path_buf(),
                message: format!("compression failed: {e}"),
            })?;
        atomic_write(destination, &compressed)?;
        debug!("Saved {} record entries to {}", self.len(), destination.display());
        Ok(())
    }

    /// Snapshot the current state and save it.
    ///
    /// # Errors
    ///
    /// See [`StalenessRecord::snapshot`] and [`StalenessRecord::save`].
    pub fn save_current(
        tracked_files: &[PathBuf],
        config_file: &Path,
        destination: &Path,
    ) -> Result<()> {
        Self::snapshot(tracked_files, config_file)?.save(destination)
    }

    /// Recorded modification time, `0.0` for unknown files.
    pub fn get(&self, path: &Path) -> f64 {
        self.entries.get(path).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, mtime: f64) {
        let _ = self.entries.insert(path.into(), mtime);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, f64)> {
        self.entries.iter().map(|(path, mtime)| (path.as_path(), *mtime))
    }
}
