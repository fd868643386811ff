//! Header-aware staleness tracking
//!
//! A translation unit is stale when it changed since the last successful
//! build, when any header it reaches through quoted includes changed, or when
//! the project file changed.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::fs::modified_time;
use crate::include_graph::IncludeGraph;
use crate::record::StalenessRecord;

/// Whether `path` is a translation unit (`.c`).
pub fn is_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "c")
}

/// Decides which sources need recompiling against a [`StalenessRecord`].
#[derive(Debug)]
pub struct StalenessTracker<'a> {
    record: &'a StalenessRecord,
    include_dirs: &'a [PathBuf],
    config_file: &'a Path,
}

impl<'a> StalenessTracker<'a> {
    pub fn new(
        record: &'a StalenessRecord,
        include_dirs: &'a [PathBuf],
        config_file: &'a Path,
    ) -> Self {
        Self {
            record,
            include_dirs,
            config_file,
        }
    }

    /// Stale `.c` files among `tracked_files`.
    ///
    /// `tracked_files` holds sources and headers; only sources are returned.
    ///
    /// # Errors
    ///
    /// Any tracked file (or the project file) that cannot be stat'ed or read
    /// aborts the computation.
    pub fn compute_stale_set(&self, tracked_files: &[PathBuf]) -> Result<BTreeSet<PathBuf>> {
        let config_mtime = modified_time(self.config_file)?;
        let config_changed = !self.record.contains(self.config_file)
            || self.record.get(self.config_file) < config_mtime;

        let mut directly_changed = BTreeSet::new();
        for file in tracked_files {
            if self.record.get(file) < modified_time(file)? {
                let _ = directly_changed.insert(file.clone());
            }
        }

        if config_changed {
            debug!("Project file {} changed, all sources are stale", self.config_file.display());
            return Ok(tracked_files
                .iter()
                .filter(|file| is_source(file))
                .cloned()
                .collect());
        }

        if directly_changed.is_empty() {
            return Ok(BTreeSet::new());
        }

        let graph = IncludeGraph::build(tracked_files, self.include_dirs)?;
        let stale: BTreeSet<PathBuf> = tracked_files
            .iter()
            .filter(|file| is_source(file))
            .filter(|file| {
                directly_changed.contains(*file)
                    || graph
                        .reachable(file)
                        .iter()
                        .any(|header| directly_changed.contains(header))
            })
            .cloned()
            .collect();

        debug!(
            "{} changed files, {} stale sources",
            directly_changed.len(),
            stale.len()
        );
        Ok(stale)
    }
}
