//! Quoted `#include` scanning
//!
//! Not a preprocessor: conditional compilation is ignored and only
//! `#include "..."` lines are considered. Angle-bracket includes refer to
//! system headers and are never tracked.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::fs::normalize;

/// Names of the quoted includes in `content`, in order of appearance.
pub fn parse_quoted_includes(content: &str) -> Vec<&str> {
    content.lines().filter_map(quoted_include).collect()
}

fn quoted_include(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?;
    let rest = rest.trim_start().strip_prefix("include")?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    let name = &rest[..end];
    (!name.is_empty()).then_some(name)
}

/// Resolve an include name seen in `including_file`.
///
/// The including file's directory is searched first, then `include_dirs` in
/// order. The first existing file wins.
pub fn resolve_include(
    name: &str,
    including_file: &Path,
    include_dirs: &[PathBuf],
) -> Option<PathBuf> {
    including_file
        .parent()
        .into_iter()
        .chain(include_dirs.iter().map(PathBuf::as_path))
        .map(|dir| normalize(&dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// One-level include adjacency of the tracked files.
#[derive(Debug, Clone, Default)]
pub struct IncludeGraph {
    edges: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl IncludeGraph {
    /// Scan every file in `files`.
    ///
    /// # Errors
    ///
    /// Fails if a file cannot be read.
    pub fn build(files: &[PathBuf], include_dirs: &[PathBuf]) -> Result<Self> {
        let mut edges = BTreeMap::new();
        for file in files {
            let bytes = fs::read(file).map_err(|e| BuildError::io(file, e))?;
            let content = String::from_utf8_lossy(&bytes);
            let includes: Vec<PathBuf> = parse_quoted_includes(&content)
                .into_iter()
                .filter_map(|name| resolve_include(name, file, include_dirs))
                .collect();
            let _ = edges.insert(file.clone(), includes);
        }
        Ok(Self { edges })
    }

    /// Files `file` includes directly.
    fn includes(&self, file: &Path) -> &[PathBuf] {
        self.edges.get(file).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every file reachable from `file` through includes, excluding `file`
    /// unless it includes itself through a cycle.
    pub fn reachable(&self, file: &Path) -> BTreeSet<PathBuf> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<&Path> = self.includes(file).iter().map(PathBuf::as_path).collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current.to_path_buf()) {
                continue;
            }
            stack.extend(self.includes(current).iter().map(PathBuf::as_path));
        }

        visited
    }
}
