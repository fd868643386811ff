//! Filesystem helpers shared by the build steps

use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{BuildError, Result};

/// Modification time in seconds since the epoch, with sub-second precision.
///
/// # Errors
///
/// Fails if the file metadata cannot be read.
pub fn modified_time(path: &Path) -> Result<f64> {
    let metadata = fs::metadata(path).map_err(|e| BuildError::io(path, e))?;
    Ok(to_seconds(FileTime::from_last_modification_time(&metadata)))
}

/// Like [`modified_time`], `None` for a missing file.
///
/// # Errors
///
/// Fails on any error other than the file not existing.
pub fn modified_time_if_exists(path: &Path) -> Result<Option<f64>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(to_seconds(FileTime::from_last_modification_time(
            &metadata,
        )))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BuildError::io(path, e)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_seconds(time: FileTime) -> f64 {
    time.unix_seconds() as f64 + f64::from(time.nanoseconds()) * 1e-9
}

/// All files below `root` with one of the given extensions, sorted.
///
/// A missing `root` yields no files.
///
/// # Errors
///
/// Fails if a directory below `root` cannot be read.
pub fn collect_files(root: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    collect_matching(root, |path| {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext))
    })
}

/// Test sources below `root`: files named `*-test.c`, sorted.
///
/// # Errors
///
/// Fails if a directory below `root` cannot be read.
pub fn collect_test_sources(root: &Path) -> Result<Vec<PathBuf>> {
    collect_matching(root, |path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("-test.c"))
    })
}

fn collect_matching(root: &Path, matches: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BuildError::io(path, e.into())
        })?;
        if entry.file_type().is_file() && matches(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Create the parent directory of `path`.
///
/// # Errors
///
/// Fails if the directory cannot be created.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    Ok(())
}

/// Write `data` to `path` through a temporary file and a rename.
///
/// # Errors
///
/// Fails if the temporary file cannot be written or renamed.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    ensure_parent(path)?;

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| BuildError::io(&temp_path, e))?;

    file.write_all(data)
        .map_err(|e| BuildError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| BuildError::io(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| BuildError::io(path, e))?;

    // Best effort, not every filesystem supports syncing directories
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/work/app/../util/./src")),
            PathBuf::from("/work/util/src")
        );
        assert_eq!(normalize(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_collect_files_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("net")).unwrap();
        fs::write(src.join("main.c"), "").unwrap();
        fs::write(src.join("net/socket.c"), "").unwrap();
        fs::write(src.join("net/socket.h"), "").unwrap();
        fs::write(src.join("README"), "").unwrap();

        let sources = collect_files(&src, &["c"]).unwrap();
        assert_eq!(sources, vec![src.join("main.c"), src.join("net/socket.c")]);

        let all = collect_files(&src, &["c", "h"]).unwrap();
        assert_eq!(all.len(), 3);

        assert!(collect_files(&temp.path().join("missing"), &["c"]).unwrap().is_empty());
    }

    #[test]
    fn test_collect_test_sources() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("parse-test.c"), "").unwrap();
        fs::write(temp.path().join("helpers.c"), "").unwrap();

        let tests = collect_test_sources(temp.path()).unwrap();
        assert_eq!(tests, vec![temp.path().join("parse-test.c")]);
    }

    #[test]
    fn test_modified_time_matches_filetime() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.c");
        fs::write(&file, "int a;").unwrap();
        filetime::set_file_mtime(&file, FileTime::from_unix_time(1_000_000, 500_000_000)).unwrap();

        let mtime = modified_time(&file).unwrap();
        assert!((mtime - 1_000_000.5).abs() < 1e-6);
        assert_eq!(modified_time_if_exists(&temp.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn test_atomic_write_creates_parents() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("deep/nested/cache");
        atomic_write(&target, b"data").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"data");
        assert!(!target.with_extension("tmp").exists());
    }
}
