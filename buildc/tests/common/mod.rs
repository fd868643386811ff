//! Scratch projects and a toolchain stand-in for integration tests

#![allow(dead_code)]

use buildc::{BuildMode, BuildOptions, CommandRunner, ProjectConfig};
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use tempfile::TempDir;

/// Modification time given to every fixture file.
pub const SOURCE_TIME: i64 = 1_000_000;

/// Later time used to simulate an edit.
pub const EDIT_TIME: i64 = 2_000_000;

/// Records every invocation instead of spawning a process.
///
/// `cc`, `ar` and `objcopy` create their output file and stamp it with a
/// strictly increasing time, so outputs are always newer than what they were
/// built from. Anything else is treated as a test binary, which fails when
/// its file name contains `fail`.
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    fail_on: Option<String>,
    clock: AtomicI64,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            clock: AtomicI64::new(SOURCE_TIME * 10),
        }
    }

    /// Toolchain invocations mentioning `pattern` exit with status 1.
    pub fn failing(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// File names of the sources compiled with `-c`, in call order.
    pub fn compiled(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|argv| argv.iter().any(|a| a == "-c"))
            .filter_map(|argv| argv.iter().position(|a| a == "-c").map(|i| argv[i + 1].clone()))
            .map(|path| file_name(&path))
            .collect()
    }

    /// Outputs of compiler invocations without `-c`.
    pub fn linked(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|argv| argv[0] == "cc" && !argv.iter().any(|a| a == "-c"))
            .filter_map(|argv| output_of(argv))
            .map(|path| file_name(&path))
            .collect()
    }

    /// Archives written by `ar`.
    pub fn archived(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|argv| argv[0] == "ar")
            .map(|argv| file_name(&argv[2]))
            .collect()
    }

    pub fn count(&self, program: &str) -> usize {
        self.calls().iter().filter(|argv| argv[0] == program).count()
    }

    /// Calls that ran a test binary.
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter(|argv| Path::new(&argv[0]).is_absolute())
            .map(|argv| file_name(&argv[0]))
            .collect()
    }

    fn stamp(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            fs::write(path, "")?;
        }
        let time = self.clock.fetch_add(1, Ordering::SeqCst);
        filetime::set_file_mtime(path, FileTime::from_unix_time(time, 0))
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, argv: &[String], _cwd: &Path) -> io::Result<Option<i32>> {
        self.calls.lock().unwrap().push(argv.to_vec());

        let failing = self
            .fail_on
            .as_ref()
            .is_some_and(|pattern| argv.iter().any(|a| a.contains(pattern.as_str())));

        match argv[0].as_str() {
            "cc" | "ar" | "objcopy" if failing => Ok(Some(1)),
            "cc" => {
                if let Some(output) = output_of(argv) {
                    self.stamp(Path::new(&output))?;
                }
                Ok(Some(0))
            }
            "ar" => {
                self.stamp(Path::new(&argv[2]))?;
                Ok(Some(0))
            }
            "objcopy" => {
                self.stamp(Path::new(&argv[argv.len() - 1]))?;
                Ok(Some(0))
            }
            binary if file_name(binary).contains("fail") => Ok(Some(1)),
            _ => Ok(Some(0)),
        }
    }
}

fn output_of(argv: &[String]) -> Option<String> {
    argv.iter()
        .position(|a| a == "-o")
        .and_then(|i| argv.get(i + 1))
        .cloned()
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sequential options so call order is deterministic.
pub fn options() -> BuildOptions {
    BuildOptions {
        jobs: 1,
        ..BuildOptions::default()
    }
}

/// A directory holding one or more projects.
pub struct Workspace {
    _temp: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        Self { _temp: temp, root }
    }

    /// Create a project named `name` with the given manifest tail and files.
    pub fn project(&self, name: &str, manifest_tail: &str, files: &[(&str, &str)]) -> PathBuf {
        let dir = self.root.join(name);
        fs::create_dir_all(dir.join("src")).unwrap();
        let manifest = format!(
            "[project]\nname = \"{name}\"\ncc = \"cc\"\nar = \"ar\"\nobjcopy = \"objcopy\"\n{manifest_tail}"
        );
        self.write(&format!("{name}/buildc.toml"), &manifest);
        for (path, content) in files {
            self.write(&format!("{name}/{path}"), content);
        }
        dir
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        self.touch(relative, SOURCE_TIME);
    }

    pub fn touch(&self, relative: &str, time: i64) {
        filetime::set_file_mtime(self.root.join(relative), FileTime::from_unix_time(time, 0))
            .unwrap();
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn config(&self, name: &str) -> ProjectConfig {
        ProjectConfig::load(self.root.join(name), BuildMode::Debug).unwrap()
    }
}
