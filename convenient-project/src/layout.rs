//! Directory layout of a buildc project
//!
//! ```text
//! <project>/
//!   buildc.toml
//!   src/            sources, src/main.c is the entry point
//!   tests/          *-test.c files
//!   .build/
//!     compile_commands.json
//!     <mode>/
//!       cache       staleness record
//!       obj/        object files mirroring src/
//!       bin/        final artifact
//!       tests/      test archive, test binaries and their record
//!       deps/       nested dependency builds
//! ```

use std::path::{Path, PathBuf};

use crate::config::{BuildMode, CONFIG_FILE_NAME};

/// Paths derived from a project directory and its build output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    project_dir: PathBuf,
    build_dir: PathBuf,
}

impl ProjectLayout {
    /// Default layout: build outputs go to `<project>/.build/<mode>`.
    pub fn new(project_dir: impl Into<PathBuf>, mode: BuildMode) -> Self {
        let project_dir = project_dir.into();
        let build_dir = project_dir.join(".build").join(mode.as_str());
        Self {
            project_dir,
            build_dir,
        }
    }

    /// Same project, build outputs relocated.
    #[must_use]
    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.project_dir.join(CONFIG_FILE_NAME)
    }

    pub fn source_dir(&self) -> PathBuf {
        self.project_dir.join("src")
    }

    pub fn test_dir(&self) -> PathBuf {
        self.project_dir.join("tests")
    }

    /// `src/main.c`; its presence makes the project an executable.
    pub fn entry_point(&self) -> PathBuf {
        self.source_dir().join("main.c")
    }

    pub fn object_dir(&self) -> PathBuf {
        self.build_dir.join("obj")
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.build_dir.join("bin")
    }

    pub fn test_build_dir(&self) -> PathBuf {
        self.build_dir.join("tests")
    }

    pub fn deps_dir(&self) -> PathBuf {
        self.build_dir.join("deps")
    }

    /// Staleness record for project sources.
    pub fn cache_file(&self) -> PathBuf {
        self.build_dir.join("cache")
    }

    /// Staleness record for test sources.
    pub fn test_cache_file(&self) -> PathBuf {
        self.test_build_dir().join("cache")
    }

    /// Root of everything buildc writes into the project; `clean` removes it.
    pub fn build_root(&self) -> PathBuf {
        self.project_dir.join(".build")
    }

    pub fn compile_commands_file(&self) -> PathBuf {
        self.build_root().join("compile_commands.json")
    }

    /// Standalone shell script reproducing a full build.
    pub fn build_script(&self) -> PathBuf {
        self.project_dir.join("build.sh")
    }

    /// Object file for a source, mirroring its path below `src/`.
    ///
    /// Sources outside `src/` are keyed by file name only.
    pub fn object_for(&self, source: &Path) -> PathBuf {
        let relative = source
            .strip_prefix(self.source_dir())
            .unwrap_or_else(|_| Path::new(source.file_name().unwrap_or(source.as_os_str())));
        self.object_dir().join(relative).with_extension("o")
    }

    /// Test binary for a test source: `tests/<relative path without .c>`.
    pub fn test_binary_for(&self, test_source: &Path) -> PathBuf {
        self.test_build_dir()
            .join(self.relative_test(test_source))
            .with_extension("")
    }

    /// Object file for a test source, next to its binary.
    pub fn test_object_for(&self, test_source: &Path) -> PathBuf {
        self.test_build_dir()
            .join(self.relative_test(test_source))
            .with_extension("o")
    }

    fn relative_test<'a>(&self, test_source: &'a Path) -> &'a Path {
        test_source
            .strip_prefix(self.test_dir())
            .unwrap_or_else(|_| {
                Path::new(test_source.file_name().unwrap_or(test_source.as_os_str()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = ProjectLayout::new("/work/hello", BuildMode::Debug);
        assert_eq!(layout.build_dir(), Path::new("/work/hello/.build/debug"));
        assert_eq!(layout.config_file(), PathBuf::from("/work/hello/buildc.toml"));
        assert_eq!(layout.cache_file(), PathBuf::from("/work/hello/.build/debug/cache"));
        assert_eq!(
            layout.compile_commands_file(),
            PathBuf::from("/work/hello/.build/compile_commands.json")
        );
    }

    #[test]
    fn test_object_mirrors_source_tree() {
        let layout = ProjectLayout::new("/work/hello", BuildMode::Release);
        assert_eq!(
            layout.object_for(Path::new("/work/hello/src/net/socket.c")),
            PathBuf::from("/work/hello/.build/release/obj/net/socket.o")
        );
    }

    #[test]
    fn test_binary_drops_extension() {
        let layout = ProjectLayout::new("/work/hello", BuildMode::Debug);
        assert_eq!(
            layout.test_binary_for(Path::new("/work/hello/tests/unit/parse-test.c")),
            PathBuf::from("/work/hello/.build/debug/tests/unit/parse-test")
        );
        assert_eq!(
            layout.test_object_for(Path::new("/work/hello/tests/unit/parse-test.c")),
            PathBuf::from("/work/hello/.build/debug/tests/unit/parse-test.o")
        );
        assert_eq!(layout.build_script(), PathBuf::from("/work/hello/build.sh"));
    }

    #[test]
    fn test_relocated_build_dir() {
        let layout =
            ProjectLayout::new("/work/util", BuildMode::Release).with_build_dir("/out/deps/util");
        assert_eq!(layout.bin_dir(), PathBuf::from("/out/deps/util/bin"));
        assert_eq!(layout.build_root(), PathBuf::from("/work/util/.build"));
    }
}
