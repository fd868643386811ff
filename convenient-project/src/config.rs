//! `buildc.toml` parsing and validation
//!
//! ```toml
//! [project]
//! name = "hello"
//! version = "0.1.0"
//! cflags = ["-std=c11"]
//!
//! [[dependency]]
//! name = "m"
//!
//! [[dependency]]
//! name = "util"
//! kind = "nested"
//! dir = "../util"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::layout::ProjectLayout;

/// Name of the project file at the root of every project.
pub const CONFIG_FILE_NAME: &str = "buildc.toml";

/// Compiler flag profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Debug info, sanitizers and strict warnings
    #[default]
    Debug,
    /// Optimized
    Release,
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Release => "release",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(BuildMode::Debug),
            "release" => Ok(BuildMode::Release),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// What the link step produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Executable, requires `src/main.c`
    Exe,
    /// `lib<name>.a`
    Static,
    /// `lib<name>.so`
    Shared,
}

impl ArtifactKind {
    /// File name of the artifact for a project called `name`.
    pub fn file_name(self, name: &str) -> String {
        match self {
            ArtifactKind::Exe => name.to_string(),
            ArtifactKind::Static => format!("lib{name}.a"),
            ArtifactKind::Shared => format!("lib{name}.so"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactKind::Exe => "exe",
            ArtifactKind::Static => "static",
            ArtifactKind::Shared => "shared",
        })
    }
}

/// Kind of a dependency declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Prebuilt library: include dirs, library dir and a link name
    #[default]
    Static,
    /// Another buildc project, built recursively
    Nested,
}

/// One `[[dependency]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencyDecl {
    pub name: String,
    #[serde(default)]
    pub kind: DependencyKind,
    /// Root of the dependency, relative to the declaring project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Include subpaths below `dir`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,
    /// Library subpath below `dir` (static only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_dir: Option<PathBuf>,
    /// Link name, defaults to `name` (static only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cflags: Vec<String>,
    /// Build mode of a nested project, defaults to release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,
    /// Artifact of a nested project, defaults to static
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactKind>,
}

impl DependencyDecl {
    /// A static dependency linked as `-l<name>`.
    pub fn library(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DependencyKind::Static,
            dir: None,
            include: Vec::new(),
            lib_dir: None,
            lib: None,
            cflags: Vec::new(),
            mode: None,
            artifact: None,
        }
    }

    /// A nested project located at `dir`.
    pub fn nested(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            kind: DependencyKind::Nested,
            dir: Some(dir.into()),
            ..Self::library(name)
        }
    }

    /// Link name of a static dependency.
    pub fn link_name(&self) -> &str {
        self.lib.as_deref().unwrap_or(&self.name)
    }

    pub fn nested_mode(&self) -> BuildMode {
        self.mode.unwrap_or(BuildMode::Release)
    }

    pub fn nested_artifact(&self) -> ArtifactKind {
        self.artifact.unwrap_or(ArtifactKind::Static)
    }

    /// Root of the dependency for a declaring project at `project_dir`.
    pub fn root(&self, project_dir: &Path) -> PathBuf {
        match &self.dir {
            Some(dir) => project_dir.join(dir),
            None => project_dir.to_path_buf(),
        }
    }

    fn validate(&self, config_file: &Path) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            path: config_file.to_path_buf(),
            message: format!("dependency '{}': {message}", self.name),
        };

        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                path: config_file.to_path_buf(),
                message: "dependency name must not be empty".to_string(),
            });
        }

        match self.kind {
            DependencyKind::Static => {
                if self.link_name().trim().is_empty() {
                    return Err(invalid("link name must not be empty".to_string()));
                }
                if self.mode.is_some() || self.artifact.is_some() {
                    return Err(invalid(
                        "'mode' and 'artifact' only apply to nested dependencies".to_string(),
                    ));
                }
            }
            DependencyKind::Nested => {
                if self.dir.is_none() {
                    return Err(invalid("nested dependencies need a 'dir'".to_string()));
                }
                if self.lib.is_some() || self.lib_dir.is_some() {
                    return Err(invalid(
                        "'lib' and 'lib_dir' only apply to static dependencies".to_string(),
                    ));
                }
                if self.artifact == Some(ArtifactKind::Exe) {
                    return Err(ConfigError::ArtifactMismatch {
                        name: self.name.clone(),
                        requested: ArtifactKind::Exe,
                        reason: "an executable cannot be linked into another project".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    project: ProjectSection,
    #[serde(default, rename = "dependency")]
    dependencies: Vec<DependencyDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectSection {
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    cc: Option<String>,
    #[serde(default)]
    ar: Option<String>,
    #[serde(default)]
    objcopy: Option<String>,
    #[serde(default)]
    cflags: Vec<String>,
    #[serde(default)]
    artifact: Option<ArtifactKind>,
}

/// A loaded and validated project, immutable for the duration of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub name: String,
    pub version: String,
    /// Compiler override
    pub cc: Option<String>,
    /// Archiver override
    pub ar: Option<String>,
    /// Symbol-rename tool override
    pub objcopy: Option<String>,
    pub cflags: Vec<String>,
    /// Requested artifact; `None` means "executable if there is an entry point,
    /// static library otherwise"
    pub artifact: Option<ArtifactKind>,
    /// Declarations in file order
    pub dependencies: Vec<DependencyDecl>,
    pub mode: BuildMode,
    pub layout: ProjectLayout,
}

impl ProjectConfig {
    /// Load `<dir>/buildc.toml`.
    ///
    /// The project directory is canonicalized so that the same project reached
    /// through different relative paths compares equal.
    ///
    /// # Errors
    ///
    /// Fails if the directory or its project file is missing, unreadable,
    /// malformed, or declares invalid dependencies.
    pub fn load(dir: impl AsRef<Path>, mode: BuildMode) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let config_file = dir.join(CONFIG_FILE_NAME);
        if !config_file.is_file() {
            return Err(ConfigError::MissingProjectFile(config_file));
        }

        let project_dir = dir.canonicalize().map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let config_file = project_dir.join(CONFIG_FILE_NAME);

        let content = std::fs::read_to_string(&config_file).map_err(|source| ConfigError::Io {
            path: config_file.clone(),
            source,
        })?;

        tracing::debug!("Loaded project file {}", config_file.display());
        Self::parse(&content, project_dir, mode)
    }

    /// Parse project file content for a project rooted at `project_dir`.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or invalid declarations.
    pub fn parse(
        content: &str,
        project_dir: impl Into<PathBuf>,
        mode: BuildMode,
    ) -> Result<Self, ConfigError> {
        let layout = ProjectLayout::new(project_dir, mode);
        let config_file = layout.config_file();

        let manifest: Manifest = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: config_file.clone(),
            source,
        })?;

        let project = manifest.project;
        let name = project.name.trim().to_string();
        if name.is_empty() || name.contains(['/', '\\']) || name.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                path: config_file,
                message: format!("invalid project name '{}'", project.name),
            });
        }

        for dependency in &manifest.dependencies {
            dependency.validate(&config_file)?;
        }

        Ok(Self {
            name,
            version: project.version.unwrap_or_else(|| "0.1.0".to_string()),
            cc: project.cc,
            ar: project.ar,
            objcopy: project.objcopy,
            cflags: project.cflags,
            artifact: project.artifact,
            dependencies: manifest.dependencies,
            mode,
            layout,
        })
    }

    /// Relocate build outputs, used for nested builds.
    #[must_use]
    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.layout = self.layout.with_build_dir(build_dir);
        self
    }

    /// Override the requested artifact, used for nested builds.
    #[must_use]
    pub fn with_artifact(mut self, artifact: ArtifactKind) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// Append compile flags, used for nested builds.
    #[must_use]
    pub fn with_extra_cflags(mut self, cflags: &[String]) -> Self {
        self.cflags.extend_from_slice(cflags);
        self
    }

    pub fn project_dir(&self) -> &Path {
        self.layout.project_dir()
    }

    pub fn config_file(&self) -> PathBuf {
        self.layout.config_file()
    }
}

/// Project configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File system I/O error
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Directory has no project file
    #[error("Project file not found: {0}")]
    MissingProjectFile(PathBuf),

    /// Semantically invalid project file
    #[error("Invalid project file {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    /// Nested dependencies form a cycle
    #[error("Cyclic dependency detected: {0}")]
    CyclicDependency(String),

    /// Requested artifact cannot be produced
    #[error("Project '{name}' cannot be built as {requested}: {reason}")]
    ArtifactMismatch {
        name: String,
        requested: ArtifactKind,
        reason: String,
    },

    /// Build mode not recognized
    #[error("Unknown build mode '{0}' (expected 'debug' or 'release')")]
    UnknownMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_project() {
        let config =
            ProjectConfig::parse("[project]\nname = \"hello\"\n", "/work/hello", BuildMode::Debug)
                .unwrap();
        assert_eq!(config.name, "hello");
        assert_eq!(config.version, "0.1.0");
        assert!(config.dependencies.is_empty());
        assert!(config.artifact.is_none());
        assert_eq!(config.config_file(), PathBuf::from("/work/hello/buildc.toml"));
    }

    #[test]
    fn test_dependencies_keep_declaration_order() {
        let content = r#"
[project]
name = "app"
cflags = ["-std=c11"]

[[dependency]]
name = "z"

[[dependency]]
name = "util"
kind = "nested"
dir = "../util"
cflags = ["-DUTIL_FAST"]

[[dependency]]
name = "a"
lib = "alpha"
include = ["include"]
lib_dir = "lib"
dir = "vendor/alpha"
"#;
        let config = ProjectConfig::parse(content, "/work/app", BuildMode::Release).unwrap();
        let names: Vec<_> = config.dependencies.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["z", "util", "a"]);

        let util = &config.dependencies[1];
        assert_eq!(util.kind, DependencyKind::Nested);
        assert_eq!(util.nested_mode(), BuildMode::Release);
        assert_eq!(util.nested_artifact(), ArtifactKind::Static);
        assert_eq!(util.root(Path::new("/work/app")), PathBuf::from("/work/app/../util"));

        let alpha = &config.dependencies[2];
        assert_eq!(alpha.link_name(), "alpha");
        assert_eq!(alpha.kind, DependencyKind::Static);
    }

    #[test]
    fn test_nested_requires_dir() {
        let content = "[project]\nname = \"app\"\n[[dependency]]\nname = \"util\"\nkind = \"nested\"\n";
        let err = ProjectConfig::parse(content, "/work/app", BuildMode::Debug).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("util"));
    }

    #[test]
    fn test_nested_executable_is_rejected() {
        let content = "[project]\nname = \"app\"\n[[dependency]]\nname = \"tool\"\nkind = \"nested\"\ndir = \"../tool\"\nartifact = \"exe\"\n";
        let err = ProjectConfig::parse(content, "/work/app", BuildMode::Debug).unwrap_err();
        assert!(matches!(err, ConfigError::ArtifactMismatch { .. }));
    }

    #[test]
    fn test_unknown_field_is_a_parse_error() {
        let content = "[project]\nname = \"app\"\ncompiler = \"gcc\"\n";
        let err = ProjectConfig::parse(content, "/work/app", BuildMode::Debug).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_project_name() {
        let content = "[project]\nname = \"my app\"\n";
        let err = ProjectConfig::parse(content, "/work/app", BuildMode::Debug).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_build_mode_from_str() {
        assert_eq!("release".parse::<BuildMode>().unwrap(), BuildMode::Release);
        assert!(matches!(
            "fast".parse::<BuildMode>(),
            Err(ConfigError::UnknownMode(mode)) if mode == "fast"
        ));
    }

    #[test]
    fn test_artifact_file_names() {
        assert_eq!(ArtifactKind::Exe.file_name("hello"), "hello");
        assert_eq!(ArtifactKind::Static.file_name("util"), "libutil.a");
        assert_eq!(ArtifactKind::Shared.file_name("util"), "libutil.so");
    }
}
