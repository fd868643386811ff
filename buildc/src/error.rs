//! Build error types

use convenient_project::ConfigError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Result type for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

/// How an external command ended when it did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Exited with a non-zero code
    Exited(i32),
    /// Killed by a signal
    Signaled,
}

impl CommandStatus {
    pub(crate) fn from_code(code: Option<i32>) -> Self {
        code.map_or(CommandStatus::Signaled, CommandStatus::Exited)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Exited(code) => write!(f, "exit status {code}"),
            CommandStatus::Signaled => f.write_str("terminated by signal"),
        }
    }
}

/// Errors that abort a build
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Invalid or missing project configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem error on a specific path
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A toolchain program could not be started
    #[error("Toolchain program '{program}' not found")]
    ToolchainNotFound { program: String },

    /// A toolchain command ran and failed
    #[error("Command failed with {status}: {command}")]
    CommandFailed {
        command: String,
        status: CommandStatus,
    },

    /// Link step without any object file
    #[error("Nothing to link for {0}: no object files")]
    NothingToLink(PathBuf),

    /// A nested dependency failed to build
    #[error("Dependency '{name}' failed to build: {source}")]
    Dependency {
        name: String,
        #[source]
        source: Box<BuildError>,
    },

    /// The staleness record could not be written
    #[error("Cache error in {path}: {message}")]
    Cache { path: PathBuf, message: String },

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        BuildError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message() {
        let err = BuildError::CommandFailed {
            command: "cc -c src/a.c -o obj/a.o".to_string(),
            status: CommandStatus::Exited(1),
        };
        assert_eq!(
            err.to_string(),
            "Command failed with exit status 1: cc -c src/a.c -o obj/a.o"
        );
    }

    #[test]
    fn test_dependency_error_wraps_cause() {
        let err = BuildError::Dependency {
            name: "util".to_string(),
            source: Box::new(BuildError::ToolchainNotFound {
                program: "gcc".to_string(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "Dependency 'util' failed to build: Toolchain program 'gcc' not found"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_signal_status() {
        assert_eq!(CommandStatus::from_code(None), CommandStatus::Signaled);
        assert_eq!(CommandStatus::from_code(Some(2)), CommandStatus::Exited(2));
    }
}
