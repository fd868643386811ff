//! Project model for buildc
//!
//! Loads and validates `buildc.toml` project files:
//! - Project identity, toolchain overrides and compile flags
//! - Static library and nested sub-project dependency declarations
//! - The on-disk layout of sources, tests and build outputs

pub mod config;
pub mod layout;

pub use config::{
    ArtifactKind, BuildMode, ConfigError, DependencyDecl, DependencyKind, ProjectConfig,
    CONFIG_FILE_NAME,
};
pub use layout::ProjectLayout;
