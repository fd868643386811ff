//! buildc - incremental build orchestrator for C projects
//!
//! buildc compiles a project's `src/**/*.c` into objects and links them into
//! an executable or a library, recompiling only what changed since the last
//! successful build:
//! - **convenient-project**: `buildc.toml` loading and directory layout
//! - **convenient-graph**: DAG used to order nested projects and reject cycles
//!
//! ## Architecture
//!
//! 1. **Resolution**: [`resolver`] expands dependency declarations into flags
//!    and plans nested project builds
//! 2. **Staleness**: [`staleness`] compares file times against the
//!    [`record::StalenessRecord`] and follows quoted includes
//! 3. **Commands**: [`command`] builds toolchain argument vectors
//! 4. **Execution**: [`orchestrator`] runs them through a
//!    [`executor::CommandRunner`], in parallel for large batches
//!
//! The same commands can be written out as a standalone `build.sh` by
//! [`script`].
//!
//! ## Usage
//!
//! ```no_run
//! use buildc::{BuildMode, BuildOptions, BuildOrchestrator, ProcessRunner, ProjectConfig};
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProjectConfig::load(".", BuildMode::Debug)?;
//! let report = BuildOrchestrator::new(&ProcessRunner, BuildOptions::default()).build(&config)?;
//! println!("{} objects compiled", report.compiled.len());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod compile_commands;
pub mod error;
pub mod executor;
pub mod fs;
pub mod include_graph;
pub mod orchestrator;
pub mod record;
pub mod resolver;
pub mod script;
pub mod staleness;

pub use command::{CommandBuilder, CompileCommand, Toolchain};
pub use compile_commands::{CompileCommandEntry, compile_command_entries, write_compile_commands};
pub use error::{BuildError, CommandStatus, Result};
pub use executor::{CommandRunner, Executor, ProcessRunner};
pub use orchestrator::{
    BuildContext, BuildOptions, BuildOrchestrator, BuildPhase, BuildReport, TestReport,
};
pub use record::StalenessRecord;
pub use resolver::{DependencyFlags, DependencyResolver, FsProjectSource, ProjectSource, Resolution};
pub use script::{render_build_script, write_build_script};
pub use staleness::StalenessTracker;

pub use convenient_project::{ArtifactKind, BuildMode, ConfigError, ProjectConfig};
