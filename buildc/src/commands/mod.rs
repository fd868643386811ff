//! buildc command-line interface
//!
//! - `build`: compile and link the project and its nested dependencies
//! - `test`: build the test archive, link and run `tests/**/*-test.c`
//! - `run`: build, then execute the project's executable
//! - `clean`: remove the project's build outputs
//! - `compdb`: write `compile_commands.json`
//! - `script`: write a `build.sh` replaying a clean build

use buildc::{BuildMode, BuildOptions, ConfigError, ProjectConfig};
use buildc::orchestrator::DEFAULT_PARALLEL_THRESHOLD;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

pub mod build;
pub mod clean;
pub mod compdb;
pub mod run;
pub mod script;

pub type CommandResult = Result<ExitCode, Box<dyn std::error::Error + Send + Sync>>;

/// buildc - incremental build orchestrator for C projects
#[derive(Parser)]
#[command(name = "buildc")]
#[command(about = "Incremental build orchestrator for C projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory (must contain buildc.toml)
    #[arg(short, long, default_value = ".", global = true)]
    pub dir: PathBuf,

    /// Build mode: debug or release
    #[arg(short, long, default_value_t = BuildMode::Debug, global = true)]
    pub mode: BuildMode,

    /// Maximum parallel compiler processes (default: number of CPUs)
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra compiler flag, may be repeated
    #[arg(long = "cflags", value_name = "FLAG", allow_hyphen_values = true, global = true)]
    pub cflags: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the project and its dependencies
    Build,

    /// Build and run the tests
    Test {
        /// Arguments passed to every test binary
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Build and run the executable
    Run {
        /// Arguments passed to the executable
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Remove build outputs
    Clean,

    /// Write compile_commands.json
    Compdb,

    /// Write build.sh, a shell script performing a clean build
    Script,
}

impl Cli {
    pub fn load_project(&self) -> Result<ProjectConfig, ConfigError> {
        ProjectConfig::load(&self.dir, self.mode)
    }

    pub fn options(&self) -> BuildOptions {
        BuildOptions {
            jobs: self.jobs.unwrap_or_else(num_cpus::get),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            extra_cflags: self.cflags.clone(),
        }
    }
}
