//! Toolchain process execution
//!
//! Commands run through a [`CommandRunner`]; the default [`ProcessRunner`]
//! spawns real processes. Large batches are spread over a rayon thread pool.

use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::command::CompileCommand;
use crate::error::{BuildError, CommandStatus, Result};

/// Runs a single external program.
pub trait CommandRunner: Send + Sync {
    /// Run `argv` in `cwd` and wait for it.
    ///
    /// Returns the exit code, `None` if the process was killed by a signal.
    ///
    /// # Errors
    ///
    /// Fails if the program could not be started.
    fn run(&self, argv: &[String], cwd: &Path) -> io::Result<Option<i32>>;
}

/// Spawns real processes with inherited stdout/stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, argv: &[String], cwd: &Path) -> io::Result<Option<i32>> {
        let Some((program, args)) = argv.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
        };
        let status = Command::new(program).args(args).current_dir(cwd).status()?;
        Ok(status.code())
    }
}

/// Run `command` and map its outcome to a build result.
///
/// # Errors
///
/// `ToolchainNotFound` when the program is missing, `CommandFailed` on a
/// non-zero exit.
pub fn run_command(runner: &dyn CommandRunner, command: &CompileCommand, cwd: &Path) -> Result<()> {
    command.prepare_output()?;
    debug!("{}", command.command_line());

    match runner.run(&command.arguments, cwd) {
        Ok(Some(0)) => Ok(()),
        Ok(code) => Err(BuildError::CommandFailed {
            command: command.command_line(),
            status: CommandStatus::from_code(code),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BuildError::ToolchainNotFound {
            program: command.program().to_string(),
        }),
        Err(e) => Err(BuildError::io(command.program(), e)),
    }
}

/// Runs batches of independent commands, in parallel when worthwhile.
pub struct Executor<'a> {
    runner: &'a dyn CommandRunner,
    cwd: PathBuf,
    jobs: usize,
    parallel_threshold: usize,
}

impl<'a> Executor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        cwd: impl Into<PathBuf>,
        jobs: usize,
        parallel_threshold: usize,
    ) -> Self {
        Self {
            runner,
            cwd: cwd.into(),
            jobs: jobs.max(1),
            parallel_threshold,
        }
    }

    /// Run every command; stop starting new ones after the first failure.
    ///
    /// Commands already running when a failure happens are allowed to finish.
    /// `label` prefixes the per-command progress line.
    ///
    /// # Errors
    ///
    /// The first failure observed.
    pub fn run_all(&self, label: &str, commands: &[CompileCommand]) -> Result<()> {
        if commands.len() > self.parallel_threshold && self.jobs > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => return pool.install(|| self.run_parallel(label, commands)),
                Err(e) => warn!("Falling back to sequential execution: {}", e),
            }
        }

        for command in commands {
            self.run_one(label, command)?;
        }
        Ok(())
    }

    fn run_parallel(&self, label: &str, commands: &[CompileCommand]) -> Result<()> {
        let cancelled = AtomicBool::new(false);
        let first_error: Mutex<Option<BuildError>> = Mutex::new(None);

        commands.par_iter().for_each(|command| {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            if let Err(e) = self.run_one(label, command) {
                cancelled.store(true, Ordering::SeqCst);
                if let Ok(mut slot) = first_error.lock()
                    && slot.is_none()
                {
                    *slot = Some(e);
                }
            }
        });

        first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .map_or(Ok(()), Err)
    }

    fn run_one(&self, label: &str, command: &CompileCommand) -> Result<()> {
        if let Some(input) = command.inputs.first() {
            info!("{} {}", label, input.display());
        }
        run_command(self.runner, command, &self.cwd)
    }
}
