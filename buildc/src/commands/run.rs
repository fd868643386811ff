//! `buildc run`

use buildc::{ArtifactKind, BuildOrchestrator, CommandRunner, ProcessRunner};
use std::process::ExitCode;

use super::{Cli, CommandResult};

pub fn execute(cli: &Cli, args: &[String]) -> CommandResult {
    let config = cli.load_project()?;
    let report = BuildOrchestrator::new(&ProcessRunner, cli.options()).build(&config)?;

    if report.kind != ArtifactKind::Exe {
        return Err(format!(
            "project '{}' builds a {} library, there is nothing to run",
            report.project, report.kind
        )
        .into());
    }

    let mut argv = vec![report.artifact.to_string_lossy().into_owned()];
    argv.extend(args.iter().cloned());
    tracing::info!("Running {}", report.artifact.display());

    match ProcessRunner.run(&argv, config.project_dir())? {
        Some(code) => Ok(ExitCode::from(u8::try_from(code).unwrap_or(1))),
        None => Err(format!("{} terminated by signal", report.artifact.display()).into()),
    }
}
