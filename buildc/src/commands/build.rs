//! `buildc build`

use buildc::{BuildOrchestrator, BuildReport, ProcessRunner};
use std::process::ExitCode;
use std::time::Instant;

use super::{Cli, CommandResult};

pub fn execute(cli: &Cli) -> CommandResult {
    let config = cli.load_project()?;
    let start = Instant::now();

    let report = BuildOrchestrator::new(&ProcessRunner, cli.options()).build(&config)?;
    print_report(&report);

    println!(
        "✓ {} ({}) ready in {:.2}s: {}",
        report.project,
        config.mode,
        start.elapsed().as_secs_f64(),
        report.artifact.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// One line per project, dependencies first.
pub fn print_report(report: &BuildReport) {
    for dependency in &report.dependencies {
        print_report(dependency);
    }
    let status = if report.linked { "linked" } else { "up to date" };
    println!(
        "  {:<20} {} compiled, {} {}",
        report.project,
        report.compiled.len(),
        report.kind,
        status
    );
}
