//! `buildc compdb`

use buildc::{FsProjectSource, write_compile_commands};
use std::process::ExitCode;

use super::{Cli, CommandResult};

pub fn execute(cli: &Cli) -> CommandResult {
    let config = cli.load_project()?;
    let path = write_compile_commands(&config, &cli.options(), &FsProjectSource)?;
    println!("✓ Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}
