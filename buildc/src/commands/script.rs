//! `buildc script`

use buildc::{FsProjectSource, write_build_script};
use std::process::ExitCode;

use super::{Cli, CommandResult};

pub fn execute(cli: &Cli) -> CommandResult {
    let config = cli.load_project()?;
    let path = write_build_script(&config, &cli.options(), &FsProjectSource)?;
    println!("✓ Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}
