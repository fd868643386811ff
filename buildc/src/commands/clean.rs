//! `buildc clean`

use std::fs;
use std::process::ExitCode;

use super::{Cli, CommandResult};

/// Remove `.build/` below the project, every mode at once.
pub fn execute(cli: &Cli) -> CommandResult {
    let config = cli.load_project()?;
    let build_root = config.layout.build_root();

    if !build_root.exists() {
        println!("Nothing to clean");
        return Ok(ExitCode::SUCCESS);
    }

    fs::remove_dir_all(&build_root)?;
    println!("✓ Removed {}", build_root.display());
    Ok(ExitCode::SUCCESS)
}
