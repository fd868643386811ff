//! buildc - incremental build orchestrator for C projects
//!
//! Usage:
//!   buildc build                 Compile and link the project
//!   buildc test [-- ARGS]        Build and run tests/**/*-test.c
//!   buildc run [-- ARGS]         Build and run the executable
//!   buildc clean                 Remove .build/
//!   buildc compdb                Write .build/compile_commands.json
//!   buildc script                Write build.sh

mod commands;

use clap::Parser;
use commands::{Cli, Commands};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "buildc=debug" } else { "buildc=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let result = match &cli.command {
        Commands::Build => commands::build::execute(&cli),
        Commands::Test { args } => commands::test::execute(&cli, args),
        Commands::Run { args } => commands::run::execute(&cli, args),
        Commands::Clean => commands::clean::execute(&cli),
        Commands::Compdb => commands::compdb::execute(&cli),
        Commands::Script => commands::script::execute(&cli),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
