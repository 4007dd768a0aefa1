//! The `dodot` binary.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser as _;

use dodot_cli::cli::Cli;
use dodot_cli::commands;
use dodot_cli::logging::{Logger, init_subscriber};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    init_subscriber(args.verbose);
    let log = Arc::new(Logger::new(args.global.dry_run));

    match commands::run(args, Arc::clone(&log)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            log.error(&format!("{err:#}"));
            ExitCode::from(1)
        }
    }
}
