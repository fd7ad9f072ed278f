//! docpipe: builds, packages and publishes project documentation incrementally

mod cli;
mod commands;
mod tracing;

use crate::tracing::{TracingConfig, init_tracing};
use std::process::ExitCode;

fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|panic_info| {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("docpipe crashed: {panic_info}");
            eprintln!("Re-run with --level debug and report the output.");
        }
    }));

    let cli = cli::parse();
    let config = TracingConfig {
        format: cli.tracing_format(),
        level: cli.level.into(),
        ..TracingConfig::default()
    };

    if let Err(error) = init_tracing(config).and_then(|()| commands::execute(&cli)) {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("{error:?}");
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
