//! sweeper CLI application

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use clap::Parser;
use sweeper::cli::{Cli, EXIT_OK, exit_code_for, render_error};
use sweeper::commands;
use sweeper::tracing::{TracingConfig, command_span, init_tracing};
use tracing::Instrument;

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = Cli::parse();

    if let Err(e) = init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        filter: None,
    }) {
        eprintln!("Warning: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let json_mode = cli.json;
    let span = command_span(cli.command.name());
    let exit_code = match runtime.block_on(commands::execute(cli).instrument(span)) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            render_error(&err, json_mode);
            exit_code_for(&err)
        }
    };

    std::process::exit(exit_code);
}
