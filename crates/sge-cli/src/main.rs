use clap::Parser;
use sge_cli::commands::{check, inspect, solve};
use sge_cli::{Cli, Commands};
use std::io;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Inspect { scenario, json } => inspect::handle(scenario, *json).map(|_| true),
        Commands::Check { scenario, tol } => check::handle(scenario, *tol).map(|_| true),
        Commands::Solve {
            scenario,
            out,
            backend,
            max_iter,
            tol,
        } => {
            let overrides = solve::SolveOverrides {
                backend: *backend,
                max_iter: *max_iter,
                tol: *tol,
            };
            solve::handle(scenario, out.as_ref(), &overrides).map(|status| status.is_success())
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
