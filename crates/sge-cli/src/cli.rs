use clap::{Parser, Subcommand, ValueHint};
use sge_algo::Backend;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sge", author, version, about = "Spatial allocation solver", long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print dimensions, nonzero counts and connectivity of a scenario
    Inspect {
        /// Scenario file (TOML, or JSON by extension)
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Check analytic derivatives against finite differences at the default point
    Check {
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Largest accepted relative error
        #[arg(long, default_value_t = 1e-4)]
        tol: f64,
    },
    /// Solve a scenario and write the allocation as JSON
    Solve {
        #[arg(value_hint = ValueHint::FilePath)]
        scenario: PathBuf,
        /// Write the result here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        /// Solver backend (augmented-lagrangian, ipopt)
        #[arg(long)]
        backend: Option<Backend>,
        /// Iteration budget
        #[arg(long)]
        max_iter: Option<usize>,
        /// Constraint violation tolerance
        #[arg(long)]
        tol: Option<f64>,
    },
}
