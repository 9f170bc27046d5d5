pub mod cli;
pub mod commands;
pub mod scenario_file;

pub use cli::{Cli, Commands};
pub use scenario_file::{load_scenario, ScenarioFile};
