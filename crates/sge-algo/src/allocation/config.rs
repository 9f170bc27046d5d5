//! Solver configuration and backend dispatch.

use super::error::AllocationError;
use super::nlp::{NlpBackend, NonlinearProgram, SolveOutcome};
use super::solver::AugmentedLagrangianBackend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which NLP backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// Bundled augmented-Lagrangian method with L-BFGS inner solves
    #[default]
    AugmentedLagrangian,
    /// Interior-point solver via the `ipopt` crate (feature `solver-ipopt`)
    Ipopt,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::AugmentedLagrangian => f.write_str("augmented-lagrangian"),
            Backend::Ipopt => f.write_str("ipopt"),
        }
    }
}

impl FromStr for Backend {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "augmented-lagrangian" | "al" | "lbfgs" => Ok(Backend::AugmentedLagrangian),
            "ipopt" => Ok(Backend::Ipopt),
            other => Err(AllocationError::SolverUnavailable(other.to_string())),
        }
    }
}

/// Configuration passed to backend solvers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: Backend,
    /// Total iteration budget (L-BFGS iterations summed over outer loops, or IPOPT iterations)
    pub max_iterations: usize,
    /// Constraint violation tolerance
    pub tolerance: f64,
    /// Stationarity tolerance (augmented Lagrangian only)
    pub dual_tolerance: f64,
    /// IPOPT print level (0-12)
    pub print_level: i32,
    /// Initial penalty μ₀
    pub penalty_initial: f64,
    /// Penalty growth factor when feasibility stalls
    pub penalty_growth: f64,
    /// Penalty cap
    pub penalty_max: f64,
    pub max_outer_iterations: usize,
    /// L-BFGS iteration cap per outer iteration
    pub inner_iterations: usize,
    pub lbfgs_memory: usize,
    /// Minimum relative distance from a bound at the starting point
    pub bound_push: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            max_iterations: 5000,
            tolerance: 1e-7,
            dual_tolerance: 1e-5,
            print_level: 0,
            penalty_initial: 10.0,
            penalty_growth: 10.0,
            penalty_max: 1e8,
            max_outer_iterations: 50,
            inner_iterations: 500,
            lbfgs_memory: 7,
            bound_push: 1e-2,
        }
    }
}

impl SolverConfig {
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}

/// Instantiate the configured backend.
pub fn backend_for(config: &SolverConfig) -> Result<Box<dyn NlpBackend>, AllocationError> {
    match config.backend {
        Backend::AugmentedLagrangian => Ok(Box::new(AugmentedLagrangianBackend::new(config.clone()))),
        #[cfg(feature = "solver-ipopt")]
        Backend::Ipopt => Ok(Box::new(super::ipopt_solver::IpoptBackend::new(config.clone()))),
        #[cfg(not(feature = "solver-ipopt"))]
        Backend::Ipopt => Err(AllocationError::SolverUnavailable("ipopt".into())),
    }
}

/// Solve with the configured backend.
pub fn solve(
    problem: &dyn NonlinearProgram,
    config: &SolverConfig,
    start: Option<&[f64]>,
) -> Result<SolveOutcome, AllocationError> {
    let backend = backend_for(config)?;
    tracing::info!(
        backend = backend.id(),
        n_var = problem.num_variables(),
        n_con = problem.num_constraints(),
        "starting solve"
    );
    backend.solve(problem, start)
}
