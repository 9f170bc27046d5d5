//! Solve a scenario and report the recovered allocation.

use crate::scenario_file::load_scenario;
use anyhow::{Context, Result};
use serde::Serialize;
use sge_algo::{recover, AllocationResult, Backend, SolveStatus, SolverConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Command-line overrides of the scenario's `[solver]` table.
#[derive(Debug, Clone, Default)]
pub struct SolveOverrides {
    pub backend: Option<Backend>,
    pub max_iter: Option<usize>,
    pub tol: Option<f64>,
}

impl SolveOverrides {
    pub fn apply(&self, mut config: SolverConfig) -> SolverConfig {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(max_iter) = self.max_iter {
            config.max_iterations = max_iter;
        }
        if let Some(tol) = self.tol {
            config.tolerance = tol;
        }
        config
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub scenario: String,
    pub backend: Backend,
    pub status: SolveStatus,
    pub iterations: usize,
    pub objective: f64,
    pub max_violation: f64,
    pub solve_time_ms: u128,
    pub allocation: AllocationResult,
}

pub fn solve_scenario(path: &Path, overrides: &SolveOverrides) -> Result<SolveReport> {
    let file = load_scenario(path)?;
    let config = overrides.apply(file.solver.clone());
    let problem = file.problem()?;

    let outcome = sge_algo::solve(&problem, &config, None)?;
    let allocation = recover(&problem, &outcome.x, &outcome.multipliers)?;

    Ok(SolveReport {
        scenario: file.display_name(path),
        backend: config.backend,
        status: outcome.status,
        iterations: outcome.iterations,
        objective: outcome.objective,
        max_violation: outcome.max_violation,
        solve_time_ms: outcome.solve_time_ms,
        allocation,
    })
}

/// Returns the solve status so the caller can pick an exit code.
pub fn handle(
    path: &Path,
    out: Option<&PathBuf>,
    overrides: &SolveOverrides,
) -> Result<SolveStatus> {
    let report = solve_scenario(path, overrides)?;
    let json = serde_json::to_string_pretty(&report)?;

    match out {
        Some(out) => {
            fs::write(out, &json).with_context(|| format!("writing {}", out.display()))?;
            info!("wrote allocation to {}", out.display());
        }
        None => println!("{json}"),
    }

    if report.status.is_success() {
        info!(
            welfare = report.allocation.welfare,
            iterations = report.iterations,
            "solve finished: {}",
            report.status
        );
    } else {
        warn!(
            max_violation = report.max_violation,
            "solve did not converge: {}", report.status
        );
    }
    Ok(report.status)
}
