//! Derivative verification at the default starting point.

use crate::scenario_file::load_scenario;
use anyhow::{bail, Result};
use sge_algo::allocation::DerivativeCheck;
use sge_algo::{verify_gradient, verify_hessian, verify_jacobian};
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;

/// Multiplier used for every row when checking the Lagrangian Hessian.
const CHECK_MULTIPLIER: f64 = 1.0;

pub fn run_checks(path: &Path) -> Result<Vec<(&'static str, DerivativeCheck)>> {
    let file = load_scenario(path)?;
    let problem = file.problem()?;
    let x = problem.initial_point();
    let lambda = vec![CHECK_MULTIPLIER; problem.n_con()];

    Ok(vec![
        ("gradient", verify_gradient(&problem, &x)),
        ("jacobian", verify_jacobian(&problem, &x)?),
        ("hessian", verify_hessian(&problem, &x, 1.0, &lambda)?),
    ])
}

pub fn handle(path: &Path, tol: f64) -> Result<()> {
    let checks = run_checks(path)?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "CALLBACK\tMAX ABS\tMAX REL\tWORST\tLARGE\tENTRIES\tRESULT")?;
    for (name, check) in &checks {
        writeln!(
            writer,
            "{}\t{:.3e}\t{:.3e}\t({}, {})\t{}\t{}\t{}",
            name,
            check.max_abs_error,
            check.max_rel_error,
            check.worst.0,
            check.worst.1,
            check.large_error_count,
            check.total_entries,
            if check.passes(tol) { "ok" } else { "FAIL" }
        )?;
    }
    writer.flush()?;

    let failed: Vec<&str> = checks
        .iter()
        .filter(|(_, check)| !check.passes(tol))
        .map(|(name, _)| *name)
        .collect();
    if !failed.is_empty() {
        bail!("derivative check failed for {}", failed.join(", "));
    }
    Ok(())
}
