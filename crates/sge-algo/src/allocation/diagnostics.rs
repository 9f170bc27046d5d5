//! # Derivative checks and constraint introspection
//!
//! - **Gradient / Jacobian verification**: analytic values against central
//!   finite differences, over the *dense* matrix, so an entry missing from
//!   the declared pattern shows up as an error too
//! - **Hessian verification**: symmetric completion of the lower-triangular
//!   Hessian against finite differences of `σ_f·∇f + Jᵀλ`
//! - **Constraint violations**: named residuals sorted by severity
//!
//! Dense comparisons cost O(n·m) evaluations; meant for small and medium
//! instances and for tests.

use super::error::AllocationError;
use super::layout::ConstraintFamily;
use super::nlp::{lagrangian_gradient, NonlinearProgram};
use super::problem::AllocationProblem;
use serde::Serialize;

/// Relative error above which an entry counts as wrong.
const LARGE_ERROR: f64 = 1e-4;

/// Result of comparing analytic derivatives against finite differences.
#[derive(Debug, Clone, Serialize)]
pub struct DerivativeCheck {
    /// Maximum absolute error across all entries
    pub max_abs_error: f64,
    /// Maximum of `|analytic − fd| / max(1, |analytic|)`
    pub max_rel_error: f64,
    /// Entry with the largest relative error (row, col)
    pub worst: (usize, usize),
    /// Number of entries with relative error > 1e-4
    pub large_error_count: usize,
    /// Total number of entries compared
    pub total_entries: usize,
}

impl DerivativeCheck {
    fn new() -> Self {
        Self {
            max_abs_error: 0.0,
            max_rel_error: 0.0,
            worst: (0, 0),
            large_error_count: 0,
            total_entries: 0,
        }
    }

    fn compare(&mut self, row: usize, col: usize, analytic: f64, fd: f64) {
        let abs = (analytic - fd).abs();
        let rel = abs / analytic.abs().max(1.0);
        self.total_entries += 1;
        self.max_abs_error = self.max_abs_error.max(abs);
        if rel > self.max_rel_error || rel.is_nan() {
            self.max_rel_error = if rel.is_nan() { f64::INFINITY } else { rel };
            self.worst = (row, col);
        }
        if !(rel <= LARGE_ERROR) {
            self.large_error_count += 1;
        }
    }

    /// True when every entry is within `tol` relative error.
    pub fn passes(&self, tol: f64) -> bool {
        self.max_rel_error <= tol
    }
}

/// Largest step, as a fraction of the distance to the lower bound.
const BOUND_STEP_FRACTION: f64 = 1e-3;

/// Step and the two evaluation points for coordinate `i`.
///
/// Differences stay central near a lower bound by shrinking the step to a
/// small fraction of the gap, so components sitting just above their floor
/// (the starting flows) are not evaluated with a step as large as the value
/// itself. Only a component exactly on its bound gets a forward difference.
fn perturb(x: &[f64], lb: &[f64], i: usize) -> (Vec<f64>, Vec<f64>, f64) {
    let h = 1e-6 * x[i].abs().max(1.0);
    let gap = x[i] - lb[i];
    let mut plus = x.to_vec();
    let mut minus = x.to_vec();
    if gap > 0.0 {
        let h = h.min(BOUND_STEP_FRACTION * gap);
        plus[i] += h;
        minus[i] -= h;
        (plus, minus, 2.0 * h)
    } else {
        plus[i] += h;
        (plus, minus, h)
    }
}

/// Check the objective gradient.
pub fn verify_gradient(problem: &dyn NonlinearProgram, x: &[f64]) -> DerivativeCheck {
    let (lb, _) = problem.variable_bounds();
    let grad = problem.objective_gradient(x);
    let mut check = DerivativeCheck::new();
    for i in 0..x.len() {
        let (plus, minus, step) = perturb(x, &lb, i);
        let fd = (problem.objective(&plus) - problem.objective(&minus)) / step;
        check.compare(0, i, grad[i], fd);
    }
    check
}

/// Check the constraint Jacobian, including entries outside the pattern.
pub fn verify_jacobian(
    problem: &dyn NonlinearProgram,
    x: &[f64],
) -> Result<DerivativeCheck, AllocationError> {
    let (lb, _) = problem.variable_bounds();
    let values = problem.jacobian_values(x)?;
    let analytic = problem.jacobian_pattern().to_dense(&values);
    let mut check = DerivativeCheck::new();

    for col in 0..x.len() {
        let (plus, minus, step) = perturb(x, &lb, col);
        let g_plus = problem.constraints(&plus);
        let g_minus = problem.constraints(&minus);
        for row in 0..problem.num_constraints() {
            let fd = (g_plus[row] - g_minus[row]) / step;
            check.compare(row, col, analytic[row][col], fd);
        }
    }
    Ok(check)
}

/// Check the Lagrangian Hessian against finite differences of the
/// Lagrangian gradient.
pub fn verify_hessian(
    problem: &dyn NonlinearProgram,
    x: &[f64],
    obj_factor: f64,
    lambda: &[f64],
) -> Result<DerivativeCheck, AllocationError> {
    AllocationError::check_len("lambda", problem.num_constraints(), lambda.len())?;
    let (lb, _) = problem.variable_bounds();
    let values = problem.hessian_values(x, obj_factor, lambda)?;
    let analytic = problem.hessian_pattern().to_dense(&values);
    let mut check = DerivativeCheck::new();

    for col in 0..x.len() {
        let (plus, minus, step) = perturb(x, &lb, col);
        let grad_plus = lagrangian_gradient(problem, &plus, obj_factor, lambda)?;
        let grad_minus = lagrangian_gradient(problem, &minus, obj_factor, lambda)?;
        for row in 0..x.len() {
            let fd = (grad_plus[row] - grad_minus[row]) / step;
            check.compare(row, col, analytic[row][col], fd);
        }
    }
    Ok(check)
}

/// One constraint residual, labelled.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintViolation {
    pub row: usize,
    pub family: ConstraintFamily,
    pub label: String,
    pub residual: f64,
}

/// Residuals with `|g| > threshold`, largest first.
pub fn constraint_violations(
    problem: &AllocationProblem,
    x: &[f64],
    threshold: f64,
) -> Vec<ConstraintViolation> {
    let n_nodes = problem.vars().n_nodes;
    let mut violations: Vec<ConstraintViolation> = problem
        .constraints(x)
        .into_iter()
        .enumerate()
        .filter(|(_, g)| g.abs() > threshold)
        .map(|(row, residual)| {
            let (family, index) = problem.cons().classify(row);
            let label = match family {
                ConstraintFamily::Utility | ConstraintFamily::Availability => {
                    format!("{}[node {}]", family, index)
                }
                ConstraintFamily::Flow => format!(
                    "{}[node {}, good {}]",
                    family,
                    index % n_nodes,
                    index / n_nodes
                ),
                ConstraintFamily::Labor => format!("{}[region {}]", family, index),
            };
            ConstraintViolation {
                row,
                family,
                label,
                residual,
            }
        })
        .collect();

    violations.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()));
    violations
}
