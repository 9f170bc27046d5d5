//! Solver-facing traits.
//!
//! [`NonlinearProgram`] is the callback contract between a problem and a
//! solver: sizes, bounds, a starting point, and five evaluation callbacks.
//! Sparse structures are declared once through [`SparsityPattern`]; values
//! are always returned in pattern order.
//!
//! [`NlpBackend`] implements the solving. Backends only see the trait, so
//! they work for any program, not just the spatial allocation model.

use super::error::AllocationError;
use super::problem::AllocationProblem;
use super::sparsity::SparsityPattern;
use serde::{Deserialize, Serialize};

/// Callback contract of a smooth equality/bound-constrained NLP
///
/// ```text
/// min f(x)   s.t.   g_l ≤ g(x) ≤ g_u,   x_l ≤ x ≤ x_u
/// ```
///
/// Multipliers follow the `L = σ_f·f + λᵀg` convention.
pub trait NonlinearProgram: Send + Sync {
    fn num_variables(&self) -> usize;
    fn num_constraints(&self) -> usize;

    /// `(x_l, x_u)`; unbounded entries are ±∞.
    fn variable_bounds(&self) -> (Vec<f64>, Vec<f64>);

    /// `(g_l, g_u)`.
    fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>);

    fn initial_point(&self) -> Vec<f64>;

    fn objective(&self, x: &[f64]) -> f64;
    fn objective_gradient(&self, x: &[f64]) -> Vec<f64>;
    fn constraints(&self, x: &[f64]) -> Vec<f64>;

    fn jacobian_pattern(&self) -> &SparsityPattern;
    fn jacobian_values(&self, x: &[f64]) -> Result<Vec<f64>, AllocationError>;

    /// Lower triangle of the Lagrangian Hessian.
    fn hessian_pattern(&self) -> &SparsityPattern;
    fn hessian_values(
        &self,
        x: &[f64],
        obj_factor: f64,
        lambda: &[f64],
    ) -> Result<Vec<f64>, AllocationError>;
}

impl NonlinearProgram for AllocationProblem {
    fn num_variables(&self) -> usize {
        self.n_var()
    }

    fn num_constraints(&self) -> usize {
        self.n_con()
    }

    fn variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        AllocationProblem::variable_bounds(self)
    }

    fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        AllocationProblem::constraint_bounds(self)
    }

    fn initial_point(&self) -> Vec<f64> {
        AllocationProblem::initial_point(self)
    }

    fn objective(&self, x: &[f64]) -> f64 {
        AllocationProblem::objective(self, x)
    }

    fn objective_gradient(&self, x: &[f64]) -> Vec<f64> {
        AllocationProblem::objective_gradient(self, x)
    }

    fn constraints(&self, x: &[f64]) -> Vec<f64> {
        AllocationProblem::constraints(self, x)
    }

    fn jacobian_pattern(&self) -> &SparsityPattern {
        AllocationProblem::jacobian_pattern(self)
    }

    fn jacobian_values(&self, x: &[f64]) -> Result<Vec<f64>, AllocationError> {
        AllocationProblem::jacobian_values(self, x)
    }

    fn hessian_pattern(&self) -> &SparsityPattern {
        AllocationProblem::hessian_pattern(self)
    }

    fn hessian_values(
        &self,
        x: &[f64],
        obj_factor: f64,
        lambda: &[f64],
    ) -> Result<Vec<f64>, AllocationError> {
        AllocationProblem::hessian_values(self, x, obj_factor, lambda)
    }
}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Feasibility and stationarity within tolerance
    Converged,
    /// Within a relaxed tolerance
    Acceptable,
    /// Iteration budget exhausted before convergence
    MaxIterations,
    /// Solver reports the constraints cannot be satisfied
    Infeasible,
    /// Solver stopped on a numerical failure
    NumericalFailure,
}

impl SolveStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, SolveStatus::Converged | SolveStatus::Acceptable)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SolveStatus::Converged => "converged",
            SolveStatus::Acceptable => "acceptable",
            SolveStatus::MaxIterations => "max iterations",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::NumericalFailure => "numerical failure",
        };
        f.write_str(s)
    }
}

/// Final iterate of a solve, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub x: Vec<f64>,
    /// One multiplier per constraint row
    pub multipliers: Vec<f64>,
    pub objective: f64,
    /// `max |g(x) − bound|` at the returned point
    pub max_violation: f64,
    pub iterations: usize,
    pub solve_time_ms: u128,
}

/// Implements the actual solving.
pub trait NlpBackend: Send + Sync {
    /// Unique identifier (e.g., "augmented-lagrangian", "ipopt")
    fn id(&self) -> &str;

    /// Check if this backend is available at runtime
    fn is_available(&self) -> bool;

    /// Solve from `start`, or from the program's own initial point.
    fn solve(
        &self,
        problem: &dyn NonlinearProgram,
        start: Option<&[f64]>,
    ) -> Result<SolveOutcome, AllocationError>;
}

/// `σ_f·∇f(x) + J(x)ᵀλ`
pub fn lagrangian_gradient(
    problem: &dyn NonlinearProgram,
    x: &[f64],
    obj_factor: f64,
    lambda: &[f64],
) -> Result<Vec<f64>, AllocationError> {
    let mut grad: Vec<f64> = problem
        .objective_gradient(x)
        .into_iter()
        .map(|g| obj_factor * g)
        .collect();
    let values = problem.jacobian_values(x)?;
    let pattern = problem.jacobian_pattern();
    for ((&row, &col), v) in pattern.rows().iter().zip(pattern.cols()).zip(values) {
        grad[col] += v * lambda[row];
    }
    Ok(grad)
}

/// Largest equality/range violation `max_i dist(g_i, [g_l, g_u])`.
pub fn max_constraint_violation(g: &[f64], g_l: &[f64], g_u: &[f64]) -> f64 {
    g.iter()
        .zip(g_l.iter().zip(g_u))
        .map(|(&gi, (&lo, &hi))| (lo - gi).max(gi - hi).max(0.0))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// This test passes if it compiles - traits must be object-safe
    #[test]
    fn test_traits_are_object_safe() {
        fn _accepts_program(_p: &dyn NonlinearProgram) {}
        fn _accepts_backend(_b: &dyn NlpBackend) {}
    }

    #[test]
    fn test_traits_are_send_sync() {
        fn _assert_send<T: Send>() {}
        fn _assert_sync<T: Sync>() {}

        _assert_send::<Box<dyn NonlinearProgram>>();
        _assert_sync::<Box<dyn NonlinearProgram>>();
        _assert_send::<Box<dyn NlpBackend>>();
        _assert_sync::<Box<dyn NlpBackend>>();
        _assert_sync::<AllocationProblem>();
    }

    #[test]
    fn test_status_success() {
        assert!(SolveStatus::Converged.is_success());
        assert!(SolveStatus::Acceptable.is_success());
        assert!(!SolveStatus::MaxIterations.is_success());
        assert_eq!(SolveStatus::Infeasible.to_string(), "infeasible");
    }

    #[test]
    fn test_max_violation() {
        let v = max_constraint_violation(&[0.1, -0.3, 2.0], &[0.0, 0.0, 1.0], &[0.0, 0.0, 3.0]);
        assert!((v - 0.3).abs() < 1e-12);
    }
}
