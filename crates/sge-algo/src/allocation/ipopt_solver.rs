//! IPOPT backend
//!
//! Hands any [`NonlinearProgram`] to the IPOPT interior-point solver with
//! the exact Hessian. Infinite bounds are passed as ±1e20, IPOPT's own
//! convention for "no bound".

#![cfg(feature = "solver-ipopt")]

use super::config::SolverConfig;
use super::error::AllocationError;
use super::nlp::{max_constraint_violation, NlpBackend, NonlinearProgram, SolveOutcome, SolveStatus};
use ipopt::{
    BasicProblem, ConstrainedProblem, Index, IntermediateCallbackData, Ipopt, Number,
    SolveStatus as IpoptStatus,
};
use tracing::{debug, info, warn};
use web_time::Instant;

/// IPOPT's "infinity".
const IPOPT_INF: f64 = 1e20;

fn clamp_infinite(v: f64) -> f64 {
    v.clamp(-IPOPT_INF, IPOPT_INF)
}

/// IPOPT problem wrapper over a [`NonlinearProgram`].
pub struct IpoptAllocation<'a> {
    problem: &'a dyn NonlinearProgram,
    x0: Vec<f64>,
    /// Updated by the intermediate callback
    iterations: usize,
}

impl<'a> IpoptAllocation<'a> {
    pub fn new(problem: &'a dyn NonlinearProgram, x0: Vec<f64>) -> Self {
        Self {
            problem,
            x0,
            iterations: 0,
        }
    }
}

fn count_iteration(nlp: &mut IpoptAllocation<'_>, data: IntermediateCallbackData) -> bool {
    nlp.iterations = data.iter_count.max(0) as usize;
    true
}

impl<'a> BasicProblem for IpoptAllocation<'a> {
    fn num_variables(&self) -> usize {
        self.problem.num_variables()
    }

    fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool {
        let (lb, ub) = self.problem.variable_bounds();
        for (dst, src) in x_l.iter_mut().zip(lb) {
            *dst = clamp_infinite(src);
        }
        for (dst, src) in x_u.iter_mut().zip(ub) {
            *dst = clamp_infinite(src);
        }
        true
    }

    fn initial_point(&self, x: &mut [Number]) -> bool {
        x.copy_from_slice(&self.x0);
        true
    }

    fn objective(&self, x: &[Number], obj: &mut Number) -> bool {
        *obj = self.problem.objective(x);
        obj.is_finite()
    }

    fn objective_grad(&self, x: &[Number], grad_f: &mut [Number]) -> bool {
        grad_f.copy_from_slice(&self.problem.objective_gradient(x));
        true
    }
}

impl<'a> ConstrainedProblem for IpoptAllocation<'a> {
    fn num_constraints(&self) -> usize {
        self.problem.num_constraints()
    }

    fn num_constraint_jacobian_non_zeros(&self) -> usize {
        self.problem.jacobian_pattern().nnz()
    }

    fn constraint_bounds(&self, g_l: &mut [Number], g_u: &mut [Number]) -> bool {
        let (lo, hi) = self.problem.constraint_bounds();
        for (dst, src) in g_l.iter_mut().zip(lo) {
            *dst = clamp_infinite(src);
        }
        for (dst, src) in g_u.iter_mut().zip(hi) {
            *dst = clamp_infinite(src);
        }
        true
    }

    fn constraint(&self, x: &[Number], g: &mut [Number]) -> bool {
        g.copy_from_slice(&self.problem.constraints(x));
        true
    }

    fn constraint_jacobian_indices(&self, irow: &mut [Index], jcol: &mut [Index]) -> bool {
        let pattern = self.problem.jacobian_pattern();
        for (k, (&r, &c)) in pattern.rows().iter().zip(pattern.cols()).enumerate() {
            irow[k] = r as Index;
            jcol[k] = c as Index;
        }
        true
    }

    fn constraint_jacobian_values(&self, x: &[Number], vals: &mut [Number]) -> bool {
        match self.problem.jacobian_values(x) {
            Ok(values) => {
                vals.copy_from_slice(&values);
                true
            }
            Err(e) => {
                warn!("jacobian evaluation failed: {}", e);
                false
            }
        }
    }

    fn num_hessian_non_zeros(&self) -> usize {
        self.problem.hessian_pattern().nnz()
    }

    fn hessian_indices(&self, irow: &mut [Index], jcol: &mut [Index]) -> bool {
        let pattern = self.problem.hessian_pattern();
        for (k, (&r, &c)) in pattern.rows().iter().zip(pattern.cols()).enumerate() {
            irow[k] = r as Index;
            jcol[k] = c as Index;
        }
        true
    }

    fn hessian_values(
        &self,
        x: &[Number],
        obj_factor: Number,
        lambda: &[Number],
        vals: &mut [Number],
    ) -> bool {
        match self.problem.hessian_values(x, obj_factor, lambda) {
            Ok(values) => {
                vals.copy_from_slice(&values);
                true
            }
            Err(e) => {
                warn!("hessian evaluation failed: {}", e);
                false
            }
        }
    }
}

fn map_status(status: IpoptStatus) -> SolveStatus {
    match status {
        IpoptStatus::SolveSucceeded => SolveStatus::Converged,
        IpoptStatus::SolvedToAcceptableLevel | IpoptStatus::FeasiblePointFound => {
            SolveStatus::Acceptable
        }
        IpoptStatus::InfeasibleProblemDetected => SolveStatus::Infeasible,
        IpoptStatus::MaximumIterationsExceeded | IpoptStatus::MaximumCpuTimeExceeded => {
            SolveStatus::MaxIterations
        }
        _ => SolveStatus::NumericalFailure,
    }
}

/// IPOPT takes `max_iter` as a C int; larger budgets saturate.
fn ipopt_max_iter(max_iterations: usize) -> i32 {
    i32::try_from(max_iterations).unwrap_or(i32::MAX)
}

/// IPOPT with exact second derivatives.
#[derive(Debug, Clone, Default)]
pub struct IpoptBackend {
    config: SolverConfig,
}

impl IpoptBackend {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl NlpBackend for IpoptBackend {
    fn id(&self) -> &str {
        "ipopt"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn solve(
        &self,
        problem: &dyn NonlinearProgram,
        start: Option<&[f64]>,
    ) -> Result<SolveOutcome, AllocationError> {
        let start_time = Instant::now();
        let x0 = match start {
            Some(x) => {
                AllocationError::check_len("start", problem.num_variables(), x.len())?;
                x.to_vec()
            }
            None => problem.initial_point(),
        };

        let mut solver = Ipopt::new(IpoptAllocation::new(problem, x0))
            .map_err(|e| AllocationError::NumericalIssue(format!("IPOPT init failed: {}", e)))?;

        solver.set_option("max_iter", ipopt_max_iter(self.config.max_iterations));
        solver.set_option("tol", self.config.tolerance);
        solver.set_option("constr_viol_tol", self.config.tolerance);
        solver.set_option("print_level", self.config.print_level);
        solver.set_option("sb", "yes");
        solver.set_option("bound_push", self.config.bound_push);
        solver.set_option("hessian_approximation", "exact");
        solver.set_intermediate_callback(Some(count_iteration));

        let result = solver.solve();
        let status = map_status(result.status);
        let x = result.solver_data.solution.primal_variables.to_vec();
        let multipliers = result.solver_data.solution.constraint_multipliers.to_vec();
        let iterations = result.solver_data.problem.iterations;
        debug!(ipopt_status = ?result.status, iterations, "ipopt returned");

        let (g_l, g_u) = problem.constraint_bounds();
        let max_violation = max_constraint_violation(&problem.constraints(&x), &g_l, &g_u);
        let outcome = SolveOutcome {
            status,
            objective: problem.objective(&x),
            x,
            multipliers,
            max_violation,
            iterations,
            solve_time_ms: start_time.elapsed().as_millis(),
        };

        if status.is_success() {
            info!(
                objective = outcome.objective,
                iterations, "ipopt finished: {}", status
            );
        } else {
            warn!(
                max_violation,
                iterations, "ipopt stopped without convergence: {}", status
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::problem::AllocationProblem;
    use sge_core::{ModelParams, Topology};

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status(IpoptStatus::SolveSucceeded), SolveStatus::Converged);
        assert_eq!(
            map_status(IpoptStatus::InfeasibleProblemDetected),
            SolveStatus::Infeasible
        );
        assert_eq!(
            map_status(IpoptStatus::MaximumIterationsExceeded),
            SolveStatus::MaxIterations
        );
    }

    #[test]
    fn test_iteration_budget_saturates() {
        assert_eq!(ipopt_max_iter(3000), 3000);
        assert_eq!(ipopt_max_iter(usize::MAX), i32::MAX);
        assert_eq!(ipopt_max_iter(i32::MAX as usize + 1), i32::MAX);
    }

    #[test]
    fn test_wrapper_sizes() {
        let topo = Topology::line(2).unwrap().with_regions(vec![0, 1]).unwrap();
        let params = ModelParams::new(vec![vec![2.0], vec![1.0]], vec![1.0, 1.0]);
        let problem = AllocationProblem::new(topo, params).unwrap();
        let wrapper = IpoptAllocation::new(&problem, problem.initial_point());
        assert_eq!(BasicProblem::num_variables(&wrapper), problem.n_var());
        assert_eq!(
            wrapper.num_constraint_jacobian_non_zeros(),
            problem.jacobian_pattern().nnz()
        );
    }
}
