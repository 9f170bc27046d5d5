//! # Augmented-Lagrangian solver with L-BFGS inner loops
//!
//! Bundled backend that needs no native libraries. It solves
//!
//! ```text
//! minimize    f(x)
//! subject to  g(x) = g₀
//!             x_l ≤ x ≤ x_u
//! ```
//!
//! through a sequence of bound-free subproblems
//!
//! ```text
//! L_μ(z; λ) = f(x(z)) + λᵀ r(x(z)) + (μ/2)·‖r(x(z))‖²,     r = g − g₀
//! ```
//!
//! ## Bounds by reparametrization
//!
//! Every bounded variable is written as a smooth function of a free one, so
//! every trial point the line search visits is strictly inside the box and
//! the model's fractional powers never see a negative argument:
//!
//! ```text
//! lower only     x = x_l + softplus(z)                 dx/dz = sigmoid(z)
//! upper only     x = x_u − softplus(−z)                dx/dz = sigmoid(−z)
//! both           x = x_l + (x_u − x_l)·sigmoid(z)      dx/dz = (x_u − x_l)·s·(1 − s)
//! free           x = z                                 dx/dz = 1
//! ```
//!
//! ## Algorithm Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OUTER LOOP                                                              │
//! │                                                                          │
//! │    1. L-BFGS (More-Thuente, memory 7) on L_μ(·; λ) from the current z    │
//! │       gradient: ∇_z L_μ = (∇f + Jᵀ(λ + μ·r)) ⊙ dx/dz   (analytic)       │
//! │    2. λ ← λ + μ·r                                                        │
//! │    3. stop if ‖r‖∞ ≤ tol  and  ‖∇_z L(·; λ)‖∞ ≤ dual_tol                 │
//! │    4. μ ← min(γ·μ, μ_max) unless ‖r‖∞ shrank by at least 4×              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Multipliers returned follow the `f + λᵀg` convention, the same one IPOPT
//! uses, so recovery code does not care which backend produced them.
//!
//! The starting point is pushed into the interior first: each bounded
//! component is moved at least `bound_push·max(1, |bound|)` away from its
//! bound.

use super::config::SolverConfig;
use super::error::AllocationError;
use super::nlp::{
    lagrangian_gradient, max_constraint_violation, NlpBackend, NonlinearProgram, SolveOutcome,
    SolveStatus,
};
use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use web_time::Instant;

/// Above this, softplus(z) == z in f64.
const SOFTPLUS_CUTOFF: f64 = 20.0;

#[inline]
fn softplus(z: f64) -> f64 {
    if z > SOFTPLUS_CUTOFF {
        z
    } else {
        z.exp().ln_1p()
    }
}

#[inline]
fn softplus_inv(y: f64) -> f64 {
    if y > SOFTPLUS_CUTOFF {
        y
    } else {
        y.exp_m1().ln()
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ============================================================================
// BOUND TRANSFORM
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum VarMap {
    Free,
    Lower(f64),
    Upper(f64),
    Boxed(f64, f64),
}

/// Smooth bijection between free coordinates `z` and the open box.
#[derive(Debug, Clone)]
struct BoundTransform {
    maps: Vec<VarMap>,
}

impl BoundTransform {
    fn new(lb: &[f64], ub: &[f64]) -> Self {
        let maps = lb
            .iter()
            .zip(ub)
            .map(|(&l, &u)| match (l.is_finite(), u.is_finite()) {
                (false, false) => VarMap::Free,
                (true, false) => VarMap::Lower(l),
                (false, true) => VarMap::Upper(u),
                (true, true) => VarMap::Boxed(l, u),
            })
            .collect();
        Self { maps }
    }

    /// Move `x` strictly inside the box.
    fn push_inside(&self, x: &mut [f64], push: f64) {
        for (xi, map) in x.iter_mut().zip(&self.maps) {
            match *map {
                VarMap::Free => {}
                VarMap::Lower(l) => *xi = xi.max(l + push * l.abs().max(1.0)),
                VarMap::Upper(u) => *xi = xi.min(u - push * u.abs().max(1.0)),
                VarMap::Boxed(l, u) => {
                    let margin = (push * (u - l)).min(push * l.abs().max(1.0));
                    *xi = xi.max(l + margin).min(u - margin);
                }
            }
        }
    }

    fn to_x(&self, z: &[f64]) -> Vec<f64> {
        z.iter()
            .zip(&self.maps)
            .map(|(&zi, map)| match *map {
                VarMap::Free => zi,
                VarMap::Lower(l) => l + softplus(zi),
                VarMap::Upper(u) => u - softplus(-zi),
                VarMap::Boxed(l, u) => l + (u - l) * sigmoid(zi),
            })
            .collect()
    }

    fn to_z(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(&self.maps)
            .map(|(&xi, map)| match *map {
                VarMap::Free => xi,
                VarMap::Lower(l) => softplus_inv(xi - l),
                VarMap::Upper(u) => -softplus_inv(u - xi),
                VarMap::Boxed(l, u) => {
                    let t = (xi - l) / (u - l);
                    (t / (1.0 - t)).ln()
                }
            })
            .collect()
    }

    /// `dx/dz` elementwise.
    fn derivative(&self, z: &[f64]) -> Vec<f64> {
        z.iter()
            .zip(&self.maps)
            .map(|(&zi, map)| match *map {
                VarMap::Free => 1.0,
                VarMap::Lower(_) => sigmoid(zi),
                VarMap::Upper(_) => sigmoid(-zi),
                VarMap::Boxed(l, u) => {
                    let s = sigmoid(zi);
                    (u - l) * s * (1.0 - s)
                }
            })
            .collect()
    }
}

// ============================================================================
// INNER SUBPROBLEM
// ============================================================================

/// `L_μ(z; λ)` for one outer iteration.
struct AugmentedLagrangian<'a> {
    problem: &'a dyn NonlinearProgram,
    transform: &'a BoundTransform,
    target: &'a [f64],
    lambda: &'a [f64],
    penalty: f64,
    /// Lowest finite cost seen, kept in case the line search aborts the run
    best: &'a Mutex<Option<(f64, Vec<f64>)>>,
}

impl<'a> AugmentedLagrangian<'a> {
    fn residual(&self, x: &[f64]) -> Vec<f64> {
        let mut r = self.problem.constraints(x);
        for (ri, ti) in r.iter_mut().zip(self.target) {
            *ri -= ti;
        }
        r
    }

    fn record(&self, cost: f64, z: &[f64]) {
        if let Ok(mut best) = self.best.lock() {
            let improves = best.as_ref().map_or(true, |(c, _)| cost < *c);
            if improves {
                *best = Some((cost, z.to_vec()));
            }
        }
    }
}

impl<'a> CostFunction for AugmentedLagrangian<'a> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, z: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let x = self.transform.to_x(z);
        let r = self.residual(&x);
        let cost = self.problem.objective(&x)
            + r.iter()
                .zip(self.lambda)
                .map(|(ri, li)| li * ri + 0.5 * self.penalty * ri * ri)
                .sum::<f64>();
        if !cost.is_finite() {
            anyhow::bail!("augmented Lagrangian is not finite");
        }
        self.record(cost, z);
        Ok(cost)
    }
}

impl<'a> Gradient for AugmentedLagrangian<'a> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// `(∇f + Jᵀ(λ + μ·r)) ⊙ dx/dz`
    fn gradient(&self, z: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        let x = self.transform.to_x(z);
        let r = self.residual(&x);
        let weights: Vec<f64> = r
            .iter()
            .zip(self.lambda)
            .map(|(ri, li)| li + self.penalty * ri)
            .collect();
        let mut grad = lagrangian_gradient(self.problem, &x, 1.0, &weights)?;
        for (gi, di) in grad.iter_mut().zip(self.transform.derivative(z)) {
            *gi *= di;
        }
        Ok(grad)
    }
}

// ============================================================================
// BACKEND
// ============================================================================

/// Bundled backend.
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangianBackend {
    config: SolverConfig,
}

impl AugmentedLagrangianBackend {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl NlpBackend for AugmentedLagrangianBackend {
    fn id(&self) -> &str {
        "augmented-lagrangian"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn solve(
        &self,
        problem: &dyn NonlinearProgram,
        start: Option<&[f64]>,
    ) -> Result<SolveOutcome, AllocationError> {
        solve_augmented_lagrangian(problem, start, &self.config)
    }
}

/// Run the augmented-Lagrangian method.
pub fn solve_augmented_lagrangian(
    problem: &dyn NonlinearProgram,
    start: Option<&[f64]>,
    config: &SolverConfig,
) -> Result<SolveOutcome, AllocationError> {
    let start_time = Instant::now();
    let n_var = problem.num_variables();
    let n_con = problem.num_constraints();

    let (lb, ub) = problem.variable_bounds();
    let (g_l, g_u) = problem.constraint_bounds();
    if g_l.iter().zip(&g_u).any(|(lo, hi)| lo != hi) {
        return Err(AllocationError::Unsupported(
            "augmented-Lagrangian backend handles equality constraints only".into(),
        ));
    }

    let mut x0 = match start {
        Some(seed) => seed.to_vec(),
        None => problem.initial_point(),
    };
    AllocationError::check_len("initial point", n_var, x0.len())?;

    let transform = BoundTransform::new(&lb, &ub);
    transform.push_inside(&mut x0, config.bound_push);
    let mut z = transform.to_z(&x0);

    let mut lambda = vec![0.0; n_con];
    let mut penalty = config.penalty_initial;
    let mut prev_violation = max_constraint_violation(&problem.constraints(&x0), &g_l, &g_u);
    let mut iterations = 0usize;
    let mut status = SolveStatus::MaxIterations;
    let mut violation = prev_violation;
    let mut dual = f64::INFINITY;

    // ========================================================================
    // OUTER LOOP
    // ========================================================================

    for outer in 0..config.max_outer_iterations {
        let remaining = config.max_iterations.saturating_sub(iterations);
        if remaining == 0 {
            break;
        }
        let inner_cap = remaining.min(config.inner_iterations).max(1);

        let best = Mutex::new(None);
        let subproblem = AugmentedLagrangian {
            problem,
            transform: &transform,
            target: &g_l,
            lambda: &lambda,
            penalty,
            best: &best,
        };

        let linesearch = MoreThuenteLineSearch::new();
        let lbfgs = LBFGS::new(linesearch, config.lbfgs_memory);
        let result = Executor::new(subproblem, lbfgs)
            .configure(|state| state.param(z.clone()).max_iters(inner_cap as u64))
            .run();

        match result {
            Ok(res) => {
                iterations += res.state().get_iter() as usize;
                if let Some(best_z) = res.state().get_best_param() {
                    z = best_z.clone();
                }
            }
            Err(err) => {
                // Line search gave up; keep the best point it evaluated
                warn!(outer, error = %err, "inner L-BFGS stopped early");
                iterations += 1;
                if let Some((_, best_z)) = best.lock().ok().and_then(|mut b| b.take()) {
                    z = best_z;
                }
            }
        }

        // ====================================================================
        // MULTIPLIER AND PENALTY UPDATE
        // ====================================================================

        let x = transform.to_x(&z);
        let g = problem.constraints(&x);
        violation = max_constraint_violation(&g, &g_l, &g_u);
        for ((li, gi), ti) in lambda.iter_mut().zip(&g).zip(&g_l) {
            *li += penalty * (gi - ti);
        }

        let dxdz = transform.derivative(&z);
        dual = lagrangian_gradient(problem, &x, 1.0, &lambda)?
            .iter()
            .zip(&dxdz)
            .map(|(gi, di)| (gi * di).abs())
            .fold(0.0, f64::max);

        debug!(
            outer,
            iterations,
            penalty,
            violation,
            dual,
            objective = problem.objective(&x),
            "augmented-Lagrangian outer iteration"
        );

        if violation <= config.tolerance && dual <= config.dual_tolerance {
            status = SolveStatus::Converged;
            break;
        }
        if violation > 0.25 * prev_violation {
            penalty = (penalty * config.penalty_growth).min(config.penalty_max);
        }
        prev_violation = violation;
    }

    if status != SolveStatus::Converged
        && violation <= 10.0 * config.tolerance
        && dual <= 10.0 * config.dual_tolerance
    {
        status = SolveStatus::Acceptable;
    }

    let x = transform.to_x(&z);
    let objective = problem.objective(&x);
    if status.is_success() {
        info!(%status, iterations, objective, violation, "augmented-Lagrangian solve finished");
    } else {
        warn!(%status, iterations, objective, violation, dual, "augmented-Lagrangian solve did not converge");
    }

    Ok(SolveOutcome {
        status,
        x,
        multipliers: lambda,
        objective,
        max_violation: violation,
        iterations,
        solve_time_ms: start_time.elapsed().as_millis(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::sparsity::SparsityPattern;

    /// min (x−2)² + (y−1)²  s.t.  x + y = 1,  y ≥ 0.5
    struct Toy {
        jac: SparsityPattern,
        hess: SparsityPattern,
    }

    impl Toy {
        fn new() -> Self {
            let mut j = SparsityPattern::builder(1, 2);
            j.insert(0, 0).insert(0, 1);
            let mut h = SparsityPattern::lower_triangular(2);
            h.insert(0, 0).insert(1, 1);
            Self {
                jac: j.build().unwrap(),
                hess: h.build().unwrap(),
            }
        }
    }

    impl NonlinearProgram for Toy {
        fn num_variables(&self) -> usize {
            2
        }
        fn num_constraints(&self) -> usize {
            1
        }
        fn variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
            (vec![f64::NEG_INFINITY, 0.5], vec![f64::INFINITY; 2])
        }
        fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
            (vec![1.0], vec![1.0])
        }
        fn initial_point(&self) -> Vec<f64> {
            vec![0.0, 1.0]
        }
        fn objective(&self, x: &[f64]) -> f64 {
            (x[0] - 2.0).powi(2) + (x[1] - 1.0).powi(2)
        }
        fn objective_gradient(&self, x: &[f64]) -> Vec<f64> {
            vec![2.0 * (x[0] - 2.0), 2.0 * (x[1] - 1.0)]
        }
        fn constraints(&self, x: &[f64]) -> Vec<f64> {
            vec![x[0] + x[1]]
        }
        fn jacobian_pattern(&self) -> &SparsityPattern {
            &self.jac
        }
        fn jacobian_values(&self, _x: &[f64]) -> Result<Vec<f64>, AllocationError> {
            Ok(vec![1.0, 1.0])
        }
        fn hessian_pattern(&self) -> &SparsityPattern {
            &self.hess
        }
        fn hessian_values(
            &self,
            _x: &[f64],
            obj_factor: f64,
            _lambda: &[f64],
        ) -> Result<Vec<f64>, AllocationError> {
            Ok(vec![2.0 * obj_factor, 2.0 * obj_factor])
        }
    }

    #[test]
    fn test_softplus_roundtrip() {
        for y in [1e-8, 1e-3, 0.5, 3.0, 50.0] {
            let back = softplus(softplus_inv(y));
            assert!((back - y).abs() <= 1e-9 * y.max(1.0), "y={y} back={back}");
        }
    }

    #[test]
    fn test_transform_stays_inside_bounds() {
        let lb = [0.0, f64::NEG_INFINITY, -1.0, 1e-8];
        let ub = [f64::INFINITY, 2.0, 1.0, f64::INFINITY];
        let t = BoundTransform::new(&lb, &ub);
        for z in [-40.0, -3.0, 0.0, 3.0, 40.0] {
            let x = t.to_x(&[z; 4]);
            assert!(x[0] >= 0.0);
            assert!(x[1] <= 2.0);
            assert!(x[2] >= -1.0 && x[2] <= 1.0);
            assert!(x[3] >= 1e-8);
        }
    }

    #[test]
    fn test_transform_derivative_matches_fd() {
        let lb = [0.0, f64::NEG_INFINITY, -1.0];
        let ub = [f64::INFINITY, 2.0, 1.0];
        let t = BoundTransform::new(&lb, &ub);
        let z = [0.3, -0.7, 1.1];
        let d = t.derivative(&z);
        let h = 1e-6;
        for i in 0..3 {
            let mut zp = z;
            let mut zm = z;
            zp[i] += h;
            zm[i] -= h;
            let fd = (t.to_x(&zp)[i] - t.to_x(&zm)[i]) / (2.0 * h);
            assert!((fd - d[i]).abs() < 1e-7, "component {i}");
        }
    }

    #[test]
    fn test_push_inside() {
        let t = BoundTransform::new(&[1e-8, f64::NEG_INFINITY], &[f64::INFINITY, f64::INFINITY]);
        let mut x = vec![1e-6, -5.0];
        t.push_inside(&mut x, 1e-2);
        assert!((x[0] - (1e-8 + 1e-2)).abs() < 1e-15);
        assert_eq!(x[1], -5.0);
    }

    #[test]
    fn test_solves_equality_constrained_quadratic() {
        let toy = Toy::new();
        let outcome = solve_augmented_lagrangian(&toy, None, &SolverConfig::default()).unwrap();
        assert!(outcome.status.is_success(), "status: {}", outcome.status);
        // Optimum x=1, y=0 is cut off by y ≥ 0.5 → x=0.5, y=0.5
        assert!((outcome.x[0] - 0.5).abs() < 1e-3, "x = {:?}", outcome.x);
        assert!((outcome.x[1] - 0.5).abs() < 1e-3, "x = {:?}", outcome.x);
        assert!(outcome.max_violation < 1e-6);
        // ∂f/∂x + λ = 0 → λ = 3
        assert!((outcome.multipliers[0] - 3.0).abs() < 1e-2);
    }

    #[test]
    fn test_rejects_inequality_rows() {
        struct Ranged(Toy);
        impl NonlinearProgram for Ranged {
            fn num_variables(&self) -> usize {
                2
            }
            fn num_constraints(&self) -> usize {
                1
            }
            fn variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
                self.0.variable_bounds()
            }
            fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
                (vec![0.0], vec![1.0])
            }
            fn initial_point(&self) -> Vec<f64> {
                self.0.initial_point()
            }
            fn objective(&self, x: &[f64]) -> f64 {
                self.0.objective(x)
            }
            fn objective_gradient(&self, x: &[f64]) -> Vec<f64> {
                self.0.objective_gradient(x)
            }
            fn constraints(&self, x: &[f64]) -> Vec<f64> {
                self.0.constraints(x)
            }
            fn jacobian_pattern(&self) -> &SparsityPattern {
                self.0.jacobian_pattern()
            }
            fn jacobian_values(&self, x: &[f64]) -> Result<Vec<f64>, AllocationError> {
                self.0.jacobian_values(x)
            }
            fn hessian_pattern(&self) -> &SparsityPattern {
                self.0.hessian_pattern()
            }
            fn hessian_values(
                &self,
                x: &[f64],
                f: f64,
                l: &[f64],
            ) -> Result<Vec<f64>, AllocationError> {
                self.0.hessian_values(x, f, l)
            }
        }

        let err = solve_augmented_lagrangian(&Ranged(Toy::new()), None, &SolverConfig::default())
            .unwrap_err();
        assert!(matches!(err, AllocationError::Unsupported(_)));
    }
}
