//! # Analytical Hessian of the Lagrangian
//!
//! ```text
//! H(x, σ_f, λ) = σ_f·∇²f(x) + Σᵢ λᵢ·∇²gᵢ(x)
//! ```
//!
//! The objective is linear, so `σ_f` never contributes. Curvature comes from
//! four constraint families:
//!
//! ```text
//!              │  ur  │  Cj   │  Djn          │ Qdirect      │ Qindirect    │  Lj
//!   ───────────┼──────┼───────┼───────────────┼──────────────┼──────────────┼──────
//!     ur       │      │       │               │              │              │
//!     Cj       │      │ diag  │               │              │              │
//!     Djn      │      │       │ N×N per node  │              │              │
//!     Qdirect  │      │       │               │ N×N per edge │              │
//!     Qindirect│      │       │               │              │ N×N per edge │
//!     Lj       │ λ_u  │       │               │              │              │ diag
//! ```
//!
//! - **(Lj, ur)**: bilinear term `Lⱼ·ur` of the utility row → `λ_util,j`
//! - **Cj diag**: `λ_util,j · ((1−α)/α)·(Cⱼ/α)^(α−2)·Kⱼ`
//! - **Djn block**: `−λ_avail,j · ∂²Dⱼ/∂Dⱼₙ∂Dⱼₘ`
//! - **Q blocks**: `λ_avail` at the paying endpoint times `∂²cₑ/∂Qₙ∂Qₘ`
//!   (origin for direct flows, destination for indirect flows)
//! - **Lj diag**: `−Σₙ λ_flow,jn · a(a−1)·Zⱼₙ·Lⱼ^(a−2)`
//!
//! Only the lower triangle is stored. Dense blocks are added into the slot
//! map, so terms that share a slot sum.
//!
//! Nonzero count: `3J + J·N(N+1)/2 + 2E·N(N+1)/2`.

use super::error::AllocationError;
use super::layout::VariableLayout;
use super::model_functions::{ces_curvature, cobb_douglas_curvature, production_curvature};
use super::problem::AllocationProblem;
use super::sparsity::SparsityPattern;
use sge_core::Topology;

pub fn hessian_nnz(vars: &VariableLayout) -> usize {
    let (j, n, e) = (vars.n_nodes, vars.n_goods, vars.n_edges);
    let tri = n * (n + 1) / 2;
    3 * j + j * tri + 2 * e * tri
}

/// Declare the lower-triangular Hessian structure.
pub fn hessian_sparsity(
    vars: &VariableLayout,
    topology: &Topology,
) -> Result<SparsityPattern, AllocationError> {
    let mut b = SparsityPattern::lower_triangular(vars.n_var);

    // ========================================================================
    // BLOCK 1: Lj-ur cross terms (utility rows)
    // ========================================================================

    for j in 0..vars.n_nodes {
        b.insert(vars.lj(j), vars.ur(topology.region_of(j)));
    }

    // ========================================================================
    // BLOCK 2: Cj diagonal (utility rows)
    // ========================================================================

    for j in 0..vars.n_nodes {
        b.insert(vars.cj(j), vars.cj(j));
    }

    // ========================================================================
    // BLOCK 3: Djn dense blocks (availability rows, CES aggregate)
    // ========================================================================

    for j in 0..vars.n_nodes {
        for n in 0..vars.n_goods {
            for m in 0..=n {
                b.insert(vars.djn(j, n), vars.djn(j, m));
            }
        }
    }

    // ========================================================================
    // BLOCK 4: Q dense blocks (availability rows, congestion cost)
    // ========================================================================

    for e in 0..vars.n_edges {
        for n in 0..vars.n_goods {
            for m in 0..=n {
                b.insert(vars.q_direct(e, n), vars.q_direct(e, m));
            }
        }
    }
    for e in 0..vars.n_edges {
        for n in 0..vars.n_goods {
            for m in 0..=n {
                b.insert(vars.q_indirect(e, n), vars.q_indirect(e, m));
            }
        }
    }

    // ========================================================================
    // BLOCK 5: Lj diagonal (flow rows, production)
    // ========================================================================

    for j in 0..vars.n_nodes {
        b.insert(vars.lj(j), vars.lj(j));
    }

    b.build()
}

/// Hessian of the Lagrangian in pattern order.
///
/// `lambda` holds one multiplier per constraint row, in constraint order.
pub fn hessian_values(
    problem: &AllocationProblem,
    x: &[f64],
    _obj_factor: f64,
    lambda: &[f64],
) -> Result<Vec<f64>, AllocationError> {
    AllocationError::check_len("x", problem.n_var(), x.len())?;
    AllocationError::check_len("lambda", problem.n_con(), lambda.len())?;

    let vars = problem.vars();
    let cons = problem.cons();
    let p = problem.params();
    let topo = problem.topology();
    let view = vars.view(x);
    let mut acc = problem.hessian_pattern().accumulator();

    for j in 0..vars.n_nodes {
        let lambda_u = lambda[cons.utility(j)];

        // ∂²(Lⱼ·ur)/∂Lⱼ∂ur
        acc.add(vars.lj(j), vars.ur(topo.region_of(j)), lambda_u);

        // −∂²U/∂Cⱼ²
        acc.add(
            vars.cj(j),
            vars.cj(j),
            -lambda_u * cobb_douglas_curvature(view.cj[j], problem.housing_factor(j), p.alpha),
        );
    }

    for j in 0..vars.n_nodes {
        let lambda_c = lambda[cons.availability(j)];
        let aggregate = problem.node_aggregate(&view, j);
        for n in 0..vars.n_goods {
            for m in 0..=n {
                let curv = ces_curvature(
                    aggregate,
                    view.djn(j, n),
                    view.djn(j, m),
                    n == m,
                    p.sigma,
                );
                acc.add(vars.djn(j, n), vars.djn(j, m), -lambda_c * curv);
            }
        }
    }

    for (e, &(origin, destination)) in topo.edges().iter().enumerate() {
        let cong = problem.congestion(e);
        let (s_direct, s_indirect) = problem.edge_power_sums(&view, e);
        let w_direct = lambda[cons.availability(origin)];
        let w_indirect = lambda[cons.availability(destination)];

        for n in 0..vars.n_goods {
            for m in 0..=n {
                let (m_n, m_m) = (p.goods_weights[n], p.goods_weights[m]);
                let direct = cong.curvature(
                    s_direct,
                    view.q_direct(e, n),
                    view.q_direct(e, m),
                    m_n,
                    m_m,
                    n == m,
                );
                acc.add(vars.q_direct(e, n), vars.q_direct(e, m), w_direct * direct);

                let indirect = cong.curvature(
                    s_indirect,
                    view.q_indirect(e, n),
                    view.q_indirect(e, m),
                    m_n,
                    m_m,
                    n == m,
                );
                acc.add(
                    vars.q_indirect(e, n),
                    vars.q_indirect(e, m),
                    w_indirect * indirect,
                );
            }
        }
    }

    for j in 0..vars.n_nodes {
        let curvature: f64 = (0..vars.n_goods)
            .map(|n| lambda[cons.flow(j, n)] * production_curvature(p.z(j, n), view.lj[j], p.a))
            .sum();
        acc.add(vars.lj(j), vars.lj(j), -curvature);
    }

    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sge_core::ModelParams;

    fn problem(n_goods: usize) -> AllocationProblem {
        let topo = Topology::line(3).unwrap();
        let productivity = (0..3)
            .map(|j| {
                let mut row = vec![0.0; n_goods];
                row[j % n_goods] = 1.0 + j as f64;
                row
            })
            .collect();
        AllocationProblem::new(topo, ModelParams::new(productivity, vec![3.0])).unwrap()
    }

    #[test]
    fn test_nnz_formula() {
        for n_goods in [1, 2, 3] {
            let problem = problem(n_goods);
            let tri = n_goods * (n_goods + 1) / 2;
            let expected = 3 * 3 + 3 * tri + 2 * 2 * tri;
            assert_eq!(problem.hessian_pattern().nnz(), expected, "N = {n_goods}");
            assert_eq!(hessian_nnz(problem.vars()), expected);
        }
    }

    #[test]
    fn test_pattern_is_lower_triangular() {
        let problem = problem(2);
        let pattern = problem.hessian_pattern();
        assert!(pattern.is_lower_triangular());
        for (&r, &c) in pattern.rows().iter().zip(pattern.cols()) {
            assert!(r >= c, "entry ({r}, {c}) above diagonal");
        }
    }

    #[test]
    fn test_zero_multipliers_give_zero_hessian() {
        let problem = problem(2);
        let x = problem.initial_point();
        let lambda = vec![0.0; problem.n_con()];
        let vals = problem.hessian_values(&x, 1.0, &lambda).unwrap();
        assert!(vals.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_cross_term_equals_utility_multiplier() {
        let problem = problem(1);
        let x = problem.initial_point();
        let mut lambda = vec![0.0; problem.n_con()];
        lambda[problem.cons().utility(1)] = 0.7;
        let vals = problem.hessian_values(&x, 0.0, &lambda).unwrap();
        let slot = problem
            .hessian_pattern()
            .slot(problem.vars().lj(1), problem.vars().ur(0))
            .unwrap();
        assert_eq!(vals[slot], 0.7);
    }
}
