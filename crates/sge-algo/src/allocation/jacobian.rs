//! # Analytical Jacobian of the allocation constraints
//!
//! ## Jacobian Blocks
//!
//! ```text
//!                 │  ur   │  Cj   │  Djn        │ Qdirect     │ Qindirect   │  Lj
//!   ──────────────┼───────┼───────┼─────────────┼─────────────┼─────────────┼──────────
//!   utility  (J)  │  Lj   │ −U'   │             │             │             │  ur
//!   avail    (J)  │       │  1    │ −∂D/∂Djn    │ ∂c/∂Q @orig │ ∂c/∂Q @dest │
//!   flow   (J·N)  │       │       │  1          │ ±1          │ ∓1          │ −a·Z·L^(a−1)
//!   labor    (R)  │       │       │             │             │             │  1
//! ```
//!
//! Nonzero count: `5J + 3JN + 6EN`. The `Lj` column of the flow rows is
//! declared for every good even where Zⱼₙ = 0; those entries evaluate to 0.
//!
//! The pattern is declared once by [`jacobian_sparsity`]; [`jacobian_values`]
//! writes through the pattern's slot map so both always agree.

use super::error::AllocationError;
use super::layout::{ConstraintLayout, VariableLayout};
use super::model_functions::{ces_marginal, cobb_douglas_marginal, production_marginal};
use super::problem::AllocationProblem;
use super::sparsity::SparsityPattern;
use sge_core::Topology;

/// Number of structural nonzeros for the given dimensions.
pub fn jacobian_nnz(vars: &VariableLayout) -> usize {
    let (j, n, e) = (vars.n_nodes, vars.n_goods, vars.n_edges);
    5 * j + 3 * j * n + 6 * e * n
}

/// Declare the Jacobian structure.
pub fn jacobian_sparsity(
    vars: &VariableLayout,
    cons: &ConstraintLayout,
    topology: &Topology,
) -> Result<SparsityPattern, AllocationError> {
    let mut b = SparsityPattern::builder(cons.n_con, vars.n_var);

    // ========================================================================
    // UTILITY EQUALIZATION
    // ========================================================================

    for j in 0..vars.n_nodes {
        let row = cons.utility(j);
        b.insert(row, vars.ur(topology.region_of(j)));
        b.insert(row, vars.cj(j));
        b.insert(row, vars.lj(j));
    }

    // ========================================================================
    // FINAL-GOOD AVAILABILITY
    // ========================================================================

    for j in 0..vars.n_nodes {
        let row = cons.availability(j);
        b.insert(row, vars.cj(j));
        for n in 0..vars.n_goods {
            b.insert(row, vars.djn(j, n));
        }
    }
    for (e, &(origin, destination)) in topology.edges().iter().enumerate() {
        for n in 0..vars.n_goods {
            b.insert(cons.availability(origin), vars.q_direct(e, n));
            b.insert(cons.availability(destination), vars.q_indirect(e, n));
        }
    }

    // ========================================================================
    // FLOW CONSERVATION
    // ========================================================================

    for n in 0..vars.n_goods {
        for j in 0..vars.n_nodes {
            b.insert(cons.flow(j, n), vars.djn(j, n));
            b.insert(cons.flow(j, n), vars.lj(j));
        }
        for (e, &(origin, destination)) in topology.edges().iter().enumerate() {
            for node in [origin, destination] {
                b.insert(cons.flow(node, n), vars.q_direct(e, n));
                b.insert(cons.flow(node, n), vars.q_indirect(e, n));
            }
        }
    }

    // ========================================================================
    // REGIONAL LABOR
    // ========================================================================

    for j in 0..vars.n_nodes {
        b.insert(cons.labor(topology.region_of(j)), vars.lj(j));
    }

    b.build()
}

/// Jacobian values in pattern order.
pub fn jacobian_values(problem: &AllocationProblem, x: &[f64]) -> Result<Vec<f64>, AllocationError> {
    AllocationError::check_len("x", problem.n_var(), x.len())?;

    let vars = problem.vars();
    let cons = problem.cons();
    let p = problem.params();
    let topo = problem.topology();
    let view = vars.view(x);
    let mut acc = problem.jacobian_pattern().accumulator();

    // ∂(Lⱼ·ur − U(Cⱼ))
    for j in 0..vars.n_nodes {
        let row = cons.utility(j);
        let r = topo.region_of(j);
        acc.add(row, vars.ur(r), view.lj[j]);
        acc.add(
            row,
            vars.cj(j),
            -cobb_douglas_marginal(view.cj[j], problem.housing_factor(j), p.alpha),
        );
        acc.add(row, vars.lj(j), view.ur[r]);
    }

    // ∂(Cⱼ + transport − Dⱼ)
    for j in 0..vars.n_nodes {
        let row = cons.availability(j);
        let aggregate = problem.node_aggregate(&view, j);
        acc.add(row, vars.cj(j), 1.0);
        for n in 0..vars.n_goods {
            acc.add(
                row,
                vars.djn(j, n),
                -ces_marginal(aggregate, view.djn(j, n), p.sigma),
            );
        }
    }
    for (e, &(origin, destination)) in topo.edges().iter().enumerate() {
        let cong = problem.congestion(e);
        let (s_direct, s_indirect) = problem.edge_power_sums(&view, e);
        for n in 0..vars.n_goods {
            let m = p.goods_weights[n];
            acc.add(
                cons.availability(origin),
                vars.q_direct(e, n),
                cong.marginal(s_direct, view.q_direct(e, n), m),
            );
            acc.add(
                cons.availability(destination),
                vars.q_indirect(e, n),
                cong.marginal(s_indirect, view.q_indirect(e, n), m),
            );
        }
    }

    // ∂(Dⱼₙ + A·(Qdirect − Qindirect) − Z·L^a)
    for n in 0..vars.n_goods {
        for j in 0..vars.n_nodes {
            acc.add(cons.flow(j, n), vars.djn(j, n), 1.0);
            acc.add(
                cons.flow(j, n),
                vars.lj(j),
                -production_marginal(p.z(j, n), view.lj[j], p.a),
            );
        }
        for (e, &(origin, destination)) in topo.edges().iter().enumerate() {
            acc.add(cons.flow(origin, n), vars.q_direct(e, n), 1.0);
            acc.add(cons.flow(origin, n), vars.q_indirect(e, n), -1.0);
            acc.add(cons.flow(destination, n), vars.q_direct(e, n), -1.0);
            acc.add(cons.flow(destination, n), vars.q_indirect(e, n), 1.0);
        }
    }

    // ∂(Σ Lⱼ − Lᵣ)
    for j in 0..vars.n_nodes {
        acc.add(cons.labor(topo.region_of(j)), vars.lj(j), 1.0);
    }

    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sge_core::ModelParams;

    fn three_node_two_goods() -> AllocationProblem {
        let topo = Topology::from_parts(vec![0, 0, 1], vec![(0, 1), (1, 2), (2, 0)]).unwrap();
        let params = ModelParams::new(
            vec![vec![1.0, 0.0], vec![0.0, 1.5], vec![0.8, 0.0]],
            vec![2.0, 1.0],
        );
        AllocationProblem::new(topo, params).unwrap()
    }

    #[test]
    fn test_nnz_formula() {
        let problem = three_node_two_goods();
        let expected = 5 * 3 + 3 * 3 * 2 + 6 * 3 * 2;
        assert_eq!(problem.jacobian_pattern().nnz(), expected);
        assert_eq!(jacobian_nnz(problem.vars()), expected);
    }

    #[test]
    fn test_values_match_pattern_length() {
        let problem = three_node_two_goods();
        let vals = problem.jacobian_values(&problem.initial_point()).unwrap();
        assert_eq!(vals.len(), problem.jacobian_pattern().nnz());
    }

    #[test]
    fn test_labor_rows_are_indicators() {
        let problem = three_node_two_goods();
        let vals = problem.jacobian_values(&problem.initial_point()).unwrap();
        let dense = problem.jacobian_pattern().to_dense(&vals);
        let row0 = &dense[problem.cons().labor(0)];
        let row1 = &dense[problem.cons().labor(1)];
        assert_eq!(row0[problem.vars().lj(0)], 1.0);
        assert_eq!(row0[problem.vars().lj(1)], 1.0);
        assert_eq!(row0[problem.vars().lj(2)], 0.0);
        assert_eq!(row1[problem.vars().lj(2)], 1.0);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let problem = three_node_two_goods();
        assert!(matches!(
            problem.jacobian_values(&[1.0; 4]),
            Err(AllocationError::DimensionMismatch { .. })
        ));
    }
}
