//! Post-solve allocation recovery
//!
//! Turns a solved decision vector and its constraint multipliers into the
//! economic quantities a report needs. Pure: nothing here feeds back into
//! the solve.
//!
//! | Output                   | Source                                            |
//! |--------------------------|---------------------------------------------------|
//! | `welfare`                | `Σᵣ ωᵣ·Lᵣ·urᵣ`                                    |
//! | `consumption_per_capita` | `Cⱼ / Lⱼ` (0 where `Lⱼ = 0`)                      |
//! | `housing_per_capita`     | `Hⱼ / Lⱼ` (0 where `Lⱼ = 0`)                      |
//! | `node_welfare`           | Cobb-Douglas bundle of the per-capita quantities  |
//! | `production`             | `Zⱼₙ·Lⱼ^a`                                        |
//! | `edge_flows`             | `Qdirect − Qindirect`, positive = origin → dest   |
//! | `price_index`            | multiplier of the availability row of node j      |
//! | `goods_prices`           | multiplier of the flow row of (j, n)              |
//!
//! Multipliers follow the `f + λᵀg` Lagrangian convention, under which both
//! price families come out positive at an optimum.

use super::error::AllocationError;
use super::model_functions::{cobb_douglas, housing_factor, production};
use super::nlp::SolveOutcome;
use super::problem::AllocationProblem;
use serde::{Deserialize, Serialize};

/// Net shipment on one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeFlow {
    pub edge: usize,
    pub origin: usize,
    pub destination: usize,
    /// Per good, positive when goods move origin → destination
    pub net: Vec<f64>,
    /// Transport cost paid at the origin (direct flows)
    pub cost_direct: f64,
    /// Transport cost paid at the destination (indirect flows)
    pub cost_indirect: f64,
}

/// One edge as seen from one of its endpoints: positive = outgoing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointFlow {
    pub edge: usize,
    pub node: usize,
    pub neighbor: usize,
    pub outflow: Vec<f64>,
}

/// Economically meaningful view of a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub welfare: f64,
    pub region_utility: Vec<f64>,
    pub population: Vec<f64>,
    pub consumption: Vec<f64>,
    pub consumption_per_capita: Vec<f64>,
    pub housing_per_capita: Vec<f64>,
    pub node_welfare: Vec<f64>,
    /// `[node][good]`
    pub production: Vec<Vec<f64>>,
    /// `[node][good]`
    pub absorption: Vec<Vec<f64>>,
    pub aggregate_absorption: Vec<f64>,
    pub edge_flows: Vec<EdgeFlow>,
    /// Two entries per edge (origin first), exact negations of each other
    pub endpoint_flows: Vec<EndpointFlow>,
    /// `[node][good]`
    pub goods_prices: Vec<Vec<f64>>,
    pub price_index: Vec<f64>,
}

/// Recover the allocation from a solved point.
pub fn recover(
    problem: &AllocationProblem,
    x: &[f64],
    multipliers: &[f64],
) -> Result<AllocationResult, AllocationError> {
    AllocationError::check_len("x", problem.n_var(), x.len())?;
    AllocationError::check_len("multipliers", problem.n_con(), multipliers.len())?;

    let vars = problem.vars();
    let cons = problem.cons();
    let p = problem.params();
    let view = vars.view(x);
    let (n_nodes, n_goods) = (vars.n_nodes, vars.n_goods);

    let welfare = -problem.objective(x);

    let mut consumption_per_capita = vec![0.0; n_nodes];
    let mut housing_per_capita = vec![0.0; n_nodes];
    let mut node_welfare = vec![0.0; n_nodes];
    for j in 0..n_nodes {
        let l = view.lj[j];
        if l > 0.0 {
            consumption_per_capita[j] = view.cj[j] / l;
            housing_per_capita[j] = p.housing[j] / l;
            node_welfare[j] = cobb_douglas(
                consumption_per_capita[j],
                housing_factor(housing_per_capita[j], p.alpha),
                p.alpha,
            );
        }
    }

    let production = (0..n_nodes)
        .map(|j| {
            (0..n_goods)
                .map(|n| production(p.z(j, n), view.lj[j], p.a))
                .collect()
        })
        .collect();
    let absorption = (0..n_nodes)
        .map(|j| (0..n_goods).map(|n| view.djn(j, n)).collect())
        .collect();
    let aggregate_absorption = (0..n_nodes)
        .map(|j| problem.node_aggregate(&view, j))
        .collect();

    let mut edge_flows = Vec::with_capacity(vars.n_edges);
    let mut endpoint_flows = Vec::with_capacity(2 * vars.n_edges);
    for (e, &(origin, destination)) in problem.topology().edges().iter().enumerate() {
        let net: Vec<f64> = (0..n_goods)
            .map(|n| view.q_direct(e, n) - view.q_indirect(e, n))
            .collect();
        let cong = problem.congestion(e);
        let (s_direct, s_indirect) = problem.edge_power_sums(&view, e);

        endpoint_flows.push(EndpointFlow {
            edge: e,
            node: origin,
            neighbor: destination,
            outflow: net.clone(),
        });
        endpoint_flows.push(EndpointFlow {
            edge: e,
            node: destination,
            neighbor: origin,
            outflow: net.iter().map(|q| -q).collect(),
        });
        edge_flows.push(EdgeFlow {
            edge: e,
            origin,
            destination,
            net,
            cost_direct: cong.cost(s_direct),
            cost_indirect: cong.cost(s_indirect),
        });
    }

    let goods_prices = (0..n_nodes)
        .map(|j| (0..n_goods).map(|n| multipliers[cons.flow(j, n)]).collect())
        .collect();
    let price_index = (0..n_nodes)
        .map(|j| multipliers[cons.availability(j)])
        .collect();

    Ok(AllocationResult {
        welfare,
        region_utility: view.ur.to_vec(),
        population: view.lj.to_vec(),
        consumption: view.cj.to_vec(),
        consumption_per_capita,
        housing_per_capita,
        node_welfare,
        production,
        absorption,
        aggregate_absorption,
        edge_flows,
        endpoint_flows,
        goods_prices,
        price_index,
    })
}

impl SolveOutcome {
    /// [`recover`] at the returned point.
    pub fn recover(&self, problem: &AllocationProblem) -> Result<AllocationResult, AllocationError> {
        recover(problem, &self.x, &self.multipliers)
    }
}
