//! The allocation problem: immutable context plus objective and constraints
//!
//! [`AllocationProblem`] owns the topology, the resolved parameters, the
//! variable floors, the variable/constraint layouts and both sparsity
//! patterns. Fields are private and exposed through `&` getters: the cached
//! housing factors and patterns are derived from them, so nothing may change
//! after construction. Every callback is a pure function of `x` (and of the
//! multipliers for the Hessian).
//!
//! ```text
//! min   −Σᵣ ωᵣ·Lᵣ·urᵣ
//!
//! s.t.  Lⱼ·ur_r(j) − (Cⱼ/α)^α·Kⱼ                                    = 0   (utility, J)
//!       Cⱼ + Σₑ Apos(j,e)·cₑ(Qdirect) + Σₑ Aneg(j,e)·cₑ(Qindirect) − Dⱼ = 0   (availability, J)
//!       Dⱼₙ + Σₑ A(j,e)·(Qdirectₑₙ − Qindirectₑₙ) − Zⱼₙ·Lⱼ^a           = 0   (flow, J·N)
//!       Σ_{j∈r} Lⱼ − Lᵣ                                                = 0   (labor, R)
//! ```

use super::error::AllocationError;
use super::hessian;
use super::jacobian;
use super::layout::{AllocationView, ConstraintLayout, Floors, VariableLayout};
use super::model_functions::{
    ces_aggregate, cobb_douglas, flow_power_sum, housing_factor, production, Congestion,
};
use super::sparsity::SparsityPattern;
use sge_core::{ModelParams, Scenario, Topology};

/// Smallest starting absorption per good.
const MIN_START_ABSORPTION: f64 = 1e-2;
/// Starting flow in both directions on every edge.
const START_FLOW: f64 = 1e-6;
/// Smallest starting aggregate consumption.
const MIN_START_CONSUMPTION: f64 = 1e-3;

/// Immutable problem context shared by every callback.
///
/// ```compile_fail
/// # use sge_algo::allocation::AllocationProblem;
/// # use sge_core::{ModelParams, Topology};
/// let topology = Topology::line(1).unwrap();
/// let params = ModelParams::new(vec![vec![1.0]], vec![1.0]);
/// let mut problem = AllocationProblem::new(topology, params).unwrap();
/// problem.params.housing = vec![4.0];
/// ```
#[derive(Debug, Clone)]
pub struct AllocationProblem {
    topology: Topology,
    params: ModelParams,
    vars: VariableLayout,
    cons: ConstraintLayout,
    floors: Floors,

    /// Kⱼ = (Hⱼ/(1−α))^(1−α)
    housing_factors: Vec<f64>,
    jacobian_pattern: SparsityPattern,
    hessian_pattern: SparsityPattern,
}

impl AllocationProblem {
    /// Validate the parameters against the topology and declare both
    /// sparsity patterns.
    pub fn new(topology: Topology, params: ModelParams) -> Result<Self, AllocationError> {
        let params = params.resolve(&topology)?;

        let vars = VariableLayout::new(
            topology.region_count(),
            topology.node_count(),
            params.n_goods(),
            topology.edge_count(),
        );
        let cons = ConstraintLayout::new(
            topology.region_count(),
            topology.node_count(),
            params.n_goods(),
        );

        let housing_factors = params
            .housing
            .iter()
            .map(|&h| housing_factor(h, params.alpha))
            .collect();

        let jacobian_pattern = jacobian::jacobian_sparsity(&vars, &cons, &topology)?;
        let hessian_pattern = hessian::hessian_sparsity(&vars, &topology)?;

        Ok(Self {
            topology,
            params,
            vars,
            cons,
            floors: Floors::default(),
            housing_factors,
            jacobian_pattern,
            hessian_pattern,
        })
    }

    /// Build from a scenario, applying its `[bounds]` floors.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, AllocationError> {
        let (topology, params) = scenario.build()?;
        Self::new(topology, params)?.with_floors(scenario.bounds)
    }

    /// Replace the default variable floors.
    pub fn with_floors(mut self, floors: Floors) -> Result<Self, AllocationError> {
        floors.validate()?;
        self.floors = floors;
        Ok(self)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Resolved parameters (defaults filled in).
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn vars(&self) -> &VariableLayout {
        &self.vars
    }

    pub fn cons(&self) -> &ConstraintLayout {
        &self.cons
    }

    pub fn floors(&self) -> &Floors {
        &self.floors
    }

    pub fn n_var(&self) -> usize {
        self.vars.n_var
    }

    pub fn n_con(&self) -> usize {
        self.cons.n_con
    }

    pub fn jacobian_pattern(&self) -> &SparsityPattern {
        &self.jacobian_pattern
    }

    pub fn hessian_pattern(&self) -> &SparsityPattern {
        &self.hessian_pattern
    }

    #[inline]
    pub fn housing_factor(&self, node: usize) -> f64 {
        self.housing_factors[node]
    }

    /// Congestion parameters of edge `e`.
    #[inline]
    pub fn congestion(&self, edge: usize) -> Congestion {
        Congestion {
            beta: self.params.beta,
            nu: self.params.nu,
            kappa: self.params.kappa[edge],
        }
    }

    /// CES aggregate Dⱼ of the absorption at node `j`.
    pub fn node_aggregate(&self, view: &AllocationView<'_>, node: usize) -> f64 {
        ces_aggregate(
            (0..self.vars.n_goods).map(|n| view.djn(node, n)),
            self.params.sigma,
        )
    }

    /// Power-sums `(S_direct, S_indirect)` of edge `e`.
    pub fn edge_power_sums(&self, view: &AllocationView<'_>, edge: usize) -> (f64, f64) {
        let n_goods = self.vars.n_goods;
        let weights = &self.params.goods_weights;
        let nu = self.params.nu;
        (
            flow_power_sum((0..n_goods).map(|n| view.q_direct(edge, n)), weights, nu),
            flow_power_sum((0..n_goods).map(|n| view.q_indirect(edge, n)), weights, nu),
        )
    }

    /// Transport cost paid by each node for its outgoing shipments.
    pub fn transport_costs(&self, view: &AllocationView<'_>) -> Vec<f64> {
        let mut paid = vec![0.0; self.vars.n_nodes];
        for (e, &(origin, destination)) in self.topology.edges().iter().enumerate() {
            let cong = self.congestion(e);
            let (s_direct, s_indirect) = self.edge_power_sums(view, e);
            paid[origin] += cong.cost(s_direct);
            paid[destination] += cong.cost(s_indirect);
        }
        paid
    }

    // ========================================================================
    // OBJECTIVE
    // ========================================================================

    /// `−Σᵣ ωᵣ·Lᵣ·urᵣ`
    pub fn objective(&self, x: &[f64]) -> f64 {
        let view = self.vars.view(x);
        -view
            .ur
            .iter()
            .enumerate()
            .map(|(r, &u)| self.region_weight(r) * u)
            .sum::<f64>()
    }

    /// Nonzero only on the utility block.
    pub fn objective_gradient(&self, _x: &[f64]) -> Vec<f64> {
        let mut grad = vec![0.0; self.vars.n_var];
        for r in 0..self.vars.n_regions {
            grad[self.vars.ur(r)] = -self.region_weight(r);
        }
        grad
    }

    /// `ωᵣ·Lᵣ`
    #[inline]
    fn region_weight(&self, region: usize) -> f64 {
        self.params.region_weights[region] * self.params.region_population[region]
    }

    // ========================================================================
    // CONSTRAINTS
    // ========================================================================

    pub fn constraints(&self, x: &[f64]) -> Vec<f64> {
        let view = self.vars.view(x);
        let p = &self.params;
        let mut g = vec![0.0; self.cons.n_con];

        // Utility equalization
        for j in 0..self.vars.n_nodes {
            let r = self.topology.region_of(j);
            g[self.cons.utility(j)] = view.lj[j] * view.ur[r]
                - cobb_douglas(view.cj[j], self.housing_factors[j], p.alpha);
        }

        // Final-good availability
        for j in 0..self.vars.n_nodes {
            g[self.cons.availability(j)] = view.cj[j] - self.node_aggregate(&view, j);
        }
        for (j, cost) in self.transport_costs(&view).into_iter().enumerate() {
            g[self.cons.availability(j)] += cost;
        }

        // Flow conservation per good
        for n in 0..self.vars.n_goods {
            for j in 0..self.vars.n_nodes {
                g[self.cons.flow(j, n)] = view.djn(j, n) - production(p.z(j, n), view.lj[j], p.a);
            }
            for (e, &(origin, destination)) in self.topology.edges().iter().enumerate() {
                let net = view.q_direct(e, n) - view.q_indirect(e, n);
                g[self.cons.flow(origin, n)] += net;
                g[self.cons.flow(destination, n)] -= net;
            }
        }

        // Regional labor
        for j in 0..self.vars.n_nodes {
            g[self.cons.labor(self.topology.region_of(j))] += view.lj[j];
        }
        for r in 0..self.vars.n_regions {
            g[self.cons.labor(r)] -= p.region_population[r];
        }

        g
    }

    pub fn jacobian_values(&self, x: &[f64]) -> Result<Vec<f64>, AllocationError> {
        jacobian::jacobian_values(self, x)
    }

    pub fn hessian_values(
        &self,
        x: &[f64],
        obj_factor: f64,
        lambda: &[f64],
    ) -> Result<Vec<f64>, AllocationError> {
        hessian::hessian_values(self, x, obj_factor, lambda)
    }

    // ========================================================================
    // BOUNDS AND STARTING POINT
    // ========================================================================

    pub fn variable_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.vars.bounds(&self.floors)
    }

    /// All constraints are equalities.
    pub fn constraint_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0; self.cons.n_con], vec![0.0; self.cons.n_con])
    }

    /// Default starting point:
    ///
    /// - population split evenly inside each region
    /// - absorption equal to local production (at least 1e-2)
    /// - negligible flows in both directions
    /// - consumption equal to the CES aggregate net of transport cost
    /// - regional utility equal to the mean per-capita welfare of its nodes
    pub fn initial_point(&self) -> Vec<f64> {
        let vars = &self.vars;
        let p = &self.params;
        let mut x = vec![0.0; vars.n_var];

        for r in 0..vars.n_regions {
            let members = self.topology.region_members(r);
            let share = p.region_population[r] / members.len() as f64;
            for &j in members {
                x[vars.lj(j)] = share.max(self.floors.population);
            }
        }

        for j in 0..vars.n_nodes {
            let l = x[vars.lj(j)];
            for n in 0..vars.n_goods {
                x[vars.djn(j, n)] = production(p.z(j, n), l, p.a).max(MIN_START_ABSORPTION);
            }
        }

        let start_flow = START_FLOW.max(self.floors.flow);
        x[vars.q_direct_range()].fill(start_flow);
        x[vars.q_indirect_range()].fill(start_flow);

        let (aggregates, costs) = {
            let view = vars.view(&x);
            let aggregates: Vec<f64> = (0..vars.n_nodes)
                .map(|j| self.node_aggregate(&view, j))
                .collect();
            (aggregates, self.transport_costs(&view))
        };
        for j in 0..vars.n_nodes {
            x[vars.cj(j)] = (aggregates[j] - costs[j])
                .max(MIN_START_CONSUMPTION)
                .max(self.floors.consumption);
        }

        for r in 0..vars.n_regions {
            let members = self.topology.region_members(r);
            let total: f64 = members
                .iter()
                .map(|&j| {
                    cobb_douglas(x[vars.cj(j)], self.housing_factors[j], p.alpha) / x[vars.lj(j)]
                })
                .sum();
            x[vars.ur(r)] = total / members.len() as f64;
        }

        x
    }

    /// Accept a caller-supplied starting point after a length check.
    pub fn seeded_point(&self, seed: &[f64]) -> Result<Vec<f64>, AllocationError> {
        AllocationError::check_len("initial point", self.vars.n_var, seed.len())?;
        Ok(seed.to_vec())
    }
}
