//! End-to-end solves with the bundled backend

use sge_algo::allocation::{
    constraint_violations, recover, solve, AllocationError, AllocationProblem, Floors,
    SolveStatus, SolverConfig,
};
use sge_core::{ModelParams, SgeError, Topology};

fn config() -> SolverConfig {
    SolverConfig {
        tolerance: 1e-6,
        dual_tolerance: 1e-4,
        max_iterations: 20_000,
        ..SolverConfig::default()
    }
}

/// Two single-node regions of one worker each, node 0 twice as productive.
fn two_node_problem() -> AllocationProblem {
    let topology = Topology::line(2).unwrap().with_regions(vec![0, 1]).unwrap();
    let mut params = ModelParams::new(vec![vec![2.0], vec![1.0]], vec![1.0, 1.0]);
    params.alpha = 0.5;
    params.beta = 1.0;
    params.nu = 1.0;
    params.kappa = vec![1.0];
    AllocationProblem::new(topology, params).unwrap()
}

#[test]
fn closed_economy_consumes_its_output() {
    let topology = Topology::line(1).unwrap();
    let params = ModelParams::new(vec![vec![1.0]], vec![1.0]);
    let problem = AllocationProblem::new(topology, params).unwrap();

    let outcome = solve(&problem, &config(), None).unwrap();
    assert!(outcome.status.is_success(), "status: {}", outcome.status);

    let result = recover(&problem, &outcome.x, &outcome.multipliers).unwrap();
    // C = Z·L^a = 1, so u = (C/α)^α·(H/(1−α))^(1−α) = 2
    assert!((result.consumption[0] - 1.0).abs() < 1e-4, "{result:?}");
    assert!((result.region_utility[0] - 2.0).abs() < 1e-4, "{result:?}");
    assert!((result.welfare - 2.0).abs() < 1e-4);
    assert!(result.price_index[0] > 0.0);
    assert!(result.edge_flows.is_empty());
}

#[test]
fn two_node_economy_ships_towards_the_poorer_node() {
    let problem = two_node_problem();
    let outcome = solve(&problem, &config(), None).unwrap();
    assert!(outcome.status.is_success(), "status: {}", outcome.status);
    assert!(outcome.max_violation < 1e-5);

    let result = outcome.recover(&problem).unwrap();
    let net = result.edge_flows[0].net[0];
    // (1 + 2Q)·√(1 + Q) = √(2 − Q − Q²)  ⇒  Q ≈ 0.137
    assert!(net > 0.12 && net < 0.16, "net flow {net}");
    assert!(result.consumption[1] > 1.0);
    assert!(result.consumption[0] < 2.0);

    // Shipping pays off only if the destination price covers the origin price
    assert!(result.goods_prices[1][0] > result.goods_prices[0][0]);
}

#[test]
fn availability_holds_at_the_optimum() {
    let problem = two_node_problem();
    let outcome = solve(&problem, &config(), None).unwrap();
    let residuals = constraint_violations(&problem, &outcome.x, 1e-5);
    assert!(residuals.is_empty(), "{residuals:?}");
}

#[test]
fn labor_is_conserved_within_a_region() {
    let topology = Topology::line(3).unwrap();
    let params = ModelParams::new(vec![vec![1.0], vec![1.5], vec![0.8]], vec![3.0]);
    let problem = AllocationProblem::new(topology, params).unwrap();

    let outcome = solve(&problem, &config(), None).unwrap();
    assert!(outcome.max_violation < 1e-5, "violation {}", outcome.max_violation);

    let result = recover(&problem, &outcome.x, &outcome.multipliers).unwrap();
    let total: f64 = result.population.iter().sum();
    assert!((total - 3.0).abs() < 1e-5, "total population {total}");
    assert!(result.population.iter().all(|&l| l > 0.0));
}

#[test]
fn raised_population_floor_binds() {
    // Left free, node 2 ends up with about half a worker
    let topology = Topology::line(3).unwrap();
    let params = ModelParams::new(vec![vec![1.0], vec![1.5], vec![0.8]], vec![3.0]);
    let problem = AllocationProblem::new(topology, params)
        .unwrap()
        .with_floors(Floors {
            population: 0.9,
            ..Floors::default()
        })
        .unwrap();

    let outcome = solve(&problem, &config(), None).unwrap();
    assert!(outcome.max_violation < 1e-5, "violation {}", outcome.max_violation);

    let result = recover(&problem, &outcome.x, &outcome.multipliers).unwrap();
    assert!(
        result.population.iter().all(|&l| l >= 0.9 - 1e-9),
        "population {:?}",
        result.population
    );
    assert!(result.population[2] < 0.95, "population {:?}", result.population);
    let total: f64 = result.population.iter().sum();
    assert!((total - 3.0).abs() < 1e-5, "total population {total}");
}

#[test]
fn endpoint_flows_are_antisymmetric() {
    let problem = two_node_problem();
    let outcome = solve(&problem, &config(), None).unwrap();
    let result = outcome.recover(&problem).unwrap();

    assert_eq!(result.endpoint_flows.len(), 2);
    let (a, b) = (&result.endpoint_flows[0], &result.endpoint_flows[1]);
    assert_eq!((a.node, a.neighbor), (b.neighbor, b.node));
    for (qa, qb) in a.outflow.iter().zip(&b.outflow) {
        assert_eq!(*qa, -*qb);
    }
}

#[test]
fn seeded_start_is_length_checked() {
    let problem = two_node_problem();
    let err = solve(&problem, &config(), Some(&[1.0; 3])).unwrap_err();
    assert!(matches!(err, AllocationError::DimensionMismatch { .. }));
}

#[test]
fn exhausted_budget_is_reported_as_status() {
    let problem = two_node_problem();
    let config = SolverConfig {
        max_iterations: 2,
        ..config()
    };
    let outcome = solve(&problem, &config, None).unwrap();
    assert_eq!(outcome.status, SolveStatus::MaxIterations);
    assert_eq!(outcome.x.len(), problem.n_var());
}

#[test]
fn multi_good_node_is_rejected() {
    let topology = Topology::line(2).unwrap();
    let params = ModelParams::new(vec![vec![1.0, 0.5], vec![0.0, 1.0]], vec![2.0]);
    let err = AllocationProblem::new(topology, params).unwrap_err();
    assert!(
        matches!(
            err,
            AllocationError::Model(SgeError::ModelIncompatible { node: 0, goods: 2 })
        ),
        "unexpected error: {err}"
    );
}
