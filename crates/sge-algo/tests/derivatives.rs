//! Finite-difference checks of every callback at random interior points

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sge_algo::allocation::{verify_gradient, verify_hessian, verify_jacobian, AllocationProblem};
use sge_core::{ModelParams, Topology};

/// Four nodes in two regions, two goods, a cycle through nodes 0-1-2.
fn four_node_problem(nu: f64) -> AllocationProblem {
    let topology = Topology::from_parts(vec![0, 0, 1, 1], vec![(0, 1), (1, 2), (2, 3), (0, 2)])
        .unwrap();
    let mut params = ModelParams::new(
        vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![1.5, 0.0], vec![0.0, 0.5]],
        vec![2.0, 1.5],
    );
    params.nu = nu;
    params.beta = 1.2;
    params.sigma = 3.0;
    params.alpha = 0.6;
    params.a = 0.7;
    params.goods_weights = vec![1.0, 0.8];
    params.housing = vec![1.0, 0.5, 2.0, 1.5];
    params.region_weights = vec![1.0, 2.0];
    params.kappa = vec![1.0, 0.5, 2.0, 1.5];
    AllocationProblem::new(topology, params).unwrap()
}

fn random_point(problem: &AllocationProblem, rng: &mut StdRng) -> Vec<f64> {
    let vars = problem.vars();
    let mut x = vec![0.0; vars.n_var];
    for i in vars.ur_range() {
        x[i] = rng.gen_range(0.5..2.0);
    }
    for i in vars.cj_range() {
        x[i] = rng.gen_range(0.5..2.0);
    }
    for i in vars.djn_range() {
        x[i] = rng.gen_range(0.3..2.0);
    }
    for i in vars.q_direct_range().chain(vars.q_indirect_range()) {
        x[i] = rng.gen_range(0.05..0.5);
    }
    for i in vars.lj_range() {
        x[i] = rng.gen_range(0.5..2.0);
    }
    x
}

#[test]
fn gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(7);
    let problem = four_node_problem(1.5);
    for _ in 0..3 {
        let x = random_point(&problem, &mut rng);
        let check = verify_gradient(&problem, &x);
        assert!(check.passes(1e-6), "{check:?}");
    }
}

#[test]
fn jacobian_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(11);
    for nu in [1.0, 1.5] {
        let problem = four_node_problem(nu);
        for _ in 0..3 {
            let x = random_point(&problem, &mut rng);
            let check = verify_jacobian(&problem, &x).unwrap();
            assert!(check.passes(1e-5), "nu={nu}: {check:?}");
            assert_eq!(check.total_entries, problem.n_var() * problem.n_con());
        }
    }
}

#[test]
fn hessian_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(23);
    for nu in [1.0, 1.5, 2.0] {
        let problem = four_node_problem(nu);
        for _ in 0..2 {
            let x = random_point(&problem, &mut rng);
            let lambda: Vec<f64> = (0..problem.n_con())
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect();
            let obj_factor = rng.gen_range(0.5..2.0);
            let check = verify_hessian(&problem, &x, obj_factor, &lambda).unwrap();
            assert!(check.passes(1e-4), "nu={nu}: {check:?}");
        }
    }
}

#[test]
fn hessian_of_default_point_on_grid() {
    let topology = Topology::square_grid(3, 2)
        .unwrap()
        .with_regions(vec![0, 0, 1, 0, 1, 1])
        .unwrap();
    let params = ModelParams::new(
        vec![
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![2.0, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 3.0],
            vec![1.0, 0.0],
        ],
        vec![3.0, 2.0],
    );
    let problem = AllocationProblem::new(topology, params).unwrap();
    let x = problem.initial_point();
    let lambda = vec![0.3; problem.n_con()];
    let check = verify_hessian(&problem, &x, 1.0, &lambda).unwrap();
    assert!(check.passes(1e-4), "{check:?}");
}

#[test]
fn patterns_do_not_depend_on_the_point() {
    let mut rng = StdRng::seed_from_u64(3);
    let problem = four_node_problem(1.5);
    let jac_rows = problem.jacobian_pattern().rows().to_vec();
    let jac_cols = problem.jacobian_pattern().cols().to_vec();
    let hess_nnz = problem.hessian_pattern().nnz();

    for _ in 0..4 {
        let x = random_point(&problem, &mut rng);
        let lambda = vec![1.0; problem.n_con()];
        assert_eq!(problem.jacobian_values(&x).unwrap().len(), jac_rows.len());
        assert_eq!(
            problem.hessian_values(&x, 1.0, &lambda).unwrap().len(),
            hess_nnz
        );
    }
    assert_eq!(problem.jacobian_pattern().rows(), jac_rows.as_slice());
    assert_eq!(problem.jacobian_pattern().cols(), jac_cols.as_slice());
}

#[test]
fn hessian_pattern_is_lower_triangular() {
    let problem = four_node_problem(2.0);
    let pattern = problem.hessian_pattern();
    assert!(pattern.is_lower_triangular());
    for (&row, &col) in pattern.rows().iter().zip(pattern.cols()) {
        assert!(row >= col, "({row}, {col}) above the diagonal");
    }
}

#[test]
fn objective_only_hessian_is_zero() {
    let mut rng = StdRng::seed_from_u64(5);
    let problem = four_node_problem(1.5);
    let x = random_point(&problem, &mut rng);
    let values = problem
        .hessian_values(&x, 1.0, &vec![0.0; problem.n_con()])
        .unwrap();
    assert!(values.iter().all(|v| *v == 0.0));
}
