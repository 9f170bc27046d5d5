//! # Spatial allocation NLP
//!
//! Planner's problem of a spatial economy: choose regional utility levels,
//! consumption, absorption of each good, bilateral flows and the location of
//! labor to maximise weighted welfare, subject to utility definitions, goods
//! availability, flow conservation and regional labor totals.
//!
//! ## Decision vector
//!
//! ```text
//! ┌───────────────┬───────────┬───────────────────────────────────────────┐
//! │ Block         │ Length    │ Index of (·)                              │
//! ├───────────────┼───────────┼───────────────────────────────────────────┤
//! │ ur            │ R         │ r                                         │
//! │ Cj            │ J         │ R + j                                     │
//! │ Djn           │ J·N       │ R + J + j + n·J                           │
//! │ Qdirect       │ E·N       │ R + J + J·N + e + n·E                     │
//! │ Qindirect     │ E·N       │ R + J + J·N + E·N + e + n·E               │
//! │ Lj            │ J         │ R + J + J·N + 2·E·N + j                   │
//! └───────────────┴───────────┴───────────────────────────────────────────┘
//! ```
//!
//! Constraint rows are `[utility (J) | availability (J) | flow (J·N) | labor (R)]`,
//! with flow row `(j, n)` at `2J + j + n·J`.
//!
//! ## Callbacks
//!
//! | Callback            | Module                          |
//! |---------------------|---------------------------------|
//! | objective, gradient | [`problem`]                     |
//! | constraints         | [`problem`]                     |
//! | Jacobian            | [`jacobian`]                    |
//! | Lagrangian Hessian  | [`hessian`] (lower triangle)    |
//!
//! Both sparse structures are declared once when the problem is built and
//! never change; values are accumulated through
//! [`SparseAccumulator`](sparsity::SparseAccumulator), which refuses any
//! coordinate outside the declared pattern.
//!
//! ## Solving
//!
//! Backends implement [`NlpBackend`] over any [`NonlinearProgram`]:
//!
//! - [`AugmentedLagrangianBackend`]: bundled, pure Rust (argmin L-BFGS)
//! - `IpoptBackend`: IPOPT with exact Hessian (feature `solver-ipopt`)
//!
//! [`solve`] picks one from a [`SolverConfig`]; [`recover`] turns the solved
//! point and its multipliers into an [`AllocationResult`].
//!
//! ## Example
//!
//! ```no_run
//! use sge_algo::allocation::{recover, solve, AllocationProblem, SolverConfig};
//! use sge_core::{ModelParams, Topology};
//!
//! let topology = Topology::line(2)?.with_regions(vec![0, 1])?;
//! let params = ModelParams::new(vec![vec![2.0], vec![1.0]], vec![1.0, 1.0]);
//! let problem = AllocationProblem::new(topology, params)?;
//!
//! let outcome = solve(&problem, &SolverConfig::default(), None)?;
//! let result = recover(&problem, &outcome.x, &outcome.multipliers)?;
//! println!("welfare {:.4}, status {}", result.welfare, outcome.status);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hessian;
#[cfg(feature = "solver-ipopt")]
pub mod ipopt_solver;
pub mod jacobian;
pub mod layout;
pub mod model_functions;
pub mod nlp;
pub mod problem;
pub mod recovery;
pub mod solver;
pub mod sparsity;

pub use config::{backend_for, solve, Backend, SolverConfig};
pub use diagnostics::{
    constraint_violations, verify_gradient, verify_hessian, verify_jacobian, ConstraintViolation,
    DerivativeCheck,
};
pub use error::AllocationError;
#[cfg(feature = "solver-ipopt")]
pub use ipopt_solver::IpoptBackend;
pub use layout::{AllocationView, ConstraintFamily, ConstraintLayout, Floors, VariableLayout};
pub use nlp::{NlpBackend, NonlinearProgram, SolveOutcome, SolveStatus};
pub use problem::AllocationProblem;
pub use recovery::{recover, AllocationResult, EdgeFlow, EndpointFlow};
pub use solver::{solve_augmented_lagrangian, AugmentedLagrangianBackend};
pub use sparsity::{PatternBuilder, SparseAccumulator, SparsityPattern};
