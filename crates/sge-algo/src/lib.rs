//! # sge-algo: allocation solver for spatial economies
//!
//! This crate builds and solves the planner's problem of a spatial general
//! equilibrium model on a transport network from [`sge_core`].
//!
//! ## Allocation NLP
//!
//! [`AllocationProblem`] evaluates the smooth nonlinear program through the
//! callbacks an interior-point or quasi-Newton solver needs:
//!
//! | Callback            | Output                                           |
//! |---------------------|--------------------------------------------------|
//! | objective           | `−Σᵣ ωᵣ·Lᵣ·urᵣ`                                  |
//! | gradient            | dense, length `n_var`                            |
//! | constraints         | utility, availability, flow, labor residuals     |
//! | Jacobian            | values in fixed [`SparsityPattern`] order        |
//! | Lagrangian Hessian  | lower triangle, fixed pattern                    |
//!
//! ## Backends
//!
//! | Backend | Method | Availability |
//! |---------|--------|--------------|
//! | [`Backend::AugmentedLagrangian`] | augmented Lagrangian + L-BFGS | always |
//! | [`Backend::Ipopt`] | interior point, exact Hessian | feature `solver-ipopt` |
//!
//! ## Diagnostics
//!
//! - [`verify_gradient`], [`verify_jacobian`], [`verify_hessian`]: finite
//!   difference checks over dense matrices
//! - [`constraint_violations`]: labelled residuals

pub mod allocation;

pub use allocation::{
    constraint_violations, recover, solve, verify_gradient, verify_hessian, verify_jacobian,
    AllocationError, AllocationProblem, AllocationResult, Backend, NlpBackend, NonlinearProgram,
    SolveOutcome, SolveStatus, SolverConfig, SparsityPattern,
};
