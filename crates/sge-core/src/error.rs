//! Unified error types for the SGE crates
//!
//! [`SgeError`] covers everything that can go wrong before an allocation
//! problem is handed to a solver: malformed topologies, parameter sets that
//! do not match the topology, and model-incompatible inputs. Solver-side
//! errors live in `sge-algo` and wrap this type.

use thiserror::Error;

/// Unified error type for model construction.
#[derive(Error, Debug)]
pub enum SgeError {
    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A vector or matrix does not have the length implied by the topology
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    Dimension {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// More than one good is produced at a node; the flow formulation
    /// assumes each node specializes in a single good.
    #[error("Model incompatible: node {node} produces {goods} goods with nonzero productivity (at most one allowed)")]
    ModelIncompatible { node: usize, goods: usize },

    /// Graph structure errors (self-loops, unknown endpoints, empty regions)
    #[error("Topology error: {0}")]
    Topology(String),
}

/// Convenience type alias for Results using SgeError.
pub type SgeResult<T> = Result<T, SgeError>;

impl SgeError {
    /// Shorthand for a [`SgeError::Dimension`] error.
    pub fn dimension(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        SgeError::Dimension {
            what: what.into(),
            expected,
            actual,
        }
    }
}
