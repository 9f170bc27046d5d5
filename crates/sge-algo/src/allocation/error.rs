use sge_core::SgeError;
use thiserror::Error;

/// Errors raised while building or evaluating an allocation problem.
#[derive(Error, Debug)]
pub enum AllocationError {
    /// Invalid topology or parameters
    #[error(transparent)]
    Model(#[from] SgeError),

    /// A value pass produced an entry outside the declared sparsity pattern.
    /// Always a programming error; never silently dropped.
    #[error("Sparsity pattern mismatch: entry ({row}, {col}) is not in the declared pattern")]
    PatternMismatch { row: usize, col: usize },

    /// Malformed pattern declaration (out of shape, upper triangle in a lower-triangular pattern)
    #[error("Invalid sparsity pattern: {0}")]
    InvalidPattern(String),

    /// Caller-supplied vector has the wrong length
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Backend requested that was not compiled in
    #[error("Solver backend '{0}' is not available (rebuild with the matching cargo feature)")]
    SolverUnavailable(String),

    /// Problem shape the backend cannot handle
    #[error("Unsupported problem: {0}")]
    Unsupported(String),

    /// Numerical convergence issue
    #[error("Numerical issue: {0}")]
    NumericalIssue(String),
}

impl AllocationError {
    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected != actual {
            return Err(AllocationError::DimensionMismatch {
                what,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_is_transparent() {
        let err: AllocationError = SgeError::ModelIncompatible { node: 1, goods: 2 }.into();
        assert!(err.to_string().starts_with("Model incompatible"));
    }

    #[test]
    fn test_check_len() {
        assert!(AllocationError::check_len("x", 3, 3).is_ok());
        let err = AllocationError::check_len("x", 3, 2).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }
}
