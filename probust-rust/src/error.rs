// src/error.rs

use thiserror::Error;

/// Fatal errors. Anything recoverable (bad input, a scenario that does not
/// solve) is recorded in a [`crate::status::StatusLog`] instead.
#[derive(Debug, Error)]
pub enum ProbustError {
    /// A broken internal invariant: an empty node reaching the tree solver,
    /// a clustering request with more clusters than points, and the like.
    #[error("structural violation: {0}")]
    StructuralViolation(String),

    /// Matrix and vector shapes that cannot form a linear program.
    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    Dimension {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ProbustError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProbustError::StructuralViolation("empty node".to_string());
        assert!(err.to_string().contains("structural violation"));
        assert!(err.to_string().contains("empty node"));

        let err = ProbustError::Dimension {
            context: "rhs".to_string(),
            expected: 5,
            found: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("rhs"));
        assert!(msg.contains("expected 5"));
        assert!(msg.contains("found 4"));
    }
}
