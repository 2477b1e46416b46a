//! Oracle client errors

use thiserror::Error;

/// Failures issuing an authorization query.
///
/// A denial is not an error; it is an [`AccessReviewStatus`](crate::AccessReviewStatus)
/// with `allowed == false`.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The query could not be issued or no answer came back
    #[error("authorization oracle unavailable: {0}")]
    Unavailable(String),

    /// An answer came back but could not be understood
    #[error("invalid authorization oracle response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        OracleError::Unavailable(e.to_string())
    }
}

/// Result type for oracle operations
pub type Result<T> = std::result::Result<T, OracleError>;
