//! Error types for access-controller

use access_authz::OracleError;
use access_types::TypesError;
use thiserror::Error;

/// Store errors, mirroring the API server's status reasons
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Stale `resourceVersion` on a conditional write
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid: {0}")]
    Invalid(String),
}

impl From<TypesError> for StoreError {
    fn from(e: TypesError) -> Self {
        StoreError::Invalid(e.to_string())
    }
}

/// Why a reconciliation pass did not finish
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Authorization oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// State admission control should have made impossible
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl ReconcileError {
    /// Transient failures are requeued with backoff; invariant violations
    /// wait for the object to change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(StoreError::Invalid(_)) => false,
            Self::Store(_) | Self::Oracle(_) => true,
            Self::InvariantViolation(_) => false,
        }
    }
}

/// Result type for reconciliation
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(ReconcileError::Store(StoreError::Conflict("rv".into())).is_retryable());
        assert!(ReconcileError::Oracle(OracleError::Unavailable("down".into())).is_retryable());
        assert!(!ReconcileError::InvariantViolation("approvedBy".into()).is_retryable());
        assert!(!ReconcileError::Store(StoreError::Invalid("name".into())).is_retryable());
    }
}
