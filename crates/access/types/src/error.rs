//! Error types for the access data model

use thiserror::Error;

/// Data model errors
#[derive(Debug, Error)]
pub enum TypesError {
    /// The object has not been persisted yet and carries no uid
    #[error("object {0} has no uid")]
    MissingUid(String),

    /// A required field is empty or malformed
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// Conversion to or from JSON failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for data model operations
pub type Result<T> = std::result::Result<T, TypesError>;
