//! Admission errors
//!
//! Every error becomes a rejection; admission has no retry point, so
//! transient oracle failures fail the write closed.

use access_authz::OracleError;
use access_types::GroupVersionResource;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The webhook was wired to the wrong resource type
    #[error("expected resource {expected}, got {actual}")]
    WrongResource {
        expected: GroupVersionResource,
        actual: GroupVersionResource,
    },

    #[error("request could not be decoded: {0}")]
    Decode(String),

    #[error("unsupported admission review version: {0}")]
    UnsupportedVersion(String),

    #[error("admission request carries no {0}")]
    MissingObject(&'static str),

    #[error("patch could not be applied: {0}")]
    Patch(String),

    #[error("{0}")]
    Oracle(#[from] OracleError),

    #[error("{actor} is not allowed to approve AccessRequest {request}: {reason}")]
    NotAuthorized {
        actor: String,
        request: String,
        reason: String,
    },

    #[error("{0} is immutable")]
    Immutable(&'static str),

    #[error("{0}")]
    InvalidAttribution(String),
}

impl AdmissionError {
    /// HTTP-style status code carried in the rejection
    pub fn code(&self) -> u16 {
        match self {
            Self::WrongResource { .. }
            | Self::Decode(_)
            | Self::UnsupportedVersion(_)
            | Self::MissingObject(_)
            | Self::Patch(_) => 400,
            Self::NotAuthorized { .. } | Self::Immutable(_) | Self::InvalidAttribution(_) => 403,
            Self::Oracle(_) => 500,
        }
    }
}

/// Result type for admission operations
pub type Result<T> = std::result::Result<T, AdmissionError>;
