//! Access Authz - "may subject S approve request R" oracle client
//!
//! The oracle is opaque: it receives an access review naming a user, a verb
//! and a resource, and answers allow or deny with a reason. Admission control
//! and the reconciler both go through [`ApprovalChecker`] so the two
//! independent authority checks issue the identical question.

#![deny(unsafe_code)]

pub mod error;
pub mod http;
pub mod oracle;
pub mod review;
pub mod static_oracle;

pub use error::{OracleError, Result};
pub use http::{HttpOracle, HttpOracleConfig};
pub use oracle::{ApprovalChecker, AuthorizationOracle};
pub use review::{AccessReview, AccessReviewSpec, AccessReviewStatus, ResourceAttributes};
pub use static_oracle::{ApproverRule, StaticOracle};
