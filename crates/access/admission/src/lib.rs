//! Access Admission - synchronous pre-commit guards for access requests
//!
//! Two handlers run before a write reaches storage:
//!
//! - [`Mutator`] normalises the object and injects provenance: `createdBy`
//!   on create, `approvedBy` + `approvalTime` on an approval event after a
//!   successful authority check.
//! - [`Validator`] independently re-derives every invariant the mutator
//!   relies on (immutable creator, consistent approval attribution, approver
//!   authority), since either handler may be deployed without the other.
//!
//! Review envelopes of different schema versions are decoded through an
//! injected [`CodecRegistry`] into one canonical [`AdmissionRequest`].

#![deny(unsafe_code)]

pub mod chain;
pub mod codec;
pub mod error;
pub mod mutate;
pub mod patch;
pub mod review;
pub mod validate;

#[cfg(test)]
mod testing;

pub use chain::AdmissionChain;
pub use codec::{CodecRegistry, ReviewCodec, V1Beta1Codec, V1Codec};
pub use error::{AdmissionError, Result};
pub use mutate::Mutator;
pub use patch::{apply_patch, PatchOperation};
pub use review::{AdmissionRequest, AdmissionResponse, Operation, RejectionStatus, UserInfo};
pub use validate::Validator;

use access_types::{AccessRequest, GroupVersionResource};

/// Reject reviews for any resource other than access requests
pub(crate) fn ensure_access_request_resource(resource: &GroupVersionResource) -> Result<()> {
    let expected = AccessRequest::resource();
    if *resource != expected {
        return Err(AdmissionError::WrongResource {
            expected,
            actual: resource.clone(),
        });
    }
    Ok(())
}

pub(crate) fn decode_access_request(
    value: Option<&serde_json::Value>,
    field: &'static str,
) -> Result<AccessRequest> {
    let value = value.ok_or(AdmissionError::MissingObject(field))?;
    serde_json::from_value(value.clone())
        .map_err(|e| AdmissionError::Decode(format!("{}: {}", field, e)))
}
