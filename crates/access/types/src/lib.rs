//! Access Types - data model for approval-gated role grants
//!
//! An [`AccessRequest`] names a set of subjects and a role. Once a second
//! party with `approve` authority flips `spec.approved`, the controller
//! provisions one [`RoleBinding`] per subject, each owned by the request.
//!
//! ## Key Concepts
//!
//! - **AccessRequest**: the user-facing request resource
//! - **Attributes**: provenance (`createdBy`, `approvedBy`, `approvalTime`)
//! - **Condition ledger**: `Approved` / `Complete` lifecycle conditions
//! - **RoleBinding**: the provisioned grant, named deterministically

#![deny(unsafe_code)]

pub mod binding;
pub mod condition;
pub mod error;
pub mod meta;
pub mod request;

pub use binding::{binding_name, RoleBinding, BINDING_NAME_PREFIX};
pub use condition::{
    ensure_condition, find_condition, set_condition_status, Condition, ConditionStatus,
    ConditionType,
};
pub use error::{Result, TypesError};
pub use meta::{GroupVersionResource, ObjectKey, ObjectMeta, OwnerReference};
pub use request::{
    AccessRequest, AccessRequestSpec, AccessRequestStatus, Attributes, RoleRef, Subject,
};

/// API group served for access requests
pub const GROUP: &str = "iam.accessrequest.io";

/// API version served for access requests
pub const VERSION: &str = "v1alpha1";

/// Kind of the request resource
pub const ACCESS_REQUEST_KIND: &str = "AccessRequest";

/// Plural resource name used in authorization checks and admission matching
pub const ACCESS_REQUEST_RESOURCE: &str = "accessrequests";

/// Verb an approver must hold on the request
pub const APPROVE_VERB: &str = "approve";

/// RBAC API group of provisioned bindings
pub const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// RBAC API version of provisioned bindings
pub const RBAC_VERSION: &str = "v1";
