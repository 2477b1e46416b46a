//! Provisioned role bindings

use crate::error::Result;
use crate::meta::{ObjectKey, ObjectMeta};
use crate::request::{AccessRequest, RoleRef, Subject};
use crate::{RBAC_GROUP, RBAC_VERSION};
use serde::{Deserialize, Serialize};

/// Prefix of every binding name this system generates
pub const BINDING_NAME_PREFIX: &str = "accessrequest-";

/// Deterministic binding name for one subject of a request.
///
/// Pure function of `(subject.kind, subject.namespace, subject.name,
/// role_ref.kind, role_ref.name)`. Fields are NUL-separated before hashing
/// so that shifting characters between fields cannot produce the same input.
pub fn binding_name(subject: &Subject, role_ref: &RoleRef) -> String {
    let mut hasher = blake3::Hasher::new();
    for field in [
        subject.kind.as_str(),
        subject.namespace.as_deref().unwrap_or(""),
        subject.name.as_str(),
        role_ref.kind.as_str(),
        role_ref.name.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update(&[0]);
    }
    let digest = hasher.finalize();
    format!("{}{}", BINDING_NAME_PREFIX, hex::encode(&digest.as_bytes()[..16]))
}

/// Grant of a role to a set of subjects within a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBinding {
    #[serde(default = "RoleBinding::api_version")]
    pub api_version: String,

    #[serde(default = "RoleBinding::kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<Subject>,

    pub role_ref: RoleRef,
}

impl RoleBinding {
    pub fn api_version() -> String {
        format!("{}/{}", RBAC_GROUP, RBAC_VERSION)
    }

    pub fn kind() -> String {
        "RoleBinding".to_string()
    }

    /// Binding granting `request.spec.roleRef` to exactly `subject`,
    /// controlled by `request`. Lives in the request's namespace.
    pub fn for_subject(request: &AccessRequest, subject: &Subject) -> Result<Self> {
        let owner = request.controller_reference()?;
        let mut metadata = ObjectMeta::new(
            request.metadata.namespace.clone(),
            binding_name(subject, &request.spec.role_ref),
        );
        metadata
            .labels
            .insert("iam.accessrequest.io/request".to_string(), request.metadata.name.clone());
        metadata.owner_references.push(owner);

        Ok(Self {
            api_version: Self::api_version(),
            kind: Self::kind(),
            metadata,
            subjects: vec![subject.clone()],
            role_ref: request.spec.role_ref.clone(),
        })
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_name_is_stable() {
        let a = binding_name(&Subject::user("alice"), &RoleRef::role("viewer"));
        let b = binding_name(&Subject::user("alice"), &RoleRef::role("viewer"));
        assert_eq!(a, b);
        assert!(a.starts_with(BINDING_NAME_PREFIX));
        assert_eq!(a.len(), BINDING_NAME_PREFIX.len() + 32);
    }

    #[test]
    fn test_name_ignores_api_group() {
        let mut subject = Subject::user("alice");
        let a = binding_name(&subject, &RoleRef::role("viewer"));
        subject.api_group = None;
        assert_eq!(a, binding_name(&subject, &RoleRef::role("viewer")));
    }

    #[test]
    fn test_role_kind_distinguishes_names() {
        let subject = Subject::user("alice");
        assert_ne!(
            binding_name(&subject, &RoleRef::role("admin")),
            binding_name(&subject, &RoleRef::cluster_role("admin"))
        );
    }

    #[test]
    fn test_field_boundaries_matter() {
        let a = Subject {
            kind: "User".to_string(),
            name: "ab".to_string(),
            namespace: Some("c".to_string()),
            api_group: None,
        };
        let b = Subject {
            kind: "User".to_string(),
            name: "b".to_string(),
            namespace: Some("ca".to_string()),
            api_group: None,
        };
        let role = RoleRef::role("viewer");
        assert_ne!(binding_name(&a, &role), binding_name(&b, &role));
    }

    #[test]
    fn test_for_subject_sets_controller_owner() {
        let mut request = AccessRequest::new(
            "team-a",
            "alice-viewer",
            vec![Subject::user("alice")],
            RoleRef::role("viewer"),
        );
        request.metadata.uid = "uid-42".to_string();

        let binding = RoleBinding::for_subject(&request, &request.spec.subjects[0]).unwrap();
        assert_eq!(binding.metadata.namespace, "team-a");
        assert_eq!(binding.subjects, vec![Subject::user("alice")]);
        assert_eq!(binding.role_ref, RoleRef::role("viewer"));
        assert!(binding.metadata.is_controlled_by("uid-42"));
    }

    proptest! {
        #[test]
        fn property_distinct_subjects_get_distinct_names(
            a in "[a-z]{1,8}",
            b in "[a-z]{1,8}",
            role in "[a-z]{1,8}",
        ) {
            prop_assume!(a != b);
            let role = RoleRef::role(role);
            prop_assert_ne!(
                binding_name(&Subject::user(a), &role),
                binding_name(&Subject::user(b), &role)
            );
        }
    }
}
