//! The AccessRequest resource

use crate::condition::{find_condition, set_condition_status, Condition, ConditionStatus, ConditionType};
use crate::error::{Result, TypesError};
use crate::meta::{GroupVersionResource, ObjectKey, ObjectMeta, OwnerReference};
use crate::{ACCESS_REQUEST_KIND, ACCESS_REQUEST_RESOURCE, GROUP, RBAC_GROUP, VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity a role is granted to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    /// `User`, `Group` or `ServiceAccount`
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
}

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: "User".to_string(),
            name: name.into(),
            namespace: None,
            api_group: Some(RBAC_GROUP.to_string()),
        }
    }

    pub fn service_account(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: "ServiceAccount".to_string(),
            name: name.into(),
            namespace: Some(namespace.into()),
            api_group: None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => write!(f, "{} {}/{}", self.kind, ns, self.name),
            _ => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Role or cluster role being granted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRef {
    #[serde(default = "default_rbac_group")]
    pub api_group: String,
    /// `Role` or `ClusterRole`
    pub kind: String,
    pub name: String,
}

fn default_rbac_group() -> String {
    RBAC_GROUP.to_string()
}

impl RoleRef {
    pub fn role(name: impl Into<String>) -> Self {
        Self {
            api_group: default_rbac_group(),
            kind: "Role".to_string(),
            name: name.into(),
        }
    }

    pub fn cluster_role(name: impl Into<String>) -> Self {
        Self {
            api_group: default_rbac_group(),
            kind: "ClusterRole".to_string(),
            name: name.into(),
        }
    }
}

/// Provenance of a request. Only admission control writes these fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    /// Write-once identity of the creator
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    /// Approver of record; set together with `approval_time`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub approved_by: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_time: Option<DateTime<Utc>>,
}

impl Attributes {
    /// Both halves of the approval attribution are present
    pub fn has_approval(&self) -> bool {
        !self.approved_by.is_empty() && self.approval_time.is_some()
    }
}

/// Desired state of an access request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestSpec {
    #[serde(default)]
    pub approved: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<Subject>,

    pub role_ref: RoleRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

/// Observed state of an access request
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Set once, the first time every binding is in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
}

impl AccessRequestStatus {
    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        find_condition(&self.conditions, condition_type)
    }

    /// Status of `condition_type`, `None` when it was never recorded
    pub fn condition_status(&self, condition_type: ConditionType) -> Option<ConditionStatus> {
        self.condition(condition_type).map(|c| c.status)
    }

    pub fn set_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> bool {
        set_condition_status(&mut self.conditions, condition_type, status, reason, message, now)
    }

    /// Terminal state: every binding was in place and `Complete` is `True`
    pub fn is_complete(&self) -> bool {
        self.completion_time.is_some()
            && self.condition_status(ConditionType::Complete) == Some(ConditionStatus::True)
    }

    /// Record the completion time unless one is already set
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        if self.completion_time.is_some() {
            return false;
        }
        self.completion_time = Some(now);
        true
    }
}

/// Self-service request to bind a role to a set of subjects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    #[serde(default = "AccessRequest::api_version")]
    pub api_version: String,

    #[serde(default = "AccessRequest::kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    pub spec: AccessRequestSpec,

    #[serde(default)]
    pub status: AccessRequestStatus,
}

impl AccessRequest {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        subjects: Vec<Subject>,
        role_ref: RoleRef,
    ) -> Self {
        Self {
            api_version: Self::api_version(),
            kind: Self::kind(),
            metadata: ObjectMeta::new(namespace, name),
            spec: AccessRequestSpec {
                approved: false,
                subjects,
                role_ref,
                attributes: None,
            },
            status: AccessRequestStatus::default(),
        }
    }

    pub fn api_version() -> String {
        format!("{}/{}", GROUP, VERSION)
    }

    pub fn kind() -> String {
        ACCESS_REQUEST_KIND.to_string()
    }

    /// The resource triple admission control expects to see
    pub fn resource() -> GroupVersionResource {
        GroupVersionResource::new(GROUP, VERSION, ACCESS_REQUEST_RESOURCE)
    }

    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.spec.attributes.as_ref()
    }

    pub fn created_by(&self) -> &str {
        self.attributes().map_or("", |a| a.created_by.as_str())
    }

    pub fn approved_by(&self) -> &str {
        self.attributes().map_or("", |a| a.approved_by.as_str())
    }

    pub fn approval_time(&self) -> Option<DateTime<Utc>> {
        self.attributes().and_then(|a| a.approval_time)
    }

    /// Approved with a complete attribution
    pub fn is_attributed_approval(&self) -> bool {
        self.spec.approved && self.attributes().map_or(false, Attributes::has_approval)
    }

    /// Controller reference pointing at this request
    pub fn controller_reference(&self) -> Result<OwnerReference> {
        if self.metadata.uid.is_empty() {
            return Err(TypesError::MissingUid(self.key().to_string()));
        }
        Ok(OwnerReference {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        })
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Structural checks the store applies before accepting an object
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(TypesError::InvalidField {
                field: "metadata.name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.spec.role_ref.kind.is_empty() || self.spec.role_ref.name.is_empty() {
            return Err(TypesError::InvalidField {
                field: "spec.roleRef".to_string(),
                reason: "kind and name are required".to_string(),
            });
        }
        for (i, subject) in self.spec.subjects.iter().enumerate() {
            if subject.kind.is_empty() || subject.name.is_empty() {
                return Err(TypesError::InvalidField {
                    field: format!("spec.subjects[{}]", i),
                    reason: "kind and name are required".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_minimal_request() {
        let request = AccessRequest::from_value(json!({
            "metadata": {"name": "alice-viewer", "namespace": "team-a"},
            "spec": {
                "subjects": [{"kind": "User", "name": "alice"}],
                "roleRef": {"kind": "Role", "name": "viewer"}
            }
        }))
        .unwrap();

        assert_eq!(request.api_version, "iam.accessrequest.io/v1alpha1");
        assert_eq!(request.kind, "AccessRequest");
        assert!(!request.spec.approved);
        assert!(request.spec.attributes.is_none());
        assert_eq!(request.spec.role_ref.api_group, RBAC_GROUP);
        assert_eq!(request.created_by(), "");
    }

    #[test]
    fn test_attributes_serialize_camel_case() {
        let mut request = AccessRequest::new(
            "team-a",
            "req",
            vec![Subject::user("alice")],
            RoleRef::role("viewer"),
        );
        request.spec.attributes = Some(Attributes {
            created_by: "alice".to_string(),
            approved_by: "bob".to_string(),
            approval_time: Some(Utc::now()),
        });

        let value = request.to_value().unwrap();
        let attributes = &value["spec"]["attributes"];
        assert_eq!(attributes["createdBy"], "alice");
        assert_eq!(attributes["approvedBy"], "bob");
        assert!(attributes["approvalTime"].is_string());
        // not approved yet, so the attribution alone does not count
        assert!(!request.is_attributed_approval());
    }

    #[test]
    fn test_controller_reference_requires_uid() {
        let mut request =
            AccessRequest::new("team-a", "req", vec![], RoleRef::cluster_role("admin"));
        assert!(matches!(
            request.controller_reference(),
            Err(TypesError::MissingUid(_))
        ));

        request.metadata.uid = "1234".to_string();
        let owner = request.controller_reference().unwrap();
        assert!(owner.is_controller());
        assert_eq!(owner.kind, "AccessRequest");
        assert_eq!(owner.uid, "1234");
    }

    #[test]
    fn test_validate_rejects_incomplete_subject() {
        let mut request =
            AccessRequest::new("team-a", "req", vec![Subject::user("")], RoleRef::role("viewer"));
        assert!(request.validate().is_err());

        request.spec.subjects = vec![Subject::user("alice")];
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_completion_time_is_write_once() {
        let mut status = AccessRequestStatus::default();
        let first = Utc::now();
        assert!(status.mark_completed(first));
        assert!(!status.mark_completed(first + chrono::Duration::seconds(5)));
        assert_eq!(status.completion_time, Some(first));
    }

    #[test]
    fn test_complete_needs_time_and_condition() {
        let now = Utc::now();
        let mut status = AccessRequestStatus::default();
        status.set_condition(ConditionType::Complete, ConditionStatus::True, "Done", "", now);
        assert!(!status.is_complete());

        status.mark_completed(now);
        assert!(status.is_complete());

        status.set_condition(ConditionType::Complete, ConditionStatus::False, "Broken", "", now);
        assert!(!status.is_complete());
    }
}
