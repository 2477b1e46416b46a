//! Access review wire types
//!
//! Shaped after `authorization.k8s.io/v1` `SubjectAccessReview` so an HTTP
//! oracle can be backed directly by an API server.

use access_types::{ObjectKey, ACCESS_REQUEST_RESOURCE, APPROVE_VERB, GROUP, VERSION};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributes {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub verb: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReviewSpec {
    pub user: String,
    pub resource_attributes: ResourceAttributes,
}

/// Oracle verdict
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReviewStatus {
    #[serde(default)]
    pub allowed: bool,
    #[serde(default)]
    pub denied: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl AccessReviewStatus {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            denied: false,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            denied: true,
            reason: reason.into(),
        }
    }

    /// Allowed and not explicitly denied
    pub fn is_authorized(&self) -> bool {
        self.allowed && !self.denied
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReview {
    pub api_version: String,
    pub kind: String,
    pub spec: AccessReviewSpec,
    #[serde(default)]
    pub status: AccessReviewStatus,
}

impl AccessReview {
    /// Fixed `approve` check for `user` against the request at `key`
    pub fn approve(user: impl Into<String>, key: &ObjectKey) -> Self {
        Self {
            api_version: "authorization.k8s.io/v1".to_string(),
            kind: "SubjectAccessReview".to_string(),
            spec: AccessReviewSpec {
                user: user.into(),
                resource_attributes: ResourceAttributes {
                    namespace: key.namespace.clone(),
                    verb: APPROVE_VERB.to_string(),
                    group: GROUP.to_string(),
                    version: VERSION.to_string(),
                    resource: ACCESS_REQUEST_RESOURCE.to_string(),
                    name: key.name.clone(),
                },
            },
            status: AccessReviewStatus::default(),
        }
    }

    pub fn user(&self) -> &str {
        &self.spec.user
    }

    pub fn attributes(&self) -> &ResourceAttributes {
        &self.spec.resource_attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_review_shape() {
        let review = AccessReview::approve("bob", &ObjectKey::new("team-a", "alice-viewer"));
        let value = serde_json::to_value(&review).unwrap();
        assert_eq!(value["kind"], "SubjectAccessReview");
        assert_eq!(value["spec"]["user"], "bob");
        let attrs = &value["spec"]["resourceAttributes"];
        assert_eq!(attrs["verb"], "approve");
        assert_eq!(attrs["group"], "iam.accessrequest.io");
        assert_eq!(attrs["version"], "v1alpha1");
        assert_eq!(attrs["resource"], "accessrequests");
        assert_eq!(attrs["namespace"], "team-a");
        assert_eq!(attrs["name"], "alice-viewer");
    }

    #[test]
    fn test_denied_overrides_allowed() {
        let status = AccessReviewStatus {
            allowed: true,
            denied: true,
            reason: String::new(),
        };
        assert!(!status.is_authorized());
        assert!(AccessReviewStatus::allow("ok").is_authorized());
        assert!(!AccessReviewStatus::default().is_authorized());
    }
}
