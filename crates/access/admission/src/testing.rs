//! Shared fixtures for handler tests

use crate::review::{AdmissionRequest, Operation};
use access_authz::{
    AccessReview, AccessReviewStatus, ApprovalChecker, AuthorizationOracle, OracleError,
    StaticOracle,
};
use access_types::AccessRequest;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// `bob` may approve in every namespace
pub fn checker() -> ApprovalChecker {
    ApprovalChecker::new(Arc::new(StaticOracle::new().with_approver("bob", ["*"])))
}

#[derive(Debug)]
struct Unavailable;

#[async_trait]
impl AuthorizationOracle for Unavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn review(&self, _review: &AccessReview) -> access_authz::Result<AccessReviewStatus> {
        Err(OracleError::Unavailable("connection refused".to_string()))
    }
}

pub fn unavailable_checker() -> ApprovalChecker {
    ApprovalChecker::new(Arc::new(Unavailable))
}

pub fn request_json(approved: bool, attributes: Option<Value>) -> Value {
    let mut object = json!({
        "apiVersion": "iam.accessrequest.io/v1alpha1",
        "kind": "AccessRequest",
        "metadata": {"name": "alice-viewer", "namespace": "team-a", "uid": "uid-1"},
        "spec": {
            "approved": approved,
            "subjects": [{"kind": "User", "name": "alice"}],
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": "viewer"}
        }
    });
    if let Some(attributes) = attributes {
        object["spec"]["attributes"] = attributes;
    }
    object
}

pub fn admission(
    operation: Operation,
    actor: &str,
    object: Option<Value>,
    old_object: Option<Value>,
) -> AdmissionRequest {
    let mut request = AdmissionRequest::new(operation, AccessRequest::resource(), actor);
    request.uid = "review-1".to_string();
    request.namespace = "team-a".to_string();
    request.name = "alice-viewer".to_string();
    request.object = object;
    request.old_object = old_object;
    request
}
