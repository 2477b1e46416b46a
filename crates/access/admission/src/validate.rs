//! Validating admission handler
//!
//! Runs after mutation and trusts none of it: the creator, the approval
//! attribution and the approver's authority are all re-derived here.

use crate::error::{AdmissionError, Result};
use crate::review::{AdmissionRequest, AdmissionResponse, Operation};
use crate::{decode_access_request, ensure_access_request_resource};
use access_authz::ApprovalChecker;
use access_types::AccessRequest;

#[derive(Debug, Clone)]
pub struct Validator {
    checker: ApprovalChecker,
}

impl Validator {
    pub fn new(checker: ApprovalChecker) -> Self {
        Self { checker }
    }

    pub async fn admit(&self, request: &AdmissionRequest) -> AdmissionResponse {
        match self.review(request).await {
            Ok(()) => AdmissionResponse::allow(&request.uid),
            Err(e) => {
                tracing::warn!(
                    uid = %request.uid,
                    actor = request.actor(),
                    error = %e,
                    "Validation rejected"
                );
                AdmissionResponse::reject(&request.uid, &e)
            }
        }
    }

    pub async fn review(&self, request: &AdmissionRequest) -> Result<()> {
        ensure_access_request_resource(&request.resource)?;

        if request.is_subresource() {
            return Ok(());
        }
        // deletes carry no new object
        if request.object.is_none()
            && matches!(request.operation, Operation::Delete | Operation::Connect)
        {
            return Ok(());
        }

        let object = decode_access_request(request.object.as_ref(), "object")?;
        let actor = request.actor();

        let old = match request.operation {
            Operation::Create => {
                if object.created_by() != actor {
                    return Err(AdmissionError::InvalidAttribution(format!(
                        "spec.attributes.createdBy must be the requesting user {:?}, got {:?}",
                        actor,
                        object.created_by()
                    )));
                }
                None
            }
            Operation::Update | Operation::Delete | Operation::Connect => {
                let old = decode_access_request(request.old_object.as_ref(), "oldObject")?;
                if object.created_by().is_empty() || object.created_by() != old.created_by() {
                    return Err(AdmissionError::Immutable("spec.attributes.createdBy"));
                }
                // a completed request's bindings are final
                if old.status.is_complete() {
                    if object.spec.subjects != old.spec.subjects {
                        return Err(AdmissionError::Immutable("spec.subjects"));
                    }
                    if object.spec.role_ref != old.spec.role_ref {
                        return Err(AdmissionError::Immutable("spec.roleRef"));
                    }
                }
                Some(old)
            }
        };

        if !object.spec.approved {
            return check_pairing(&object);
        }

        if object.approved_by().is_empty() {
            return Err(AdmissionError::InvalidAttribution(
                "approved access requests require spec.attributes.approvedBy".to_string(),
            ));
        }
        check_pairing(&object)?;

        match old.as_ref().filter(|o| o.is_attributed_approval()) {
            Some(prior) => {
                if object.approved_by() != prior.approved_by()
                    || object.approval_time() != prior.approval_time()
                {
                    return Err(AdmissionError::Immutable("spec.attributes.approvedBy"));
                }
            }
            None => {
                if object.approved_by() != actor {
                    return Err(AdmissionError::InvalidAttribution(format!(
                        "approval by {:?} attributed to {:?}",
                        actor,
                        object.approved_by()
                    )));
                }
            }
        }

        let key = request.object_key(&object.metadata.namespace, &object.metadata.name);
        let status = self.checker.check_approval(object.approved_by(), &key).await?;
        if !status.is_authorized() {
            return Err(AdmissionError::NotAuthorized {
                actor: object.approved_by().to_string(),
                request: key.to_string(),
                reason: status.reason,
            });
        }
        Ok(())
    }
}

/// `approvedBy` and `approvalTime` are set together or not at all
fn check_pairing(object: &AccessRequest) -> Result<()> {
    let has_approver = !object.approved_by().is_empty();
    let has_time = object.approval_time().is_some();
    if has_approver != has_time {
        return Err(AdmissionError::InvalidAttribution(
            "spec.attributes.approvedBy and spec.attributes.approvalTime must be set together"
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn stamped(approver: &str) -> serde_json::Value {
        json!({
            "createdBy": "alice",
            "approvedBy": approver,
            "approvalTime": "2024-01-01T00:00:00Z"
        })
    }

    fn completed(mut object: serde_json::Value) -> serde_json::Value {
        let condition = |kind: &str, reason: &str| {
            json!({
                "type": kind,
                "status": "True",
                "lastProbeTime": "2024-01-01T00:00:00Z",
                "lastTransitionTime": "2024-01-01T00:00:00Z",
                "reason": reason
            })
        };
        object["status"] = json!({
            "conditions": [
                condition("Approved", "AccessRequestApproved"),
                condition("Complete", "RoleBindingsCreated")
            ],
            "completionTime": "2024-01-01T00:00:05Z"
        });
        object
    }

    #[tokio::test]
    async fn test_create_requires_creator_to_be_actor() {
        let validator = Validator::new(checker());

        let ok = admission(
            Operation::Create,
            "alice",
            Some(request_json(false, Some(json!({"createdBy": "alice"})))),
            None,
        );
        assert!(validator.review(&ok).await.is_ok());

        let spoofed = admission(
            Operation::Create,
            "alice",
            Some(request_json(false, Some(json!({"createdBy": "mallory"})))),
            None,
        );
        let response = validator.admit(&spoofed).await;
        assert!(!response.allowed);
        assert_eq!(response.rejection.unwrap().code, 403);
    }

    #[tokio::test]
    async fn test_creator_is_immutable() {
        let validator = Validator::new(checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        let new = request_json(false, Some(json!({"createdBy": "mallory"})));

        let err = validator
            .review(&admission(Operation::Update, "mallory", Some(new), Some(old)))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Immutable("spec.attributes.createdBy")));
    }

    #[tokio::test]
    async fn test_creator_cannot_be_cleared() {
        let validator = Validator::new(checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        let new = request_json(false, None);
        assert!(validator
            .review(&admission(Operation::Update, "alice", Some(new), Some(old)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_approved_without_approver_rejected() {
        let validator = Validator::new(checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        let new = request_json(true, Some(json!({"createdBy": "alice"})));

        let err = validator
            .review(&admission(Operation::Update, "bob", Some(new), Some(old)))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidAttribution(_)));
    }

    #[tokio::test]
    async fn test_approval_event_by_approver_allowed() {
        let validator = Validator::new(checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        let new = request_json(true, Some(stamped("bob")));
        assert!(validator
            .review(&admission(Operation::Update, "bob", Some(new), Some(old)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_approver_of_record_is_rechecked() {
        let validator = Validator::new(checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        let new = request_json(true, Some(stamped("eve")));

        let response = validator
            .admit(&admission(Operation::Update, "eve", Some(new), Some(old)))
            .await;
        assert!(!response.allowed);
        let rejection = response.rejection.unwrap();
        assert_eq!(rejection.code, 403);
        assert!(rejection.message.contains("eve"));
    }

    #[tokio::test]
    async fn test_approval_must_name_the_actor() {
        let validator = Validator::new(checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        // alice flips approved and claims bob did it
        let new = request_json(true, Some(stamped("bob")));

        let err = validator
            .review(&admission(Operation::Update, "alice", Some(new), Some(old)))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidAttribution(_)));
    }

    #[tokio::test]
    async fn test_attribution_of_record_cannot_be_rewritten() {
        let validator = Validator::new(checker());
        let old = request_json(true, Some(stamped("bob")));
        let mut new = request_json(true, Some(stamped("bob")));
        new["spec"]["attributes"]["approvalTime"] = json!("2030-01-01T00:00:00Z");

        let err = validator
            .review(&admission(Operation::Update, "bob", Some(new), Some(old)))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Immutable("spec.attributes.approvedBy")));
    }

    #[tokio::test]
    async fn test_unrelated_update_of_approved_request_allowed() {
        let validator = Validator::new(checker());
        let old = request_json(true, Some(stamped("bob")));
        let mut new = request_json(true, Some(stamped("bob")));
        new["metadata"]["labels"] = json!({"team": "a"});

        // the creator may still edit; the approver of record is what gets checked
        assert!(validator
            .review(&admission(Operation::Update, "alice", Some(new), Some(old)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_completed_request_freezes_grant() {
        let validator = Validator::new(checker());
        let old = completed(request_json(true, Some(stamped("bob"))));

        let mut widened = old.clone();
        widened["spec"]["subjects"] = json!([
            {"kind": "User", "name": "alice"},
            {"kind": "User", "name": "mallory"}
        ]);
        let err = validator
            .review(&admission(Operation::Update, "alice", Some(widened), Some(old.clone())))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Immutable("spec.subjects")));

        let mut escalated = old.clone();
        escalated["spec"]["roleRef"]["name"] = json!("admin");
        let response = validator
            .admit(&admission(Operation::Update, "alice", Some(escalated), Some(old.clone())))
            .await;
        assert!(!response.allowed);
        assert_eq!(response.rejection.unwrap().code, 403);

        let mut relabelled = old.clone();
        relabelled["metadata"]["labels"] = json!({"team": "a"});
        assert!(validator
            .review(&admission(Operation::Update, "alice", Some(relabelled), Some(old)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_subjects_editable_before_completion() {
        let validator = Validator::new(checker());
        let old = request_json(true, Some(stamped("bob")));
        let mut new = old.clone();
        new["spec"]["subjects"] = json!([{"kind": "User", "name": "carol"}]);
        assert!(validator
            .review(&admission(Operation::Update, "alice", Some(new), Some(old)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_half_attribution_rejected_when_unapproved() {
        let validator = Validator::new(checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        let new = request_json(
            false,
            Some(json!({"createdBy": "alice", "approvedBy": "bob"})),
        );
        assert!(matches!(
            validator
                .review(&admission(Operation::Update, "alice", Some(new), Some(old)))
                .await,
            Err(AdmissionError::InvalidAttribution(_))
        ));
    }

    #[tokio::test]
    async fn test_oracle_outage_rejects_approved_write() {
        let validator = Validator::new(unavailable_checker());
        let old = request_json(false, Some(json!({"createdBy": "alice"})));
        let new = request_json(true, Some(stamped("bob")));

        let response = validator
            .admit(&admission(Operation::Update, "bob", Some(new), Some(old)))
            .await;
        assert!(!response.allowed);
        assert_eq!(response.rejection.unwrap().code, 500);
    }

    #[tokio::test]
    async fn test_delete_without_object_allowed() {
        let validator = Validator::new(unavailable_checker());
        let review = admission(
            Operation::Delete,
            "alice",
            None,
            Some(request_json(true, Some(stamped("bob")))),
        );
        assert!(validator.review(&review).await.is_ok());
    }

    proptest! {
        #[test]
        fn prop_changed_creator_always_rejected(
            original in "[a-z]{1,12}",
            replacement in "[a-z]{0,12}",
            approved in any::<bool>(),
        ) {
            prop_assume!(original != replacement);
            let old = request_json(approved, Some(json!({"createdBy": original})));
            let new = request_json(approved, Some(json!({"createdBy": replacement})));
            let review = admission(Operation::Update, "bob", Some(new), Some(old));

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = runtime.block_on(Validator::new(checker()).review(&review));
            prop_assert!(matches!(result, Err(AdmissionError::Immutable("spec.attributes.createdBy"))));
        }
    }
}
