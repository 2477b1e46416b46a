//! Mutating admission handler

use crate::error::{AdmissionError, Result};
use crate::patch::PatchOperation;
use crate::review::{AdmissionRequest, AdmissionResponse, Operation};
use crate::{decode_access_request, ensure_access_request_resource};
use access_authz::ApprovalChecker;
use access_types::AccessRequest;
use chrono::{SubsecRound, Utc};
use serde_json::json;

const ATTRIBUTES: &str = "/spec/attributes";
const CREATED_BY: &str = "/spec/attributes/createdBy";
const APPROVED_BY: &str = "/spec/attributes/approvedBy";
const APPROVAL_TIME: &str = "/spec/attributes/approvalTime";

/// Normalises access requests and injects provenance attributes.
///
/// Holds no per-call state; safe to share across concurrent reviews.
#[derive(Debug, Clone)]
pub struct Mutator {
    checker: ApprovalChecker,
}

impl Mutator {
    pub fn new(checker: ApprovalChecker) -> Self {
        Self { checker }
    }

    /// Review and encode the outcome; errors become rejections
    pub async fn admit(&self, request: &AdmissionRequest) -> AdmissionResponse {
        match self.review(request).await {
            Ok(patch) if patch.is_empty() => AdmissionResponse::allow(&request.uid),
            Ok(patch) => AdmissionResponse::allow_with_patch(&request.uid, patch),
            Err(e) => {
                tracing::warn!(
                    uid = %request.uid,
                    actor = request.actor(),
                    error = %e,
                    "Mutation rejected"
                );
                AdmissionResponse::reject(&request.uid, &e)
            }
        }
    }

    /// Compute the JSON patch for one write
    pub async fn review(&self, request: &AdmissionRequest) -> Result<Vec<PatchOperation>> {
        ensure_access_request_resource(&request.resource)?;

        if request.is_subresource() {
            return Ok(Vec::new());
        }
        let old = match request.operation {
            Operation::Create => None,
            Operation::Update => Some(decode_access_request(
                request.old_object.as_ref(),
                "oldObject",
            )?),
            Operation::Delete | Operation::Connect => return Ok(Vec::new()),
        };

        let raw = request
            .object
            .as_ref()
            .ok_or(AdmissionError::MissingObject("object"))?;
        let object = decode_access_request(Some(raw), "object")?;
        let actor = request.actor();
        let mut patch = Vec::new();

        let raw_attributes = raw.pointer(ATTRIBUTES).filter(|v| v.is_object());
        if raw_attributes.is_none() {
            patch.push(PatchOperation::add(ATTRIBUTES, json!({})));
        }
        let has_member =
            |member: &str| raw_attributes.map_or(false, |a| a.get(member).is_some());

        if request.operation == Operation::Create {
            patch.push(PatchOperation::add(CREATED_BY, json!(actor)));
        }

        if object.spec.approved {
            let prior = old.as_ref().filter(|o| o.is_attributed_approval());
            match prior {
                None => {
                    self.authorize_approval(actor, &object, request).await?;
                    let now = Utc::now().trunc_subsecs(0);
                    patch.push(PatchOperation::add(APPROVED_BY, json!(actor)));
                    patch.push(PatchOperation::add(APPROVAL_TIME, json!(now)));

                    tracing::info!(
                        request = %request.object_key(&object.metadata.namespace, &object.metadata.name),
                        approver = actor,
                        "Stamping approval"
                    );
                }
                Some(prior) => {
                    // not an approval event: keep the attribution of record
                    let restore = |path: &str, member: &str, value| {
                        if has_member(member) {
                            PatchOperation::replace(path, value)
                        } else {
                            PatchOperation::add(path, value)
                        }
                    };
                    if object.approved_by() != prior.approved_by() {
                        patch.push(restore(
                            APPROVED_BY,
                            "approvedBy",
                            json!(prior.approved_by()),
                        ));
                    }
                    if object.approval_time() != prior.approval_time() {
                        patch.push(restore(
                            APPROVAL_TIME,
                            "approvalTime",
                            json!(prior.approval_time()),
                        ));
                    }
                }
            }
        } else {
            if has_member("approvedBy") {
                patch.push(PatchOperation::remove(APPROVED_BY));
            }
            if has_member("approvalTime") {
                patch.push(PatchOperation::remove(APPROVAL_TIME));
            }
        }

        Ok(patch)
    }

    async fn authorize_approval(
        &self,
        actor: &str,
        object: &AccessRequest,
        request: &AdmissionRequest,
    ) -> Result<()> {
        let key = request.object_key(&object.metadata.namespace, &object.metadata.name);
        let status = self.checker.check_approval(actor, &key).await?;
        if !status.is_authorized() {
            return Err(AdmissionError::NotAuthorized {
                actor: actor.to_string(),
                request: key.to_string(),
                reason: status.reason,
            });
        }
        Ok(())
    }
}
