//! One reconciliation pass over one access request
//!
//! Every pass starts from a fresh read and re-derives the whole state; the
//! only persistence is binding creation (idempotent through deterministic
//! names plus the ownership check) and one conditional status write at the
//! end. A pass can therefore be abandoned at any point and rerun.

use crate::error::{ReconcileError, Result, StoreError};
use crate::events::{AccessEvent, AccessEventEnvelope};
use crate::store::{BindingStore, RequestStore, Store};
use access_authz::ApprovalChecker;
use access_types::{
    ensure_condition, AccessRequest, AccessRequestStatus, ConditionStatus, ConditionType,
    ObjectKey, RoleBinding, Subject,
};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

pub const REASON_WAITING_FOR_APPROVAL: &str = "WaitingForApproval";
pub const REASON_APPROVED: &str = "AccessRequestApproved";
pub const REASON_INVALID_APPROVAL: &str = "InvalidApproval";
pub const REASON_APPROVER_DENIED: &str = "ApproverDenied";
pub const REASON_BINDING_CONFLICT: &str = "RoleBindingConflict";
pub const REASON_WAITING_FOR_BINDINGS: &str = "WaitingForRoleBindings";
pub const REASON_BINDINGS_CREATED: &str = "RoleBindingsCreated";

/// Where a pass left the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The request no longer exists; owned bindings go with it
    Missing,
    WaitingForApproval,
    ApproverDenied,
    /// Bindings were created this pass; their watch events trigger the next
    WaitingForBindings { created: usize },
    Conflict { bindings: Vec<String> },
    Complete,
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    checker: ApprovalChecker,
    events: broadcast::Sender<AccessEventEnvelope>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn Store>,
        checker: ApprovalChecker,
        events: broadcast::Sender<AccessEventEnvelope>,
    ) -> Self {
        Self {
            store,
            checker,
            events,
        }
    }

    pub fn emit(&self, request: &ObjectKey, event: AccessEvent) {
        tracing::debug!(request = %request, event = event.name(), "Emitting access event");
        let _ = self
            .events
            .send(AccessEventEnvelope::new(request.clone(), event));
    }

    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let Some(request) = self.store.get_request(key).await? else {
            tracing::debug!(request = %key, "Access request gone");
            return Ok(ReconcileOutcome::Missing);
        };

        let now = Utc::now().trunc_subsecs(0);
        let mut pass = Pass::new(&request, now);

        if !request.spec.approved {
            pass.set(
                ConditionType::Approved,
                ConditionStatus::False,
                REASON_WAITING_FOR_APPROVAL,
                "AccessRequest is waiting for approval",
            );
            self.commit(&request, pass).await?;
            return Ok(ReconcileOutcome::WaitingForApproval);
        }

        if !request.is_attributed_approval() {
            let message = "AccessRequest is approved but approvedBy and approvalTime are not both set";
            pass.set(
                ConditionType::Complete,
                ConditionStatus::False,
                REASON_INVALID_APPROVAL,
                message,
            );
            self.commit(&request, pass).await?;
            return Err(ReconcileError::InvariantViolation(format!(
                "{}: {}",
                key, message
            )));
        }

        let approver = request.approved_by().to_string();
        if pass.set(
            ConditionType::Approved,
            ConditionStatus::True,
            REASON_APPROVED,
            &format!("AccessRequest approved by {}", approver),
        ) {
            pass.events.push(AccessEvent::Approved {
                approver: approver.clone(),
            });
        }

        // terminal: no further transitions once complete
        if pass.status.is_complete() {
            pass.decide(ConditionType::Complete);
            self.commit(&request, pass).await?;
            return Ok(ReconcileOutcome::Complete);
        }

        // authority may have been revoked since admission
        let review = self.checker.check_approval(&approver, key).await?;
        if !review.is_authorized() {
            tracing::warn!(
                request = %key,
                approver = %approver,
                reason = %review.reason,
                "Approver no longer holds approval authority"
            );
            if pass.set(
                ConditionType::Complete,
                ConditionStatus::False,
                REASON_APPROVER_DENIED,
                &format!("{} may no longer approve: {}", approver, review.reason),
            ) {
                pass.events.push(AccessEvent::ApproverDenied {
                    approver,
                    reason: review.reason,
                });
            }
            self.commit(&request, pass).await?;
            return Ok(ReconcileOutcome::ApproverDenied);
        }

        let mut created = 0;
        let mut conflicts = Vec::new();
        for subject in &request.spec.subjects {
            match self.ensure_binding(&request, subject).await? {
                BindingState::Created(name) => {
                    created += 1;
                    self.emit(
                        key,
                        AccessEvent::BindingCreated {
                            binding: name,
                            subject: subject.to_string(),
                        },
                    );
                }
                BindingState::Owned => {}
                BindingState::Foreign(name) => {
                    if !conflicts.contains(&name) {
                        conflicts.push(name);
                    }
                }
            }
        }

        let role = format!(
            "{}/{}",
            request.spec.role_ref.kind, request.spec.role_ref.name
        );
        if !conflicts.is_empty() {
            tracing::warn!(
                request = %key,
                bindings = ?conflicts,
                "RoleBinding name taken by an object this request does not own"
            );
            if pass.set(
                ConditionType::Complete,
                ConditionStatus::False,
                REASON_BINDING_CONFLICT,
                &format!(
                    "RoleBinding {} exists and is not owned by this AccessRequest",
                    conflicts.join(", ")
                ),
            ) {
                pass.events.push(AccessEvent::BindingConflict {
                    bindings: conflicts.clone(),
                });
            }
            self.commit(&request, pass).await?;
            return Ok(ReconcileOutcome::Conflict {
                bindings: conflicts,
            });
        }

        if created > 0 {
            pass.set(
                ConditionType::Complete,
                ConditionStatus::Unknown,
                REASON_WAITING_FOR_BINDINGS,
                &format!("created {} RoleBinding(s) for {}", created, role),
            );
            self.commit(&request, pass).await?;
            return Ok(ReconcileOutcome::WaitingForBindings { created });
        }

        let bindings = request.spec.subjects.len();
        pass.status.mark_completed(now);
        pass.set(
            ConditionType::Complete,
            ConditionStatus::True,
            REASON_BINDINGS_CREATED,
            &format!("{} bound to {} subject(s)", role, bindings),
        );
        pass.events.push(AccessEvent::Completed { bindings });
        tracing::info!(request = %key, role = %role, subjects = bindings, "Access request complete");

        self.commit(&request, pass).await?;
        Ok(ReconcileOutcome::Complete)
    }

    async fn ensure_binding(&self, request: &AccessRequest, subject: &Subject) -> Result<BindingState> {
        let desired = RoleBinding::for_subject(request, subject)
            .map_err(|e| ReconcileError::InvariantViolation(e.to_string()))?;
        let binding_key = desired.key();

        let existing = match self.store.get_binding(&binding_key).await? {
            Some(existing) => existing,
            None => match self.store.create_binding(desired).await {
                Ok(_) => {
                    tracing::info!(
                        request = %request.key(),
                        binding = %binding_key.name,
                        subject = %subject,
                        "Created RoleBinding"
                    );
                    return Ok(BindingState::Created(binding_key.name));
                }
                // lost a race; classify whatever won
                Err(StoreError::AlreadyExists(_)) => self
                    .store
                    .get_binding(&binding_key)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("RoleBinding {}", binding_key)))?,
                Err(e) => return Err(e.into()),
            },
        };

        if existing.metadata.is_controlled_by(&request.metadata.uid) {
            Ok(BindingState::Owned)
        } else {
            Ok(BindingState::Foreign(binding_key.name))
        }
    }

    /// Conditional status write, then publish the pass's events
    async fn commit(&self, request: &AccessRequest, pass: Pass) -> Result<()> {
        let key = request.key();
        let (status, events) = pass.finish();
        if status != request.status {
            let mut updated = request.clone();
            updated.status = status;
            self.store.update_request_status(updated).await?;
            tracing::debug!(request = %key, "Updated access request status");
        }
        for event in events {
            self.emit(&key, event);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("checker", &self.checker)
            .finish_non_exhaustive()
    }
}

enum BindingState {
    Created(String),
    Owned,
    Foreign(String),
}

/// Status being computed by one pass, plus the events it will publish.
///
/// Every condition starts the pass at `Unknown`. A condition the pass never
/// decides is reset when the pass finishes, so an outcome recorded by an
/// earlier pass cannot outlive the state that produced it.
struct Pass {
    status: AccessRequestStatus,
    events: Vec<AccessEvent>,
    decided: Vec<ConditionType>,
    now: DateTime<Utc>,
}

impl Pass {
    const CONDITIONS: [ConditionType; 2] = [ConditionType::Approved, ConditionType::Complete];

    fn new(request: &AccessRequest, now: DateTime<Utc>) -> Self {
        let mut status = request.status.clone();
        for condition_type in Self::CONDITIONS {
            ensure_condition(&mut status.conditions, condition_type, now);
        }
        Self {
            status,
            events: Vec::new(),
            decided: Vec::new(),
            now,
        }
    }

    fn set(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
    ) -> bool {
        self.decide(condition_type);
        self.status
            .set_condition(condition_type, status, reason, message, self.now)
    }

    /// Carry the recorded condition over unchanged
    fn decide(&mut self, condition_type: ConditionType) {
        if !self.decided.contains(&condition_type) {
            self.decided.push(condition_type);
        }
    }

    /// Reset every undecided condition to the `Unknown` baseline
    fn finish(mut self) -> (AccessRequestStatus, Vec<AccessEvent>) {
        for condition_type in Self::CONDITIONS {
            if !self.decided.contains(&condition_type) {
                self.status.set_condition(
                    condition_type,
                    ConditionStatus::Unknown,
                    "",
                    "",
                    self.now,
                );
            }
        }
        (self.status, self.events)
    }
}
