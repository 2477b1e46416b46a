//! Lifecycle events published by the controller

use access_types::ObjectKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event envelope with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// The access request the event concerns
    pub request: ObjectKey,

    pub event: AccessEvent,
}

impl AccessEventEnvelope {
    pub fn new(request: ObjectKey, event: AccessEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            request,
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AccessEvent {
    /// `Approved` became true
    Approved { approver: String },

    /// The approver of record no longer holds approval authority
    ApproverDenied { approver: String, reason: String },

    BindingCreated { binding: String, subject: String },

    /// A binding with the deterministic name exists but is not ours
    BindingConflict { bindings: Vec<String> },

    /// Every subject's binding is in place
    Completed { bindings: usize },

    ReconcileFailed { reason: String, retrying: bool },
}

impl AccessEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approved { .. } => "approved",
            Self::ApproverDenied { .. } => "approver_denied",
            Self::BindingCreated { .. } => "binding_created",
            Self::BindingConflict { .. } => "binding_conflict",
            Self::Completed { .. } => "completed",
            Self::ReconcileFailed { .. } => "reconcile_failed",
        }
    }
}
