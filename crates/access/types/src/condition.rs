//! Condition ledger
//!
//! Holds at most one [`Condition`] per [`ConditionType`]. Updates are
//! idempotent: re-applying the same status, reason and message leaves the
//! entry (and its timestamps) untouched. A missing condition is never
//! created directly in the `False` state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle condition tracked on an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// The request carries a verified approval
    Approved,
    /// Every requested binding exists and is owned by the request
    Complete,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "Approved"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    pub status: ConditionStatus,

    /// Stamped when the entry is first recorded
    pub last_probe_time: DateTime<Utc>,

    /// Stamped whenever status, reason or message change
    pub last_transition_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    pub fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            condition_type,
            status,
            last_probe_time: now,
            last_transition_time: now,
            reason: reason.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

pub fn find_condition(conditions: &[Condition], condition_type: ConditionType) -> Option<&Condition> {
    conditions.iter().find(|c| c.condition_type == condition_type)
}

/// Upsert a condition in place.
///
/// An existing entry is only rewritten when `(status, reason, message)`
/// differs, in which case `last_transition_time` moves to `now`. A missing
/// entry is appended for `True` and `Unknown`, but not for `False`.
///
/// Returns whether the ledger changed.
pub fn set_condition_status(
    conditions: &mut Vec<Condition>,
    condition_type: ConditionType,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) -> bool {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == condition_type)
    {
        if existing.status == status && existing.reason == reason && existing.message == message {
            return false;
        }
        existing.status = status;
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        existing.last_transition_time = now;
        return true;
    }

    if status == ConditionStatus::False {
        return false;
    }

    conditions.push(Condition::new(condition_type, status, reason, message, now));
    true
}

/// Record `condition_type` as `Unknown` if it has never been observed.
///
/// Existing entries are left alone, so this is the per-pass baseline that
/// lets a later `False` land on something.
pub fn ensure_condition(
    conditions: &mut Vec<Condition>,
    condition_type: ConditionType,
    now: DateTime<Utc>,
) -> bool {
    if find_condition(conditions, condition_type).is_some() {
        return false;
    }
    set_condition_status(conditions, condition_type, ConditionStatus::Unknown, "", "", now)
}
