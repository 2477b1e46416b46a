//! Health and status handlers

use crate::api::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn readyz() -> &'static str {
    "ok"
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Requests waiting for a reconcile worker
    pub queued: usize,
    pub codecs: Vec<&'static str>,
}

pub async fn status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    Json(DaemonStatusResponse {
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        queued: state.controller.queue().len(),
        codecs: state.codecs.versions(),
    })
}
