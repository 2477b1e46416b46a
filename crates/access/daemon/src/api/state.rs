//! Application state for API handlers

use access_admission::{AdmissionChain, CodecRegistry};
use access_controller::{Controller, Store};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Storage backend
    pub store: Arc<dyn Store>,

    /// Mutator and validator, shared by the webhooks and the resource API
    pub admission: AdmissionChain,

    /// Review envelope codecs keyed by `apiVersion`
    pub codecs: Arc<CodecRegistry>,

    /// Controller handle
    pub controller: Arc<Controller>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, admission: AdmissionChain, controller: Arc<Controller>) -> Self {
        Self {
            store,
            admission,
            codecs: Arc::new(CodecRegistry::standard()),
            controller,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        }
    }
}
