//! Access Daemon library
//!
//! Wires the access crates into one process:
//! - admission webhook endpoints (`/mutate`, `/validate`)
//! - a resource API over the in-memory store, admitted through the same chain
//! - the reconciliation controller
//! - server lifecycle and graceful shutdown

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use api::{create_router, AppState};
pub use config::{AuthorizationConfig, DaemonConfig, LoggingConfig, ServerConfig};
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
pub use server::Server;
