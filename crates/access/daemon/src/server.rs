//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use access_admission::AdmissionChain;
use access_authz::{ApprovalChecker, AuthorizationOracle};
use access_controller::{Controller, InMemoryStore, Store};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Access daemon server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Create a new server, building the authorization oracle from configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let oracle = config.authorization.build_oracle()?;
        Ok(Self::with_oracle(config, oracle))
    }

    /// Create a new server around an existing oracle
    pub fn with_oracle(config: DaemonConfig, oracle: Arc<dyn AuthorizationOracle>) -> Self {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let checker = ApprovalChecker::new(oracle);

        let controller = Arc::new(Controller::new(
            config.controller.clone(),
            store.clone(),
            checker.clone(),
        ));
        let state = AppState::new(store, AdmissionChain::with_checker(checker), controller);

        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.state.controller
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state.clone(), &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Access daemon listening on {}", addr);

        // Start controller in background
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let controller = tokio::spawn(self.state.controller.clone().run(shutdown_rx));

        // Log lifecycle events
        let mut events = self.state.controller.subscribe();
        let audit = tokio::spawn(async move {
            while let Ok(envelope) = events.recv().await {
                tracing::info!(
                    event = envelope.event.name(),
                    request = %envelope.request,
                    id = %envelope.id,
                    "Access request event"
                );
            }
        });

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Access daemon shutting down");

        // Stop controller
        let _ = shutdown_tx.send(true);
        controller
            .await
            .map_err(|e| DaemonError::Server(format!("controller task failed: {}", e)))?;
        audit.abort();

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
