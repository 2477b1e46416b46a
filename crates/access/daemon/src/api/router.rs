//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let access_routes = Router::new()
        .route(
            "/namespaces/:namespace/accessrequests",
            get(handlers::list_requests).post(handlers::create_request),
        )
        .route(
            "/namespaces/:namespace/accessrequests/:name",
            get(handlers::get_request)
                .put(handlers::update_request)
                .delete(handlers::delete_request),
        );

    let rbac_routes = Router::new()
        .route(
            "/namespaces/:namespace/rolebindings",
            get(handlers::list_bindings),
        )
        .route(
            "/namespaces/:namespace/rolebindings/:name",
            get(handlers::get_binding),
        );

    let mut router = Router::new()
        // Admission webhooks
        .route("/mutate", post(handlers::mutate))
        .route("/validate", post(handlers::validate))
        // Health and status
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/status", get(handlers::status))
        // Resources
        .nest("/apis/iam.accessrequest.io/v1alpha1", access_routes)
        .nest("/apis/rbac.authorization.k8s.io/v1", rbac_routes)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs.max(1),
        )))
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
