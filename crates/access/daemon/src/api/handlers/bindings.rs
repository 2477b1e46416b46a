//! RoleBinding handlers (read-only; bindings are written by the controller)

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use access_controller::BindingStore;
use access_types::{ObjectKey, RoleBinding};
use axum::{
    extract::{Path, State},
    Json,
};

/// List role bindings in a namespace
pub async fn list_bindings(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<RoleBinding>>> {
    let bindings = state.store.list_bindings(Some(&namespace)).await?;
    Ok(Json(bindings))
}

/// Get a role binding by name
pub async fn get_binding(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<RoleBinding>> {
    let key = ObjectKey::new(namespace, name);
    let binding = state
        .store
        .get_binding(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("RoleBinding {}", key)))?;
    Ok(Json(binding))
}
