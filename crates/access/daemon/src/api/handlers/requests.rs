//! AccessRequest resource handlers
//!
//! Every write is admitted through the same mutate, patch and validate
//! chain the webhooks serve before it reaches the store.

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use access_admission::{AdmissionRequest, Operation};
use access_controller::RequestStore;
use access_types::{AccessRequest, ObjectKey};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::Value;

/// Header carrying the authenticated identity of the caller
pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// Acting identity, taken from the fronting proxy's header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RemoteUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .map(|user| RemoteUser(user.to_string()))
            .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", REMOTE_USER_HEADER)))
    }
}

/// List access requests in a namespace
pub async fn list_requests(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<Vec<AccessRequest>>> {
    let requests = state.store.list_requests(Some(&namespace)).await?;
    Ok(Json(requests))
}

/// Get an access request by name
pub async fn get_request(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<AccessRequest>> {
    let key = ObjectKey::new(namespace, name);
    let request = current(&state, &key).await?;
    Ok(Json(request))
}

/// Create an access request
pub async fn create_request(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    RemoteUser(user): RemoteUser,
    Json(mut body): Json<Value>,
) -> ApiResult<(StatusCode, Json<AccessRequest>)> {
    let name = scope_metadata(&mut body, &namespace, None)?;

    let review = admission_request(Operation::Create, &user, &namespace, &name).with_object(body);
    let admitted = admit(&state, review).await?;

    let created = state.store.create_request(admitted).await?;
    tracing::info!(request = %created.key(), created_by = %user, "Created access request");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace an access request's spec and metadata
pub async fn update_request(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    RemoteUser(user): RemoteUser,
    Json(mut body): Json<Value>,
) -> ApiResult<Json<AccessRequest>> {
    scope_metadata(&mut body, &namespace, Some(&name))?;

    let key = ObjectKey::new(&namespace, &name);
    let existing = current(&state, &key).await?;

    // an update without a resourceVersion applies to what the caller was just shown
    let metadata = &mut body["metadata"];
    if metadata["resourceVersion"].as_str().unwrap_or_default().is_empty() {
        metadata["resourceVersion"] = Value::String(existing.metadata.resource_version.clone());
    }

    let old = existing
        .to_value()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let review = admission_request(Operation::Update, &user, &namespace, &name)
        .with_object(body)
        .with_old_object(old);
    let admitted = admit(&state, review).await?;

    let updated = state.store.update_request(admitted).await?;
    tracing::info!(
        request = %key,
        actor = %user,
        approved = updated.spec.approved,
        "Updated access request"
    );
    Ok(Json(updated))
}

/// Delete an access request; owned role bindings go with it
pub async fn delete_request(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    RemoteUser(user): RemoteUser,
) -> ApiResult<StatusCode> {
    let key = ObjectKey::new(&namespace, &name);
    let existing = current(&state, &key).await?;

    let old = existing
        .to_value()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let review = admission_request(Operation::Delete, &user, &namespace, &name).with_old_object(old);
    state.admission.admit(review).await?;

    if !state.store.delete_request(&key).await? {
        return Err(ApiError::NotFound(format!("AccessRequest {}", key)));
    }
    tracing::info!(request = %key, actor = %user, "Deleted access request");
    Ok(StatusCode::NO_CONTENT)
}

async fn current(state: &AppState, key: &ObjectKey) -> ApiResult<AccessRequest> {
    state
        .store
        .get_request(key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("AccessRequest {}", key)))
}

fn admission_request(operation: Operation, user: &str, namespace: &str, name: &str) -> AdmissionRequest {
    let mut review = AdmissionRequest::new(operation, AccessRequest::resource(), user);
    review.uid = uuid::Uuid::new_v4().to_string();
    review.namespace = namespace.to_string();
    review.name = name.to_string();
    review
}

/// Run the admission chain and decode the object it admitted
async fn admit(state: &AppState, review: AdmissionRequest) -> ApiResult<AccessRequest> {
    let object = state
        .admission
        .admit(review)
        .await?
        .ok_or_else(|| ApiError::Internal("admission returned no object".to_string()))?;
    AccessRequest::from_value(object).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Default the body's namespace (and name) from the path, rejecting mismatches.
/// Returns the object name.
fn scope_metadata(body: &mut Value, namespace: &str, name: Option<&str>) -> ApiResult<String> {
    let object = body
        .as_object_mut()
        .ok_or_else(|| ApiError::BadRequest("body must be a JSON object".to_string()))?;
    let metadata = object
        .entry("metadata")
        .or_insert_with(|| Value::Object(Default::default()));
    let metadata = metadata
        .as_object_mut()
        .ok_or_else(|| ApiError::BadRequest("metadata must be a JSON object".to_string()))?;

    let body_namespace = metadata
        .get("namespace")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if !body_namespace.is_empty() && body_namespace != namespace {
        return Err(ApiError::BadRequest(format!(
            "metadata.namespace {:?} does not match path namespace {:?}",
            body_namespace, namespace
        )));
    }
    metadata.insert("namespace".to_string(), Value::String(namespace.to_string()));

    let body_name = metadata
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match name {
        Some(name) if !body_name.is_empty() && body_name != name => Err(ApiError::BadRequest(
            format!("metadata.name {:?} does not match path name {:?}", body_name, name),
        )),
        Some(name) => {
            metadata.insert("name".to_string(), Value::String(name.to_string()));
            Ok(name.to_string())
        }
        None => Ok(body_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_metadata_defaults_from_path() {
        let mut body = json!({"spec": {}});
        let name = scope_metadata(&mut body, "team-a", Some("req")).unwrap();
        assert_eq!(name, "req");
        assert_eq!(body["metadata"]["namespace"], "team-a");
        assert_eq!(body["metadata"]["name"], "req");
    }

    #[test]
    fn test_scope_metadata_rejects_mismatch() {
        let mut body = json!({"metadata": {"namespace": "team-b", "name": "req"}});
        assert!(matches!(
            scope_metadata(&mut body, "team-a", None),
            Err(ApiError::BadRequest(_))
        ));

        let mut body = json!({"metadata": {"name": "other"}});
        assert!(matches!(
            scope_metadata(&mut body, "team-a", Some("req")),
            Err(ApiError::BadRequest(_))
        ));
    }
}
