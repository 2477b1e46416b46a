//! Admission webhook handlers

use crate::api::state::AppState;
use crate::error::{ApiError, ApiResult};
use access_admission::{AdmissionRequest, AdmissionResponse, ReviewCodec};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// Mutating webhook: responds with a base64 JSONPatch
pub async fn mutate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let (codec, request) = decode_review(&state, &headers, &body)?;
    let response = state.admission.mutator().admit(&request).await;
    encode_review(codec.as_ref(), &request, &response)
}

/// Validating webhook: allow or reject, never patches
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let (codec, request) = decode_review(&state, &headers, &body)?;
    let response = state.admission.validator().admit(&request).await;
    encode_review(codec.as_ref(), &request, &response)
}

fn decode_review(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> ApiResult<(Arc<dyn ReviewCodec>, AdmissionRequest)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_json(content_type) {
        return Err(ApiError::BadRequest(format!(
            "expected content type application/json, got {:?}",
            content_type
        )));
    }

    let (codec, request) = state.codecs.decode(body)?;
    tracing::debug!(
        uid = %request.uid,
        version = codec.api_version(),
        operation = ?request.operation,
        namespace = %request.namespace,
        name = %request.name,
        actor = request.actor(),
        "Admission review received"
    );
    Ok((codec, request))
}

fn encode_review(
    codec: &dyn ReviewCodec,
    request: &AdmissionRequest,
    response: &AdmissionResponse,
) -> ApiResult<Json<Value>> {
    let envelope = codec.encode(response)?;
    tracing::debug!(uid = %request.uid, allowed = response.allowed, "Admission review answered");
    Ok(Json(envelope))
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parameters_accepted() {
        assert!(is_json("application/json"));
        assert!(is_json("application/json; charset=utf-8"));
        assert!(!is_json("text/plain"));
        assert!(!is_json(""));
    }
}
