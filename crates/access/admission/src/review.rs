//! Canonical admission request and response

use crate::error::{AdmissionError, Result};
use crate::patch::PatchOperation;
use access_types::{GroupVersionResource, ObjectKey};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// Version-independent view of one intercepted write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,

    pub resource: GroupVersionResource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    pub operation: Operation,

    #[serde(default)]
    pub user_info: UserInfo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl AdmissionRequest {
    pub fn new(
        operation: Operation,
        resource: GroupVersionResource,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            uid: String::new(),
            resource,
            sub_resource: None,
            name: String::new(),
            namespace: String::new(),
            operation,
            user_info: UserInfo {
                username: actor.into(),
                ..Default::default()
            },
            object: None,
            old_object: None,
            dry_run: None,
        }
    }

    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    pub fn with_old_object(mut self, old_object: Value) -> Self {
        self.old_object = Some(old_object);
        self
    }

    pub fn actor(&self) -> &str {
        &self.user_info.username
    }

    /// Writes to a subresource (e.g. `status`) never touch spec attributes
    pub fn is_subresource(&self) -> bool {
        self.sub_resource.as_deref().map_or(false, |s| !s.is_empty())
    }

    /// Key of the object under review, preferring the decoded object's own metadata
    pub fn object_key(&self, metadata_namespace: &str, metadata_name: &str) -> ObjectKey {
        let namespace = if metadata_namespace.is_empty() {
            &self.namespace
        } else {
            metadata_namespace
        };
        let name = if metadata_name.is_empty() {
            &self.name
        } else {
            metadata_name
        };
        ObjectKey::new(namespace.clone(), name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionStatus {
    pub code: u16,
    pub message: String,
}

/// Outcome of admission, before version-specific encoding
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    pub rejection: Option<RejectionStatus>,
    pub patch: Vec<PatchOperation>,
}

impl AdmissionResponse {
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            ..Default::default()
        }
    }

    pub fn allow_with_patch(uid: impl Into<String>, patch: Vec<PatchOperation>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            rejection: None,
            patch,
        }
    }

    pub fn reject(uid: impl Into<String>, error: &AdmissionError) -> Self {
        Self {
            uid: uid.into(),
            allowed: false,
            rejection: Some(RejectionStatus {
                code: error.code(),
                message: error.to_string(),
            }),
            patch: Vec::new(),
        }
    }

    /// `response` body as sent on the wire: base64 JSON patch plus `patchType`
    pub fn to_wire(&self) -> Result<Value> {
        let mut response = json!({
            "uid": self.uid,
            "allowed": self.allowed,
        });
        if let Some(rejection) = &self.rejection {
            response["status"] = json!({
                "code": rejection.code,
                "message": rejection.message,
            });
        }
        if !self.patch.is_empty() {
            let raw = serde_json::to_vec(&self.patch)
                .map_err(|e| AdmissionError::Patch(e.to_string()))?;
            response["patch"] = Value::String(STANDARD.encode(raw));
            response["patchType"] = Value::String("JSONPatch".to_string());
        }
        Ok(response)
    }

    /// Inverse of [`to_wire`](Self::to_wire), for asserting on encoded responses
    #[cfg(test)]
    pub(crate) fn from_wire(response: &Value) -> Result<Self> {
        let uid = response["uid"].as_str().unwrap_or_default().to_string();
        let allowed = response["allowed"]
            .as_bool()
            .ok_or_else(|| AdmissionError::Decode("response.allowed missing".to_string()))?;
        let rejection = match response.get("status") {
            Some(status) if !status.is_null() => Some(RejectionStatus {
                code: status["code"].as_u64().unwrap_or(0) as u16,
                message: status["message"].as_str().unwrap_or_default().to_string(),
            }),
            _ => None,
        };
        let patch = match response.get("patch").and_then(Value::as_str) {
            Some(encoded) => {
                let raw = STANDARD
                    .decode(encoded)
                    .map_err(|e| AdmissionError::Decode(e.to_string()))?;
                serde_json::from_slice(&raw).map_err(|e| AdmissionError::Decode(e.to_string()))?
            }
            None => Vec::new(),
        };
        Ok(Self {
            uid,
            allowed,
            rejection,
            patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_wire_names() {
        assert_eq!(serde_json::to_value(Operation::Create).unwrap(), "CREATE");
        let op: Operation = serde_json::from_value(json!("DELETE")).unwrap();
        assert_eq!(op, Operation::Delete);
    }

    #[test]
    fn test_allowed_without_patch_has_no_patch_type() {
        let wire = AdmissionResponse::allow("abc").to_wire().unwrap();
        assert_eq!(wire["uid"], "abc");
        assert_eq!(wire["allowed"], true);
        assert!(wire.get("patch").is_none());
        assert!(wire.get("patchType").is_none());
    }

    #[test]
    fn test_patch_is_base64_json_patch() {
        let patch = vec![PatchOperation::add("/spec/attributes", json!({}))];
        let wire = AdmissionResponse::allow_with_patch("u", patch.clone())
            .to_wire()
            .unwrap();
        assert_eq!(wire["patchType"], "JSONPatch");

        let raw = STANDARD.decode(wire["patch"].as_str().unwrap()).unwrap();
        let decoded: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(decoded, json!([{"op": "add", "path": "/spec/attributes", "value": {}}]));

        let back = AdmissionResponse::from_wire(&wire).unwrap();
        assert_eq!(back.patch, patch);
    }

    #[test]
    fn test_rejection_carries_code_and_message() {
        let err = AdmissionError::Immutable("spec.attributes.createdBy");
        let wire = AdmissionResponse::reject("u", &err).to_wire().unwrap();
        assert_eq!(wire["allowed"], false);
        assert_eq!(wire["status"]["code"], 403);
        assert_eq!(wire["status"]["message"], "spec.attributes.createdBy is immutable");
    }

    #[test]
    fn test_object_key_falls_back_to_request() {
        let mut request = AdmissionRequest::new(
            Operation::Create,
            access_types::AccessRequest::resource(),
            "alice",
        );
        request.namespace = "team-a".to_string();
        request.name = "from-request".to_string();
        assert_eq!(
            request.object_key("", "from-object"),
            ObjectKey::new("team-a", "from-object")
        );
    }
}
