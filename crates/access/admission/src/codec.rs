//! Admission review envelope codecs
//!
//! A [`CodecRegistry`] is the decoder table keyed by `apiVersion`. It is
//! built once and handed to whoever serves the webhook endpoints.

use crate::error::{AdmissionError, Result};
use crate::review::{AdmissionRequest, AdmissionResponse};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Decoder/encoder for one admission review schema version
pub trait ReviewCodec: Send + Sync + std::fmt::Debug {
    fn api_version(&self) -> &'static str;

    /// Extract the canonical request from a full `AdmissionReview` envelope
    fn decode(&self, envelope: &Value) -> Result<AdmissionRequest>;

    /// Wrap the canonical response in an `AdmissionReview` envelope
    fn encode(&self, response: &AdmissionResponse) -> Result<Value>;
}

fn decode_request(envelope: &Value) -> Result<AdmissionRequest> {
    let request = envelope
        .get("request")
        .filter(|r| !r.is_null())
        .ok_or(AdmissionError::MissingObject("request"))?;
    serde_json::from_value(request.clone()).map_err(|e| AdmissionError::Decode(e.to_string()))
}

fn envelope(api_version: &str, response: Value) -> Value {
    json!({
        "apiVersion": api_version,
        "kind": "AdmissionReview",
        "response": response,
    })
}

/// `admission.k8s.io/v1`
#[derive(Debug, Default)]
pub struct V1Codec;

impl ReviewCodec for V1Codec {
    fn api_version(&self) -> &'static str {
        "admission.k8s.io/v1"
    }

    fn decode(&self, envelope: &Value) -> Result<AdmissionRequest> {
        let request = decode_request(envelope)?;
        if request.uid.is_empty() {
            return Err(AdmissionError::Decode("request.uid is required".to_string()));
        }
        Ok(request)
    }

    fn encode(&self, response: &AdmissionResponse) -> Result<Value> {
        Ok(envelope(self.api_version(), response.to_wire()?))
    }
}

/// `admission.k8s.io/v1beta1`, converted to and from the v1 shape
#[derive(Debug, Default)]
pub struct V1Beta1Codec;

impl ReviewCodec for V1Beta1Codec {
    fn api_version(&self) -> &'static str {
        "admission.k8s.io/v1beta1"
    }

    fn decode(&self, envelope: &Value) -> Result<AdmissionRequest> {
        // v1beta1 tolerated a missing uid; the response simply echoes it empty
        decode_request(envelope)
    }

    fn encode(&self, response: &AdmissionResponse) -> Result<Value> {
        Ok(envelope(self.api_version(), response.to_wire()?))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<&'static str, Arc<dyn ReviewCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// v1 and v1beta1
    pub fn standard() -> Self {
        Self::new()
            .register(Arc::new(V1Codec))
            .register(Arc::new(V1Beta1Codec))
    }

    pub fn register(mut self, codec: Arc<dyn ReviewCodec>) -> Self {
        self.codecs.insert(codec.api_version(), codec);
        self
    }

    pub fn versions(&self) -> Vec<&'static str> {
        let mut versions: Vec<_> = self.codecs.keys().copied().collect();
        versions.sort_unstable();
        versions
    }

    /// Pick the codec by `apiVersion` (and `kind`) and decode the request
    pub fn decode(&self, body: &[u8]) -> Result<(Arc<dyn ReviewCodec>, AdmissionRequest)> {
        let envelope: Value =
            serde_json::from_slice(body).map_err(|e| AdmissionError::Decode(e.to_string()))?;

        let kind = envelope["kind"].as_str().unwrap_or_default();
        if kind != "AdmissionReview" {
            return Err(AdmissionError::Decode(format!(
                "expected kind AdmissionReview, got {:?}",
                kind
            )));
        }

        let api_version = envelope["apiVersion"].as_str().unwrap_or_default();
        let codec = self
            .codecs
            .get(api_version)
            .cloned()
            .ok_or_else(|| AdmissionError::UnsupportedVersion(api_version.to_string()))?;

        let request = codec.decode(&envelope)?;
        Ok((codec, request))
    }
}
