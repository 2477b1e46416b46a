//! HTTP oracle client
//!
//! Posts the access review as JSON and reads the verdict from the `status`
//! of the echoed review.

use crate::error::{OracleError, Result};
use crate::oracle::AuthorizationOracle;
use crate::review::{AccessReview, AccessReviewStatus};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpOracleConfig {
    /// Full URL of the access review endpoint
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Per-request deadline; admission sits on the write path
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

#[derive(Debug)]
pub struct HttpOracle {
    client: Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpOracle {
    pub fn new(config: &HttpOracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }
}

#[async_trait]
impl AuthorizationOracle for HttpOracle {
    fn name(&self) -> &str {
        "http"
    }

    async fn review(&self, review: &AccessReview) -> Result<AccessReviewStatus> {
        let mut request = self.client.post(&self.endpoint).json(review);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Unavailable(format!(
                "{} returned {}: {}",
                self.endpoint, status, body
            )));
        }

        let body = response.bytes().await?;
        let answered: AccessReview = serde_json::from_slice(&body).map_err(|e| {
            OracleError::InvalidResponse(format!("{} answered with {}", self.endpoint, e))
        })?;
        Ok(answered.status)
    }
}
