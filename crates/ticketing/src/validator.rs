//! HTTP client for the response validation service.
//!
//! The service receives the draft reply and returns a JSON verdict. Only
//! `overall_passed` drives routing; the full body is kept verbatim so the
//! pipeline can record it as an audit note.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use hopdesk_core::{
    CollaboratorError, ConversationState, ResponseValidator, Stage, ValidationVerdict,
};

/// Client for the external response validation service.
pub struct HttpResponseValidator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl HttpResponseValidator {
    /// Create a validator client with the default 120 second timeout.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, CollaboratorError> {
        Self::with_timeout(endpoint, api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Unavailable {
                stage: Stage::Validate,
                detail: format!("http client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

#[async_trait]
impl ResponseValidator for HttpResponseValidator {
    async fn validate(
        &self,
        draft_text: &str,
        state: &ConversationState,
    ) -> Result<ValidationVerdict, CollaboratorError> {
        tracing::info!(conversation_id = %state.conversation_id.0, "validating draft reply");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&json!({ "reply": draft_text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout {
                        stage: Stage::Validate,
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    CollaboratorError::Network {
                        stage: Stage::Validate,
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::ApiError {
                stage: Stage::Validate,
                status_code: status.as_u16(),
                message,
            });
        }

        let details: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| CollaboratorError::MalformedResponse {
                    stage: Stage::Validate,
                    detail: e.to_string(),
                })?;

        let overall_passed = details
            .get("overall_passed")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| CollaboratorError::MalformedResponse {
                stage: Stage::Validate,
                detail: "missing boolean field 'overall_passed'".into(),
            })?;

        Ok(ValidationVerdict {
            overall_passed,
            details,
        })
    }
}
