//! HTTP client for the ticketing platform.
//!
//! Every call is timeout-bounded at the client level. Rate-limit responses
//! (429) are retried with capped exponential backoff; all other failures
//! surface immediately as `TicketingError`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use hopdesk_core::{ConversationId, Ticketing, TicketingError};

const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// Client for the ticketing platform's conversation API.
pub struct DeskClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl DeskClient {
    /// Create a client with the default 30 second request timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TicketingError> {
        Self::with_timeout(base_url, api_key, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TicketingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TicketingError::NotConfigured(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Send a JSON request, retrying on 429.
    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), TicketingError> {
        let url = format!("{}/{}", self.base_url, path);

        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        TicketingError::Timeout(url.clone())
                    } else {
                        TicketingError::ApiError {
                            status_code: 0,
                            message: e.to_string(),
                        }
                    }
                })?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 && attempt < MAX_RETRIES {
                let delay = Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt));
                tracing::warn!(
                    url = %url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            return Err(TicketingError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        Err(TicketingError::ApiError {
            status_code: 429,
            message: "rate limit retries exhausted".into(),
        })
    }
}

#[async_trait]
impl Ticketing for DeskClient {
    async fn send_message(
        &self,
        conversation_id: &ConversationId,
        body: &str,
    ) -> Result<(), TicketingError> {
        tracing::info!(conversation_id = %conversation_id.0, "delivering reply");
        self.request(
            reqwest::Method::POST,
            &format!("conversations/{}/messages", conversation_id.0),
            json!({ "body": body }),
        )
        .await
        .map_err(|e| match e {
            TicketingError::ApiError { status_code, message } => TicketingError::DeliveryFailed {
                conversation_id: conversation_id.0.clone(),
                reason: format!("{message} (status: {status_code})"),
            },
            other => other,
        })
    }

    async fn add_note(
        &self,
        conversation_id: &ConversationId,
        body: &str,
    ) -> Result<(), TicketingError> {
        tracing::debug!(conversation_id = %conversation_id.0, "adding internal note");
        self.request(
            reqwest::Method::POST,
            &format!("conversations/{}/notes", conversation_id.0),
            json!({ "body": body }),
        )
        .await
        .map_err(|e| match e {
            TicketingError::ApiError { status_code, message } => TicketingError::NoteFailed {
                conversation_id: conversation_id.0.clone(),
                reason: format!("{message} (status: {status_code})"),
            },
            other => other,
        })
    }

    async fn set_attribute(
        &self,
        conversation_id: &ConversationId,
        key: &str,
        value: &str,
    ) -> Result<(), TicketingError> {
        tracing::debug!(conversation_id = %conversation_id.0, key, value, "setting attribute");
        self.request(
            reqwest::Method::PUT,
            &format!("conversations/{}/attributes", conversation_id.0),
            json!({ "custom_attributes": { key: value } }),
        )
        .await
        .map_err(|e| match e {
            TicketingError::ApiError { status_code, message } => TicketingError::AttributeFailed {
                conversation_id: conversation_id.0.clone(),
                key: key.to_string(),
                reason: format!("{message} (status: {status_code})"),
            },
            other => other,
        })
    }

    async fn snooze(
        &self,
        conversation_id: &ConversationId,
        duration_seconds: u64,
    ) -> Result<(), TicketingError> {
        tracing::debug!(
            conversation_id = %conversation_id.0,
            duration_seconds,
            "snoozing conversation"
        );
        self.request(
            reqwest::Method::POST,
            &format!("conversations/{}/snooze", conversation_id.0),
            json!({ "duration_seconds": duration_seconds }),
        )
        .await
        .map_err(|e| match e {
            TicketingError::ApiError { status_code, message } => TicketingError::SnoozeFailed {
                conversation_id: conversation_id.0.clone(),
                reason: format!("{message} (status: {status_code})"),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = DeskClient::new("https://desk.example.com/", "key").unwrap();
        assert_eq!(client.base_url, "https://desk.example.com");
    }

    #[tokio::test]
    async fn unreachable_host_surfaces_api_error() {
        let client = DeskClient::with_timeout(
            "http://127.0.0.1:1",
            "key",
            Duration::from_millis(200),
        )
        .unwrap();
        let err = client
            .send_message(&ConversationId("conv-1".into()), "hello")
            .await
            .unwrap_err();
        match err {
            TicketingError::ApiError { .. } | TicketingError::Timeout(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
