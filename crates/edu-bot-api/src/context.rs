//! Request-scoped state for a webhook delivery.

use axum::http::HeaderMap;
use bytes::Bytes;
use edu_bot_github::{ApiClient, EventName};

use crate::error::RequestError;

/// Everything one webhook delivery carries through the pipeline.
///
/// Stages that expose a resource set the corresponding field before calling
/// the rest of the chain and clear it afterwards, whether the chain succeeded
/// or not. Nothing in here outlives the request.
#[derive(Debug)]
pub struct WebhookContext {
    /// Request headers as received.
    pub headers: HeaderMap,

    /// Exact request body bytes, used for signature verification.
    pub raw_body: Option<Bytes>,

    /// Parsed request body; `Null` when the body was not JSON.
    pub body: serde_json::Value,

    /// Recognised event name, set once the delivery is validated.
    pub event: Option<EventName>,

    /// Delivery ID, set once the delivery is validated.
    pub delivery_id: Option<String>,

    /// Response body returned to GitHub.
    pub response: Option<serde_json::Value>,

    /// Client authorized as the GitHub App.
    pub app_api: Option<ApiClient>,

    /// Client authorized as the configured installation.
    pub installation_api: Option<ApiClient>,
}

impl WebhookContext {
    /// Build a context from a received request.
    ///
    /// The body is parsed as JSON; anything unparseable becomes `Null` and is
    /// rejected later by validation.
    pub fn from_request(headers: HeaderMap, raw_body: Bytes) -> Self {
        let body = serde_json::from_slice(&raw_body).unwrap_or(serde_json::Value::Null);
        Self::new(headers, Some(raw_body), body)
    }

    pub fn new(headers: HeaderMap, raw_body: Option<Bytes>, body: serde_json::Value) -> Self {
        Self {
            headers,
            raw_body,
            body,
            event: None,
            delivery_id: None,
            response: None,
            app_api: None,
            installation_api: None,
        }
    }

    /// Header value as a string; `None` when absent or not valid text.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The App client, or an infrastructure error when no stage provided one.
    pub fn require_app_api(&self) -> Result<&ApiClient, RequestError> {
        self.app_api
            .as_ref()
            .ok_or_else(|| RequestError::infrastructure("App API client not available"))
    }

    /// The installation client, or an infrastructure error when no stage provided one.
    pub fn require_installation_api(&self) -> Result<&ApiClient, RequestError> {
        self.installation_api
            .as_ref()
            .ok_or_else(|| RequestError::infrastructure("installation API client not available"))
    }
}
