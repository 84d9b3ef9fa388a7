//! Webhook delivery validation stage.

use async_trait::async_trait;
use edu_bot_github::webhook::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER};
use edu_bot_github::{EventName, WebhookSecret};
use tracing::{debug, warn};

use crate::context::WebhookContext;
use crate::error::RequestError;
use crate::pipeline::{Next, WebhookStage};

/// Authenticates a delivery before anything else sees it.
///
/// Checks run in a fixed order and the first failure wins:
///
/// 1. `X-GitHub-Event` header present
/// 2. `X-GitHub-Delivery` header present
/// 3. body is a JSON object
/// 4. raw body bytes were captured (a server wiring fault otherwise)
/// 5. `X-Hub-Signature` header present
/// 6. signature matches the HMAC-SHA1 of the raw body
/// 7. event name is recognised
///
/// On success the acknowledgement `{"ok": true}` is set as the response and
/// the chain continues. The validator never branches on the event itself.
#[derive(Debug, Clone)]
pub struct WebhookValidator {
    secret: WebhookSecret,
}

impl WebhookValidator {
    pub fn new(secret: WebhookSecret) -> Self {
        Self { secret }
    }

    /// Run checks 1-7 and return the recognised event and delivery ID.
    pub fn validate(&self, ctx: &WebhookContext) -> Result<(EventName, String), RequestError> {
        let event = ctx
            .header_str(EVENT_HEADER)
            .ok_or_else(|| RequestError::client_input("X-GitHub-Event not sent"))?;

        let delivery_id = ctx
            .header_str(DELIVERY_HEADER)
            .ok_or_else(|| RequestError::client_input("X-GitHub-Delivery not sent"))?;

        if !ctx.body.is_object() {
            return Err(RequestError::client_input("body is not an object"));
        }

        let raw_body = ctx
            .raw_body
            .as_ref()
            .ok_or_else(|| RequestError::infrastructure("raw body not provided"))?;

        let signature = ctx
            .header_str(SIGNATURE_HEADER)
            .ok_or_else(|| RequestError::client_input("X-Hub-Signature not sent"))?;

        if !self.secret.verify(raw_body, signature) {
            warn!(delivery_id = %delivery_id, "Webhook signature mismatch");
            return Err(RequestError::security("signature validation failed"));
        }

        let event = event
            .parse::<EventName>()
            .map_err(|_| RequestError::client_input("invalid event name"))?;

        Ok((event, delivery_id.to_string()))
    }
}

#[async_trait]
impl WebhookStage for WebhookValidator {
    async fn handle(&self, ctx: &mut WebhookContext, next: Next<'_>) -> Result<(), RequestError> {
        let (event, delivery_id) = self.validate(ctx)?;
        debug!(event = %event, delivery_id = %delivery_id, "Webhook delivery validated");

        ctx.event = Some(event);
        ctx.delivery_id = Some(delivery_id);
        ctx.response = Some(serde_json::json!({ "ok": true }));

        next.run(ctx).await
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
