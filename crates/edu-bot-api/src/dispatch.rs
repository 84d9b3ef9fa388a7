//! Event dispatch to business handlers.
//!
//! The dispatch stage decodes the validated delivery into a typed
//! [`WebhookEvent`] and offers it to every registered [`EventHandler`] in
//! order. Handlers are the one place failures are tolerated: an error from a
//! handler is logged and the remaining handlers still run, and the delivery is
//! still acknowledged.

use async_trait::async_trait;
use edu_bot_github::WebhookEvent;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::context::WebhookContext;
use crate::error::RequestError;
use crate::pipeline::{Next, WebhookStage};

/// Error returned by business handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Business logic run for each authenticated delivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// React to `event`. `ctx` gives access to the installation client.
    async fn handle(&self, event: &WebhookEvent, ctx: &WebhookContext) -> Result<(), HandlerError>;
}

/// Runs every registered handler for each delivery.
#[derive(Clone, Default)]
pub struct EventDispatchStage {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatchStage {
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self { handlers }
    }

    pub fn with_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for EventDispatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("EventDispatchStage")
            .field("handlers", &names)
            .finish()
    }
}

#[async_trait]
impl WebhookStage for EventDispatchStage {
    async fn handle(&self, ctx: &mut WebhookContext, next: Next<'_>) -> Result<(), RequestError> {
        let name = ctx
            .event
            .ok_or_else(|| RequestError::infrastructure("webhook event not validated"))?;
        let delivery_id = ctx.delivery_id.clone().unwrap_or_default();

        match WebhookEvent::decode(name, &ctx.body) {
            Ok(event) => {
                for handler in &self.handlers {
                    debug!(handler = handler.name(), event = %name, "Dispatching event");
                    if let Err(e) = handler.handle(&event, ctx).await {
                        error!(
                            handler = handler.name(),
                            event = %name,
                            delivery_id = %delivery_id,
                            error = %e,
                            "Event handler failed"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(
                    event = %name,
                    delivery_id = %delivery_id,
                    error = %e,
                    "Payload does not match event shape; skipping handlers"
                );
            }
        }

        next.run(ctx).await
    }
}

/// Logs every delivery it sees.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWebhookHandler;

#[async_trait]
impl EventHandler for LogWebhookHandler {
    fn name(&self) -> &str {
        "log-webhook"
    }

    async fn handle(&self, event: &WebhookEvent, ctx: &WebhookContext) -> Result<(), HandlerError> {
        info!(
            event = %event.name(),
            delivery_id = ctx.delivery_id.as_deref().unwrap_or(""),
            "Webhook received"
        );
        debug!(payload = %ctx.body, "Webhook payload");
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
