//! Composable webhook stages.
//!
//! A [`Pipeline`] is an ordered list of [`WebhookStage`]s. Each stage receives
//! the shared [`WebhookContext`] and a [`Next`] continuation for the stages
//! after it, so a stage can do work before and after the rest of the chain or
//! stop the chain by returning without calling `next`.
//!
//! ```text
//! validator ──▶ app token ──▶ installation token ──▶ dispatch
//!     ◀──────────────◀───────────────────◀──────────────┘
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::WebhookContext;
use crate::error::RequestError;

/// One step in webhook processing.
#[async_trait]
pub trait WebhookStage: Send + Sync {
    /// Process the delivery, calling `next.run(ctx)` to continue the chain.
    async fn handle(&self, ctx: &mut WebhookContext, next: Next<'_>) -> Result<(), RequestError>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn WebhookStage>],
}

impl<'a> Next<'a> {
    /// Run the remaining stages. Finishing the chain is a no-op success.
    pub async fn run(self, ctx: &mut WebhookContext) -> Result<(), RequestError> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(ctx, Next { stages: rest }).await,
            None => Ok(()),
        }
    }
}

/// Ordered list of stages.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn WebhookStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: impl WebhookStage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Append an already shared stage.
    pub fn with_shared_stage(mut self, stage: Arc<dyn WebhookStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage against `ctx`.
    pub async fn run(&self, ctx: &mut WebhookContext) -> Result<(), RequestError> {
        Next {
            stages: &self.stages,
        }
        .run(ctx)
        .await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
