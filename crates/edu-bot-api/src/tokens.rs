//! App and installation client stages.
//!
//! [`AppApiStage`] exposes a client authorized as the GitHub App for the rest
//! of the chain. [`InstallationApiStage`] uses that client to mint an
//! installation access token and exposes a client authorized with it. Both
//! remove their client once the downstream chain returns, on success and on
//! error. Tokens are minted per delivery and never cached.

use async_trait::async_trait;
use chrono::Duration;
use edu_bot_github::auth::{AppPrivateKey, Credential, GitHubAppId, InstallationId};
use edu_bot_github::client::request_installation_token;
use tracing::{debug, instrument};

use crate::config::ClientSettings;
use crate::context::WebhookContext;
use crate::error::RequestError;
use crate::pipeline::{Next, WebhookStage};

/// Sets [`WebhookContext::app_api`] for downstream stages.
#[derive(Debug, Clone)]
pub struct AppApiStage {
    app_id: GitHubAppId,
    private_key: AppPrivateKey,
    expires_in: Duration,
    settings: ClientSettings,
}

impl AppApiStage {
    pub fn new(
        app_id: GitHubAppId,
        private_key: AppPrivateKey,
        expires_in: Duration,
        settings: ClientSettings,
    ) -> Self {
        Self {
            app_id,
            private_key,
            expires_in,
            settings,
        }
    }
}

#[async_trait]
impl WebhookStage for AppApiStage {
    #[instrument(skip(self, ctx, next), fields(app_id = %self.app_id))]
    async fn handle(&self, ctx: &mut WebhookContext, next: Next<'_>) -> Result<(), RequestError> {
        let app_api = self.settings.api(Credential::AppJwt {
            app_id: self.app_id,
            private_key: self.private_key.clone(),
            expires_in: self.expires_in,
        })?;

        ctx.app_api = Some(app_api);
        let result = next.run(ctx).await;
        ctx.app_api = None;
        result
    }
}

/// Sets [`WebhookContext::installation_api`] for downstream stages.
///
/// Requires [`AppApiStage`] earlier in the chain.
#[derive(Debug, Clone)]
pub struct InstallationApiStage {
    installation_id: InstallationId,
    settings: ClientSettings,
}

impl InstallationApiStage {
    pub fn new(installation_id: InstallationId, settings: ClientSettings) -> Self {
        Self {
            installation_id,
            settings,
        }
    }
}

#[async_trait]
impl WebhookStage for InstallationApiStage {
    #[instrument(skip(self, ctx, next), fields(installation_id = %self.installation_id))]
    async fn handle(&self, ctx: &mut WebhookContext, next: Next<'_>) -> Result<(), RequestError> {
        let app_api = ctx.require_app_api()?;
        let token = request_installation_token(app_api, self.installation_id).await?;
        debug!("Installation client ready");

        ctx.installation_api = Some(self.settings.api(Credential::bearer_token(token))?);
        let result = next.run(ctx).await;
        ctx.installation_api = None;
        result
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
