//! # edu-bot HTTP service
//!
//! HTTP layer for the se-edu GitHub bot.
//!
//! This crate provides:
//! - The webhook endpoint, driven by a [`Pipeline`] of stages: delivery
//!   validation, App and installation clients, then event dispatch
//! - GitHub user login (OAuth) and the installation access guard
//! - Router assembly and server start with graceful shutdown

pub mod auth;
pub mod config;
pub mod context;
pub mod cookie;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod tokens;
pub mod validator;

pub use auth::{require_installation, sanitize_redirect, AuthState};
pub use config::{ClientSettings, ServiceConfig};
pub use context::WebhookContext;
pub use dispatch::{EventDispatchStage, EventHandler, HandlerError, LogWebhookHandler};
pub use error::{RequestError, ServiceError};
pub use pipeline::{Next, Pipeline, WebhookStage};
pub use tokens::{AppApiStage, InstallationApiStage};
pub use validator::WebhookValidator;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use edu_bot_github::ValidationError;
use serde::Serialize;
use std::{future::IntoFuture, net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone, Debug)]
pub struct AppState {
    /// Stages every webhook delivery runs through
    pub pipeline: Arc<Pipeline>,

    /// User login settings
    pub auth: Arc<AuthState>,

    /// Path GitHub delivers webhooks to
    pub webhook_path: String,
}

impl AppState {
    /// Build state from configuration, dispatching events to `handlers`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the configuration is invalid.
    pub fn from_config(
        config: &ServiceConfig,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;

        let github = &config.github;
        let pipeline = Pipeline::new()
            .with_stage(WebhookValidator::new(github.webhook_secret()))
            .with_stage(AppApiStage::new(
                github.app_id(),
                github.app_private_key()?,
                github.jwt_expiry(),
                github.client_settings(),
            ))
            .with_stage(InstallationApiStage::new(
                github.installation_id(),
                github.client_settings(),
            ))
            .with_stage(EventDispatchStage::new(handlers));

        Ok(Self {
            pipeline: Arc::new(pipeline),
            auth: Arc::new(AuthState::from_config(config)?),
            webhook_path: config.server.webhook_path.clone(),
        })
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the HTTP router.
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/status", get(handle_status))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            require_installation,
        ));

    Router::new()
        .route("/", get(handle_root))
        .route(&state.webhook_path, post(handle_webhook))
        .merge(protected_routes)
        .merge(auth::auth_routes(Arc::clone(&state.auth)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    handlers: Vec<Arc<dyn EventHandler>>,
) -> Result<(), ServiceError> {
    let state = AppState::from_config(&config, handlers)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let addr: SocketAddr = addr.parse().map_err(|_| ServiceError::BindFailed {
        address: addr.clone(),
        message: "invalid socket address".to_string(),
    })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);
    let (shutdown_started, shutdown_notice) = tokio::sync::oneshot::channel::<()>();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!(
                "Initiating graceful shutdown with {}s timeout",
                shutdown_timeout.as_secs()
            );
            let _ = shutdown_started.send(());
        })
        .into_future();

    // In-flight requests get the grace period; whatever is left is dropped.
    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = async {
            if shutdown_notice.await.is_ok() {
                tokio::time::sleep(shutdown_timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!("Graceful shutdown timed out; dropping in-flight requests");
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Run a webhook delivery through the pipeline.
#[instrument(skip(state, headers, body), fields(
    event = headers.get(edu_bot_github::webhook::EVENT_HEADER).and_then(|v| v.to_str().ok()).unwrap_or(""),
    delivery_id = headers.get(edu_bot_github::webhook::DELIVERY_HEADER).and_then(|v| v.to_str().ok()).unwrap_or(""),
))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, RequestError> {
    let mut ctx = WebhookContext::from_request(headers, body);
    state.pipeline.run(&mut ctx).await?;

    Ok(Json(
        ctx.response
            .take()
            .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
    ))
}

/// Landing page.
pub async fn handle_root() -> &'static str {
    "Hello world!"
}

/// Status reported to users with access to the installation.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn handle_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
