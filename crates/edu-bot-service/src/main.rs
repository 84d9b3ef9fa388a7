//! # edu-bot service
//!
//! Binary entry point for the se-edu GitHub bot.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes logging
//! - Starts the HTTP server from edu-bot-api

mod settings;

use edu_bot_api::config::LoggingConfig;
use edu_bot_api::{start_server, EventHandler, LogWebhookHandler, ServiceError};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let service_config = match settings::load_config() {
        Ok(config) => {
            init_logging(&config.logging);
            config
        }
        Err(e) => {
            init_logging(&LoggingConfig::default());
            error!(error = %format!("{:#}", e), "Failed to load configuration; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        app_id = service_config.github.app_id,
        installation_id = service_config.github.installation_id,
        "Starting edu-bot service"
    );

    let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(LogWebhookHandler)];
    if let Err(e) = start_server(service_config, handlers).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "edu_bot={level},edu_bot_api={level},edu_bot_github={level},tower_http=info",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
