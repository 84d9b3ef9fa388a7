//! # edu-bot GitHub primitives
//!
//! Building blocks the bot uses to talk to GitHub:
//! - GitHub App credentials: App JWTs and access tokens ([`auth`])
//! - A REST calling convention with Link-header pagination ([`client`])
//! - Webhook HMAC-SHA1 signatures ([`webhook`])
//! - The recognised webhook events and their payloads ([`events`])
//!
//! Nothing in this crate depends on an HTTP server framework.
//!
//! # Examples
//!
//! ```rust,no_run
//! use chrono::Duration;
//! use edu_bot_github::auth::{AppPrivateKey, GitHubAppId, InstallationId};
//! use edu_bot_github::client::{create_access_token_api, create_app_api, request_installation_token};
//!
//! # let pem = "";
//! # tokio_test::block_on(async {
//! let key = AppPrivateKey::from_pem(pem)?;
//! let app_api = create_app_api(GitHubAppId::new(123), key, Duration::minutes(10), "se-edu-bot")?;
//!
//! let token = request_installation_token(&app_api, InstallationId::new(456)).await?;
//! let installation_api = create_access_token_api(&token, "se-edu-bot")?;
//! # let _ = installation_api;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod events;
pub mod webhook;

pub use error::{ApiError, SigningError, ValidationError};

pub use auth::{AppPrivateKey, Credential, GitHubAppId, InstallationId};
pub use client::{
    create_access_token_api, create_api, create_app_api, for_each_page, ApiClient, ApiRequest,
};
pub use events::{EventName, WebhookEvent};
pub use webhook::{sign_payload, verify_signature, WebhookSecret};
