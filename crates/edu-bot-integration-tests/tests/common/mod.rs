//! Common test utilities for edu-bot integration tests
//!
//! This module provides:
//! - Service configuration pointing every GitHub URL at a mock server
//! - Signed webhook request builders
//! - Response inspection helpers

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response};
use axum::Router;
use edu_bot_api::config::{AuthConfig, GitHubConfig};
use edu_bot_api::{create_router, AppState, EventHandler, ServiceConfig};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::sync::Arc;
use wiremock::MockServer;

pub const TEST_PRIVATE_KEY_PEM: &str =
    include_str!("../../../edu-bot-github/testdata/app_private_key.pem");

pub const WEBHOOK_SECRET: &str = "It's a Secret to Everybody";
pub const APP_ID: u64 = 1001;
pub const INSTALLATION_ID: u64 = 2;
pub const CLIENT_ID: &str = "Iv1.test-client";
pub const CLIENT_SECRET: &str = "test-client-secret";
pub const HOST: &str = "bot.example.com";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration with both GitHub API and OAuth endpoints on `github`.
pub fn test_config(github: &MockServer) -> ServiceConfig {
    ServiceConfig {
        github: GitHubConfig {
            app_id: APP_ID,
            private_key: TEST_PRIVATE_KEY_PEM.to_string(),
            installation_id: INSTALLATION_ID,
            webhook_secret: WEBHOOK_SECRET.to_string(),
            client_id: CLIENT_ID.to_string(),
            client_secret: CLIENT_SECRET.to_string(),
            api_url: github.uri(),
            oauth_url: github.uri(),
            ..GitHubConfig::default()
        },
        auth: AuthConfig {
            secure_cookies: false,
            ..AuthConfig::default()
        },
        ..ServiceConfig::default()
    }
}

pub fn test_router(config: &ServiceConfig, handlers: Vec<Arc<dyn EventHandler>>) -> Router {
    create_router(AppState::from_config(config, handlers).expect("test config must be valid"))
}

// ============================================================================
// Requests
// ============================================================================

/// `sha1=<hex>` signature computed independently of the crate under test.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}

/// Webhook delivery with the given headers; `None` leaves a header out.
pub fn webhook_request(
    event: Option<&str>,
    delivery: Option<&str>,
    signature: Option<&str>,
    body: &str,
) -> Request<Body> {
    let mut request = Request::post("/webhook").header(header::CONTENT_TYPE, "application/json");
    if let Some(event) = event {
        request = request.header("X-GitHub-Event", event);
    }
    if let Some(delivery) = delivery {
        request = request.header("X-GitHub-Delivery", delivery);
    }
    if let Some(signature) = signature {
        request = request.header("X-Hub-Signature", signature);
    }
    request.body(Body::from(body.to_string())).unwrap()
}

/// Correctly signed delivery of `event`.
pub fn signed_webhook(event: &str, body: &str) -> Request<Body> {
    let signature = sign(WEBHOOK_SECRET, body.as_bytes());
    webhook_request(
        Some(event),
        Some("72d3162e-cc78-11e3-81ab-4c9367dc0958"),
        Some(&signature),
        body,
    )
}

/// Browser GET carrying `cookie`, if any.
pub fn browser_get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut request = Request::get(uri).header(header::HOST, HOST);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    request.body(Body::empty()).unwrap()
}

// ============================================================================
// Responses
// ============================================================================

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response should redirect")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` value for `name`.
pub fn set_cookie_for<B>(response: &Response<B>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with(&prefix))
}

/// `name=value` pair of a `Set-Cookie` value, ready for a `Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
