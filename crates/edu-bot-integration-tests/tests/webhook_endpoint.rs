//! Integration tests for the webhook endpoint
//!
//! Deliveries go through the full router: validation, App and installation
//! client stages against a mock GitHub, then dispatch to handlers.

mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{
    body_json, sign, signed_webhook, test_config, test_router, webhook_request, INSTALLATION_ID,
    WEBHOOK_SECRET,
};
use edu_bot_api::{EventHandler, HandlerError, WebhookContext};
use edu_bot_github::WebhookEvent;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PULL_REQUEST_BODY: &str = r#"{
    "action": "closed",
    "number": 17,
    "pull_request": {"merged": true, "user": {"login": "octocat"}},
    "repository": {"name": "addressbook-level4", "owner": {"login": "se-edu"}}
}"#;

/// Records what it saw and optionally calls GitHub with the installation client.
#[derive(Clone, Default)]
struct RecordingHandler {
    seen: Arc<Mutex<Vec<String>>>,
    call_github: bool,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, event: &WebhookEvent, ctx: &WebhookContext) -> Result<(), HandlerError> {
        let mut entry = event.name().to_string();
        if let WebhookEvent::PullRequest(pr) = event {
            entry = format!("{}#{} merged={}", pr.repository.full_name(), pr.number, pr.is_merge());
        }
        self.seen.lock().unwrap().push(entry);

        if self.call_github {
            let repo: serde_json::Value = ctx
                .require_installation_api()?
                .get("repos/se-edu/addressbook-level4")
                .await?;
            self.seen
                .lock()
                .unwrap()
                .push(repo["full_name"].as_str().unwrap_or_default().to_string());
        }
        Ok(())
    }
}

struct FailingHandler;

#[async_trait]
impl EventHandler for FailingHandler {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle(&self, _: &WebhookEvent, _: &WebhookContext) -> Result<(), HandlerError> {
        Err("handler exploded".into())
    }
}

async fn mount_installation_token(github: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/installations/{}/access_tokens", INSTALLATION_ID)))
        .and(header_regex("authorization", "^Bearer [^.]+\\.[^.]+\\.[^.]+$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "ghs_installation",
            "expires_at": "2030-01-01T00:00:00Z"
        })))
        .mount(github)
        .await;
}

async fn assert_rejected(
    request: axum::http::Request<axum::body::Body>,
    status: StatusCode,
    message: &str,
) {
    let github = MockServer::start().await;
    let router = test_router(&test_config(&github), Vec::new());

    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), status);
    assert_eq!(body_json(response).await, json!({ "message": message }));
    assert!(
        github.received_requests().await.unwrap_or_default().is_empty(),
        "rejected deliveries must not reach GitHub"
    );
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_missing_event_header() {
        let body = "{}";
        let signature = sign(WEBHOOK_SECRET, body.as_bytes());
        assert_rejected(
            webhook_request(None, Some("d-1"), Some(&signature), body),
            StatusCode::BAD_REQUEST,
            "X-GitHub-Event not sent",
        )
        .await;
    }

    #[tokio::test]
    async fn test_missing_delivery_header() {
        let body = "{}";
        let signature = sign(WEBHOOK_SECRET, body.as_bytes());
        assert_rejected(
            webhook_request(Some("ping"), None, Some(&signature), body),
            StatusCode::BAD_REQUEST,
            "X-GitHub-Delivery not sent",
        )
        .await;
    }

    #[tokio::test]
    async fn test_body_must_be_an_object() {
        let body = "[1, 2, 3]";
        let signature = sign(WEBHOOK_SECRET, body.as_bytes());
        assert_rejected(
            webhook_request(Some("ping"), Some("d-1"), Some(&signature), body),
            StatusCode::BAD_REQUEST,
            "body is not an object",
        )
        .await;
    }

    #[tokio::test]
    async fn test_unparseable_body_is_not_an_object() {
        assert_rejected(
            webhook_request(Some("ping"), Some("d-1"), None, "not json"),
            StatusCode::BAD_REQUEST,
            "body is not an object",
        )
        .await;
    }

    #[tokio::test]
    async fn test_missing_signature_header() {
        assert_rejected(
            webhook_request(Some("ping"), Some("d-1"), None, "{}"),
            StatusCode::BAD_REQUEST,
            "X-Hub-Signature not sent",
        )
        .await;
    }

    #[tokio::test]
    async fn test_signature_with_wrong_secret() {
        let body = r#"{"zen":"Keep it logically awesome."}"#;
        let signature = sign("not the secret", body.as_bytes());
        assert_rejected(
            webhook_request(Some("ping"), Some("d-1"), Some(&signature), body),
            StatusCode::BAD_REQUEST,
            "signature validation failed",
        )
        .await;
    }

    #[tokio::test]
    async fn test_signature_over_different_body() {
        let signature = sign(WEBHOOK_SECRET, br#"{"zen":"original"}"#);
        assert_rejected(
            webhook_request(Some("ping"), Some("d-1"), Some(&signature), r#"{"zen":"tampered"}"#),
            StatusCode::BAD_REQUEST,
            "signature validation failed",
        )
        .await;
    }

    #[tokio::test]
    async fn test_unknown_event_name() {
        assert_rejected(
            signed_webhook("issues", r#"{"action":"opened"}"#),
            StatusCode::BAD_REQUEST,
            "invalid event name",
        )
        .await;
    }

    #[tokio::test]
    async fn test_signature_checked_before_event_name() {
        let body = "{}";
        let signature = sign("wrong", body.as_bytes());
        assert_rejected(
            webhook_request(Some("issues"), Some("d-1"), Some(&signature), body),
            StatusCode::BAD_REQUEST,
            "signature validation failed",
        )
        .await;
    }
}

mod delivery {
    use super::*;

    #[tokio::test]
    async fn test_ping_is_acknowledged() {
        let github = MockServer::start().await;
        mount_installation_token(&github).await;
        let handler = RecordingHandler::default();
        let router = test_router(&test_config(&github), vec![Arc::new(handler.clone())]);

        let response = router
            .oneshot(signed_webhook("ping", r#"{"zen":"Design for failure.","hook":{"app_id":1001}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "ok": true }));
        assert_eq!(*handler.seen.lock().unwrap(), vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_handler_uses_installation_client() {
        let github = MockServer::start().await;
        mount_installation_token(&github).await;
        Mock::given(method("GET"))
            .and(path("/repos/se-edu/addressbook-level4"))
            .and(header("authorization", "token ghs_installation"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "full_name": "se-edu/addressbook-level4" })),
            )
            .expect(1)
            .mount(&github)
            .await;

        let handler = RecordingHandler {
            call_github: true,
            ..RecordingHandler::default()
        };
        let router = test_router(&test_config(&github), vec![Arc::new(handler.clone())]);

        let response = router
            .oneshot(signed_webhook("pull_request", PULL_REQUEST_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec![
                "se-edu/addressbook-level4#17 merged=true".to_string(),
                "se-edu/addressbook-level4".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_handler_failure_is_still_acknowledged() {
        let github = MockServer::start().await;
        mount_installation_token(&github).await;
        let recorder = RecordingHandler::default();
        let router = test_router(
            &test_config(&github),
            vec![Arc::new(FailingHandler), Arc::new(recorder.clone())],
        );

        let response = router
            .oneshot(signed_webhook("pull_request", PULL_REQUEST_BODY))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "ok": true }));
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_token_failure_is_a_gateway_error() {
        let github = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/installations/{}/access_tokens", INSTALLATION_ID)))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
            )
            .mount(&github)
            .await;
        let handler = RecordingHandler::default();
        let router = test_router(&test_config(&github), vec![Arc::new(handler.clone())]);

        let response = router
            .oneshot(signed_webhook("ping", r#"{"zen":"Speak like a human."}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body, json!({ "message": "GitHub request failed" }));
        assert!(!body.to_string().contains("Bad credentials"));
        assert!(handler.seen.lock().unwrap().is_empty());
    }
}
