//! Tests for event dispatch.

use super::*;
use crate::pipeline::Pipeline;
use axum::http::HeaderMap;
use edu_bot_github::events::PullRequestAction;
use edu_bot_github::EventName;
use serde_json::json;
use std::sync::Mutex;

struct Recording {
    name: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl EventHandler for Recording {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, event: &WebhookEvent, _ctx: &WebhookContext) -> Result<(), HandlerError> {
        let summary = match event {
            WebhookEvent::Ping(ping) => format!("{}: ping {}", self.name, ping.hook.app_id),
            WebhookEvent::PullRequest(pr) => {
                format!("{}: pull_request {} #{}", self.name, pr.action, pr.number)
            }
        };
        self.seen.lock().unwrap().push(summary);
        if self.fail {
            return Err("handler exploded".into());
        }
        Ok(())
    }
}

fn recording(name: &'static str, seen: &Arc<Mutex<Vec<String>>>, fail: bool) -> Recording {
    Recording {
        name,
        seen: Arc::clone(seen),
        fail,
    }
}

fn validated(event: EventName, body: serde_json::Value) -> WebhookContext {
    let mut ctx = WebhookContext::new(HeaderMap::new(), None, body);
    ctx.event = Some(event);
    ctx.delivery_id = Some("delivery-1".to_string());
    ctx.response = Some(json!({"ok": true}));
    ctx
}

fn pull_request_body() -> serde_json::Value {
    json!({
        "action": "opened",
        "number": 7,
        "pull_request": {"merged": false, "user": {"login": "student"}},
        "repository": {"name": "addressbook", "owner": {"login": "se-edu"}}
    })
}

#[tokio::test]
async fn test_handlers_receive_typed_event_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let stage = EventDispatchStage::default()
        .with_handler(recording("first", &seen, false))
        .with_handler(recording("second", &seen, false));
    let mut ctx = validated(EventName::PullRequest, pull_request_body());

    Pipeline::new().with_stage(stage).run(&mut ctx).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            format!("first: pull_request {} #7", PullRequestAction::Opened),
            format!("second: pull_request {} #7", PullRequestAction::Opened),
        ]
    );
}

#[tokio::test]
async fn test_handler_failure_is_swallowed() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let stage = EventDispatchStage::default()
        .with_handler(recording("broken", &seen, true))
        .with_handler(recording("healthy", &seen, false));
    let mut ctx = validated(EventName::Ping, json!({"hook": {"app_id": 99}}));

    Pipeline::new().with_stage(stage).run(&mut ctx).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["broken: ping 99".to_string(), "healthy: ping 99".to_string()]
    );
    assert_eq!(ctx.response, Some(json!({"ok": true})));
}

#[tokio::test]
async fn test_undecodable_payload_skips_handlers() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let stage = EventDispatchStage::default().with_handler(recording("only", &seen, false));
    let mut ctx = validated(EventName::PullRequest, json!({"action": "opened"}));

    Pipeline::new().with_stage(stage).run(&mut ctx).await.unwrap();

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unvalidated_context_is_infrastructure_error() {
    let stage = EventDispatchStage::default().with_handler(LogWebhookHandler);
    let mut ctx = WebhookContext::new(HeaderMap::new(), None, json!({}));

    let result = Pipeline::new().with_stage(stage).run(&mut ctx).await;

    assert!(matches!(result, Err(RequestError::Infrastructure { .. })));
}

#[tokio::test]
async fn test_log_handler_accepts_every_event() {
    let mut ctx = validated(EventName::PullRequest, pull_request_body());
    let event = WebhookEvent::decode(EventName::PullRequest, &ctx.body).unwrap();

    assert!(LogWebhookHandler.handle(&event, &ctx).await.is_ok());

    ctx.delivery_id = None;
    assert!(LogWebhookHandler.handle(&event, &ctx).await.is_ok());
}

#[test]
fn test_debug_lists_handler_names() {
    let stage = EventDispatchStage::new(vec![Arc::new(LogWebhookHandler)]);
    assert_eq!(stage.len(), 1);
    assert!(format!("{:?}", stage).contains("log-webhook"));
}
