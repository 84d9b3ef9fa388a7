//! Integration tests for the OAuth login flow
//!
//! A browser session is simulated by carrying `Set-Cookie` values from one
//! response into the `Cookie` header of the next request.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, browser_get, cookie_pair, location, set_cookie_for, test_config, test_router,
    CLIENT_ID, CLIENT_SECRET, HOST,
};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REDIRECT_COOKIE: &str = "AUTH_REDIRECT";
const TOKEN_COOKIE: &str = "GH_ACCESS_TOKEN";

async fn mount_token_exchange(github: &MockServer, code: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(header("accept", "application/json"))
        .and(body_string_contains(format!("code={}", code)))
        .and(body_string_contains(format!("client_id={}", urlencoding::encode(CLIENT_ID))))
        .and(body_string_contains(format!("client_secret={}", CLIENT_SECRET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "scope": ""
        })))
        .expect(1)
        .mount(github)
        .await;
}

#[tokio::test]
async fn test_login_then_callback_lands_on_requested_page() {
    let github = MockServer::start().await;
    mount_token_exchange(&github, "code-123", "gho_user_token").await;
    let router = test_router(&test_config(&github), Vec::new());

    // Step 1: login stores the redirect and sends the browser to GitHub
    let response = router
        .clone()
        .oneshot(browser_get("/auth/login?redirect=%2Fdashboard", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let authorize = url::Url::parse(&location(&response)).unwrap();
    assert_eq!(authorize.path(), "/login/oauth/authorize");
    let params: Vec<(String, String)> = authorize.query_pairs().into_owned().collect();
    assert!(params.contains(&("response_type".to_string(), "code".to_string())));
    assert!(params.contains(&("client_id".to_string(), CLIENT_ID.to_string())));
    assert!(params.contains(&(
        "redirect_uri".to_string(),
        format!("http://{}/auth/login/callback", HOST)
    )));

    let redirect_cookie = set_cookie_for(&response, REDIRECT_COOKIE).expect("redirect cookie");
    assert!(redirect_cookie.contains("HttpOnly"));
    let redirect_pair = cookie_pair(&redirect_cookie);
    assert_eq!(redirect_pair, format!("{}=%2Fdashboard", REDIRECT_COOKIE));

    // Step 2: GitHub sends the browser back with a code
    let response = router
        .oneshot(browser_get("/auth/login/callback?code=code-123", Some(&redirect_pair)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/dashboard");

    let token_cookie = set_cookie_for(&response, TOKEN_COOKIE).expect("token cookie");
    assert_eq!(cookie_pair(&token_cookie), format!("{}=gho_user_token", TOKEN_COOKIE));
    assert!(token_cookie.contains("HttpOnly"));

    let cleared = set_cookie_for(&response, REDIRECT_COOKIE).expect("redirect cookie cleared");
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_callback_without_redirect_uses_default() {
    let github = MockServer::start().await;
    mount_token_exchange(&github, "abc", "gho_token").await;
    let router = test_router(&test_config(&github), Vec::new());

    let response = router
        .oneshot(browser_get("/auth/login/callback?code=abc", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_offsite_redirect_is_ignored() {
    let github = MockServer::start().await;
    mount_token_exchange(&github, "abc", "gho_token").await;
    let router = test_router(&test_config(&github), Vec::new());

    let cookie = format!("{}={}", REDIRECT_COOKIE, urlencoding::encode("//evil.example.com/"));
    let response = router
        .oneshot(browser_get("/auth/login/callback?code=abc", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_refused_code_reports_github_description() {
    let github = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        })))
        .mount(&github)
        .await;
    let router = test_router(&test_config(&github), Vec::new());

    let cookie = format!("{}=%2Fdashboard", REDIRECT_COOKIE);
    let response = router
        .oneshot(browser_get("/auth/login/callback?code=stale", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(set_cookie_for(&response, REDIRECT_COOKIE)
        .expect("redirect cookie cleared on failure")
        .contains("Max-Age=0"));
    assert!(set_cookie_for(&response, TOKEN_COOKIE).is_none());
    assert_eq!(
        body_json(response).await,
        json!({ "message": "The code passed is incorrect or expired." })
    );
}

#[tokio::test]
async fn test_callback_without_code_is_rejected() {
    let github = MockServer::start().await;
    let router = test_router(&test_config(&github), Vec::new());

    let response = router
        .oneshot(browser_get("/auth/login/callback", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "message": "code not provided" }));
    assert!(github.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_logout_clears_token() {
    let github = MockServer::start().await;
    let router = test_router(&test_config(&github), Vec::new());

    let cookie = format!("{}=gho_user_token", TOKEN_COOKIE);
    let response = router
        .oneshot(browser_get("/auth/logout?redirect=%2Fbye", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/bye");
    let cleared = set_cookie_for(&response, TOKEN_COOKIE).expect("token cookie cleared");
    assert_eq!(cookie_pair(&cleared), format!("{}=", TOKEN_COOKIE));
    assert!(cleared.contains("Max-Age=0"));
}
