//! GitHub user login and installation-based access control.
//!
//! Three routes live under a configurable base path:
//!
//! - `GET {base}/login[?redirect=]` remembers the destination in a short-lived
//!   cookie and sends the browser to GitHub's authorize page.
//! - `GET {base}/login/callback?code=` exchanges the code for an access token,
//!   stores it in an HTTP-only cookie and returns the user to the remembered
//!   destination.
//! - `GET {base}/logout[?redirect=]` drops the access token cookie.
//!
//! [`require_installation`] guards other routes: it lets a request through
//! only when the user's token can see the configured App installation.
//!
//! Every redirect target supplied by a client passes [`sanitize_redirect`]
//! first, so the login flow cannot be used as an open redirect.

use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{
        header::{HOST, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use edu_bot_github::auth::{Credential, InstallationId};
use edu_bot_github::client::user_installation_ids;
use edu_bot_github::ValidationError;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, RequestTokenError, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ClientSettings, ServiceConfig};
use crate::cookie::{build_clear_cookie, build_set_cookie, read_cookie, CookieOptions};
use crate::error::RequestError;

/// Lifetime of the post-login destination cookie.
pub const REDIRECT_COOKIE_MAX_AGE_SECONDS: u64 = 600;

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";

/// OAuth client with GitHub's authorize and token endpoints set.
type GitHubOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

// ============================================================================
// Redirect sanitisation
// ============================================================================

/// Return `redirect` when it is a same-origin absolute path, else `default`.
///
/// Rejected: absent or empty values, anything not starting with `/`,
/// protocol-relative `//host` forms, `/\host` (which browsers treat the same
/// way) and values containing control characters.
///
/// ```
/// use edu_bot_api::auth::sanitize_redirect;
///
/// assert_eq!(sanitize_redirect(Some("/x/y"), "/"), "/x/y");
/// assert_eq!(sanitize_redirect(Some("http://evil.com"), "/"), "/");
/// assert_eq!(sanitize_redirect(Some("//evil.com"), "/"), "/");
/// assert_eq!(sanitize_redirect(None, "/"), "/");
/// ```
pub fn sanitize_redirect<'a>(redirect: Option<&'a str>, default: &'a str) -> &'a str {
    match redirect {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => default,
    }
}

// ============================================================================
// State
// ============================================================================

/// Login settings and collaborators shared by the routes and the guard.
#[derive(Clone)]
pub struct AuthState {
    oauth: GitHubOAuthClient,
    client_id: String,
    oauth_url: Url,
    base_path: String,
    default_redirect: String,
    redirect_cookie_name: String,
    access_token_cookie_name: String,
    redirect_cookie: CookieOptions,
    access_token_cookie: CookieOptions,
    public_origin: Option<String>,
    trust_proxy: bool,
    api: ClientSettings,
    installation_id: InstallationId,
    max_installation_pages: usize,
    http_client: reqwest::Client,
}

impl AuthState {
    /// Build from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if a URL is malformed or the HTTP client
    /// cannot be created.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ValidationError> {
        let mut oauth_url = config.github.oauth_url.clone();
        if !oauth_url.ends_with('/') {
            oauth_url.push('/');
        }
        let oauth_url = Url::parse(&oauth_url).map_err(|e| ValidationError::InvalidFormat {
            field: "github.oauth_url".to_string(),
            message: e.to_string(),
        })?;

        let endpoint = |path: &str| {
            oauth_url.join(path).map_err(|e| ValidationError::InvalidFormat {
                field: "github.oauth_url".to_string(),
                message: e.to_string(),
            })
        };
        let oauth = BasicClient::new(ClientId::new(config.github.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.github.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(AuthUrl::from_url(endpoint("login/oauth/authorize")?))
            .set_token_uri(TokenUrl::from_url(endpoint("login/oauth/access_token")?));

        // The token endpoint must not be followed through redirects.
        let http_client = reqwest::Client::builder()
            .user_agent(config.github.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ValidationError::InvalidFormat {
                field: "github.user_agent".to_string(),
                message: e.to_string(),
            })?;

        let secure = config.auth.secure_cookies;
        Ok(Self {
            oauth,
            client_id: config.github.client_id.clone(),
            oauth_url,
            base_path: config.auth.base_path.clone(),
            default_redirect: config.auth.default_redirect.clone(),
            redirect_cookie_name: config.auth.redirect_cookie_name.clone(),
            access_token_cookie_name: config.auth.access_token_cookie_name.clone(),
            redirect_cookie: CookieOptions::default()
                .with_secure(secure)
                .with_max_age(Some(REDIRECT_COOKIE_MAX_AGE_SECONDS)),
            access_token_cookie: CookieOptions::default()
                .with_secure(secure)
                .with_max_age(config.auth.access_token_max_age_seconds),
            public_origin: config
                .auth
                .public_origin
                .as_ref()
                .map(|origin| origin.trim_end_matches('/').to_string()),
            trust_proxy: config.server.trust_proxy,
            api: config.github.client_settings(),
            installation_id: config.github.installation_id(),
            max_installation_pages: config.auth.max_installation_pages,
            http_client,
        })
    }

    pub fn login_route(&self) -> String {
        format!("{}/login", self.base_path)
    }

    pub fn login_callback_route(&self) -> String {
        format!("{}/login/callback", self.base_path)
    }

    pub fn logout_route(&self) -> String {
        format!("{}/logout", self.base_path)
    }

    /// Origin the browser used to reach us, e.g. `https://bot.example.com`.
    fn request_origin(&self, headers: &HeaderMap) -> Result<String, RequestError> {
        if let Some(origin) = &self.public_origin {
            return Ok(origin.clone());
        }

        let forwarded = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let (proto, host) = if self.trust_proxy {
            (forwarded(FORWARDED_PROTO), forwarded(FORWARDED_HOST))
        } else {
            (None, None)
        };

        let host = host
            .or_else(|| headers.get(HOST).and_then(|value| value.to_str().ok()))
            .ok_or_else(|| RequestError::client_input("Host header not sent"))?;

        Ok(format!("{}://{}", proto.unwrap_or("http"), host))
    }

    fn oauth_redirect_uri(&self, headers: &HeaderMap) -> Result<RedirectUrl, RequestError> {
        let uri = format!(
            "{}{}",
            self.request_origin(headers)?,
            self.login_callback_route()
        );
        RedirectUrl::new(uri)
            .map_err(|e| RequestError::client_input(format!("invalid callback URL: {}", e)))
    }

    /// GitHub authorize page URL for this request.
    ///
    /// GitHub echoes the generated `state` back to the callback; the flow
    /// keeps its per-login data in the redirect cookie and does not check it.
    fn authorize_url(&self, redirect_uri: RedirectUrl) -> Url {
        let (url, _state) = self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .set_redirect_uri(Cow::Owned(redirect_uri))
            .url();
        url
    }

    /// Exchange an authorization code for a user access token.
    #[instrument(skip(self, code))]
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: RedirectUrl,
    ) -> Result<String, RequestError> {
        let result = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_redirect_uri(Cow::Owned(redirect_uri))
            .request_async(&self.http_client)
            .await;

        match result {
            Ok(token) if !token.access_token().secret().is_empty() => {
                Ok(token.access_token().secret().clone())
            }
            Ok(_) => Err(refused(None, None)),
            Err(RequestTokenError::ServerResponse(response)) => {
                let kind = response.error().to_string();
                Err(refused(
                    Some(&kind),
                    response.error_description().map(String::as_str),
                ))
            }
            // GitHub answers refused codes with HTTP 200 and an error body,
            // which is not a token response.
            Err(RequestTokenError::Parse(_, body)) => {
                let reply: TokenExchangeReply = serde_json::from_slice(&body).map_err(|e| {
                    RequestError::upstream(format!(
                        "token exchange returned an unreadable body: {}",
                        e
                    ))
                })?;
                match reply.access_token.filter(|token| !token.is_empty()) {
                    Some(access_token) => Ok(access_token),
                    None => Err(refused(
                        reply.error.as_deref(),
                        reply.error_description.as_deref(),
                    )),
                }
            }
            Err(e) => Err(RequestError::upstream(format!("token exchange failed: {}", e))),
        }
    }

    fn redirect_cookie(&self, value: &str) -> String {
        build_set_cookie(&self.redirect_cookie_name, value, &self.redirect_cookie)
    }

    fn clear_redirect_cookie(&self) -> String {
        build_clear_cookie(&self.redirect_cookie_name, &self.redirect_cookie)
    }

    fn access_token_cookie(&self, token: &str) -> String {
        build_set_cookie(&self.access_token_cookie_name, token, &self.access_token_cookie)
    }

    fn clear_access_token_cookie(&self) -> String {
        build_clear_cookie(&self.access_token_cookie_name, &self.access_token_cookie)
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("oauth_url", &self.oauth_url.as_str())
            .field("base_path", &self.base_path)
            .field("installation_id", &self.installation_id)
            .finish()
    }
}

/// GitHub's own token endpoint reply, success or refusal.
#[derive(Debug, Deserialize)]
struct TokenExchangeReply {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
}

// ============================================================================
// Routes
// ============================================================================

/// Login, callback and logout routes.
pub fn auth_routes<S>(state: Arc<AuthState>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(&state.login_route(), get(login))
        .route(&state.login_callback_route(), get(login_callback))
        .route(&state.logout_route(), get(logout))
        .with_state(state)
}

/// Start the login flow.
#[instrument(skip(state, headers, query))]
pub async fn login(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    query: Result<Query<RedirectQuery>, QueryRejection>,
) -> Result<Response, RequestError> {
    let Query(query) = query.map_err(malformed_query)?;
    let redirect_uri = state.oauth_redirect_uri(&headers)?;
    let authorize_url = state.authorize_url(redirect_uri);

    let cookie = match query.redirect.as_deref().filter(|r| !r.is_empty()) {
        Some(redirect) => state.redirect_cookie(redirect),
        None => state.clear_redirect_cookie(),
    };

    debug!("Redirecting to GitHub for authorization");
    found(authorize_url.as_str(), &[cookie])
}

/// Finish the login flow.
///
/// The redirect cookie is cleared on every outcome.
#[instrument(skip(state, headers, query))]
pub async fn login_callback(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Response {
    let clear_redirect = state.clear_redirect_cookie();

    let result: Result<Response, RequestError> = async {
        let redirect = read_cookie(&headers, &state.redirect_cookie_name);

        let Query(query) = query.map_err(malformed_query)?;
        let code = query
            .code
            .as_deref()
            .ok_or_else(|| RequestError::client_input("code not provided"))?;

        let redirect_uri = state.oauth_redirect_uri(&headers)?;
        let access_token = state.exchange_code(code, redirect_uri).await?;
        info!("User logged in");

        let target = sanitize_redirect(redirect.as_deref(), &state.default_redirect);
        found(
            target,
            &[clear_redirect.clone(), state.access_token_cookie(&access_token)],
        )
    }
    .await;

    match result {
        Ok(response) => response,
        Err(e) => with_cookie(e.into_response(), &clear_redirect),
    }
}

/// Log the user out.
#[instrument(skip(state, query))]
pub async fn logout(
    State(state): State<Arc<AuthState>>,
    query: Result<Query<RedirectQuery>, QueryRejection>,
) -> Result<Response, RequestError> {
    let Query(query) = query.map_err(malformed_query)?;
    let target = sanitize_redirect(query.redirect.as_deref(), &state.default_redirect);
    found(target, &[state.clear_access_token_cookie()])
}

// ============================================================================
// Access control
// ============================================================================

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The user can see the installation.
    Granted,
    /// The user must log in first; carries the login URL.
    LoginRequired(String),
}

impl AuthState {
    /// Decide whether the request may reach a protected route.
    ///
    /// # Errors
    ///
    /// `Authorization` when the installation is not among the user's
    /// installations (only the first `max_installation_pages` pages are read),
    /// or the error from listing installations.
    #[instrument(skip(self, headers), fields(installation_id = %self.installation_id))]
    pub async fn check_access(
        &self,
        headers: &HeaderMap,
        path_and_query: &str,
    ) -> Result<Access, RequestError> {
        let login = format!(
            "{}?redirect={}",
            self.login_route(),
            urlencoding::encode(path_and_query)
        );

        let Some(token) = read_cookie(headers, &self.access_token_cookie_name) else {
            debug!("No access token; redirecting to login");
            return Ok(Access::LoginRequired(login));
        };

        let user_api = match self.api.api(Credential::bearer_token(token)) {
            Ok(api) => api,
            Err(e) => {
                info!(error = %e, "Unusable access token cookie; redirecting to login");
                return Ok(Access::LoginRequired(login));
            }
        };
        let installations = match user_installation_ids(&user_api, self.max_installation_pages).await {
            Ok(ids) => ids,
            Err(e) if e.is_unauthorized() => {
                info!("Access token rejected by GitHub; redirecting to login");
                return Ok(Access::LoginRequired(login));
            }
            Err(e) => return Err(e.into()),
        };

        if installations.contains(&self.installation_id) {
            Ok(Access::Granted)
        } else {
            warn!(
                visible_installations = installations.len(),
                "User cannot access installation"
            );
            Err(RequestError::authorization("installation access denied"))
        }
    }
}

/// Middleware admitting only users who can access the configured installation.
///
/// Use with [`axum::middleware::from_fn_with_state`].
pub async fn require_installation(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: middleware::Next,
) -> Response {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    match state.check_access(request.headers(), &path_and_query).await {
        Ok(Access::Granted) => next.run(request).await,
        Ok(Access::LoginRequired(login)) => match found(&login, &[state.clear_access_token_cookie()]) {
            Ok(response) => response,
            Err(e) => e.into_response(),
        },
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn malformed_query(rejection: QueryRejection) -> RequestError {
    debug!(error = %rejection.body_text(), "Rejected query string");
    RequestError::client_input("invalid query string")
}

/// The provider refused to issue a token.
fn refused(error: Option<&str>, description: Option<&str>) -> RequestError {
    warn!(error = error.unwrap_or(""), "Token exchange refused");
    RequestError::authorization(
        description
            .filter(|description| !description.is_empty())
            .unwrap_or("Unknown error"),
    )
}

/// `302 Found` to `location`, setting `cookies`.
fn found(location: &str, cookies: &[String]) -> Result<Response, RequestError> {
    let location = HeaderValue::from_bytes(location.as_bytes())
        .map_err(|_| RequestError::client_input("invalid redirect location"))?;

    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(LOCATION, location);
    for cookie in cookies {
        response = with_cookie(response, cookie);
    }
    Ok(response)
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
