//! GitHub REST API calling convention.
//!
//! An [`ApiClient`] is a bound calling convention: a base URL, the fixed
//! `User-Agent`/`Accept` headers, an optional `Authorization` header derived
//! from a [`Credential`], and JSON encoding. It holds no other state and is
//! cheap to clone.
//!
//! The three factory functions mirror the three credential modes:
//!
//! | Function | Credential | `Authorization` |
//! |----------|------------|-----------------|
//! | [`create_api`] | any | per credential |
//! | [`create_app_api`] | App JWT | `Bearer <jwt>` |
//! | [`create_access_token_api`] | access token | `token <token>` |
//!
//! All of them are pure constructors: no network I/O and no caching.

mod installation;
mod pagination;

use chrono::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{AppPrivateKey, Credential, GitHubAppId};
use crate::error::ApiError;

pub use installation::{
    request_installation_token, user_installation_ids, Installation, InstallationAccount,
    UserInstallationsPage,
};
pub use pagination::{fetch_page, for_each_page, parse_link_header, Links, Page};

/// GitHub API base endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com/";

/// Accept header sent to the GitHub API: the App preview media type and plain JSON.
pub const ACCEPT_HEADER: &str = "application/vnd.github.machine-man-preview+json application/json";

// ============================================================================
// Requests
// ============================================================================

/// A request relative to the client's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path (and query) relative to the base URL; a leading `/` is ignored
    pub path: String,
    /// Optional JSON body
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A GET request for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    /// A POST request for `path` without a body.
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP calling convention bound to one credential.
///
/// # Examples
///
/// ```no_run
/// # use edu_bot_github::client::{create_access_token_api, ApiRequest};
/// # async fn example() -> Result<(), edu_bot_github::ApiError> {
/// let api = create_access_token_api("gho_xxx", "se-edu-bot")?;
/// let user: serde_json::Value = api.send_json(&ApiRequest::get("user")).await?;
/// println!("{}", user["login"]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: Url,
    authenticated: bool,
}

impl ApiClient {
    /// Start building a client for `credential`.
    pub fn builder(credential: Credential) -> ApiClientBuilder {
        ApiClientBuilder::new(credential)
    }

    /// The trusted base URL; always ends with `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether requests carry an `Authorization` header.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Resolve `path` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidRequest` if the result is not a valid URL.
    pub fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let normalized_path = path.strip_prefix('/').unwrap_or(path);
        self.base_url
            .join(normalized_path)
            .map_err(|e| ApiError::InvalidRequest {
                message: format!("Invalid API path '{}': {}", path, e),
            })
    }

    /// Send a request and return the raw response.
    ///
    /// Does NOT return an error for non-2xx status codes.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the URL is invalid or the transport fails.
    pub async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url = self.url_for(&request.path)?;

        let mut builder = self.http_client.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// Send a request and decode a successful JSON response.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::HttpError` for non-2xx statuses, `ApiError::JsonError`
    /// if the body is not the expected JSON.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let response = error_for_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET `path` and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::get(path)).await
    }

    /// POST `body` to `path` and decode the JSON response.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let request = match body {
            Some(body) => ApiRequest::post(path).with_body(body),
            None => ApiRequest::post(path),
        };
        self.send_json(&request).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.authenticated)
            .finish()
    }
}

/// Turn a non-2xx response into `ApiError::HttpError`.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    Err(ApiError::HttpError {
        status: status.as_u16(),
        message: canonical_message(status, message),
    })
}

fn canonical_message(status: StatusCode, body: String) -> String {
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown status")
            .to_string()
    } else {
        body
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ApiClient`].
///
/// Defaults to [`GITHUB_API_URL`]; tests and GitHub Enterprise point it elsewhere.
#[derive(Debug)]
pub struct ApiClientBuilder {
    credential: Credential,
    user_agent: String,
    base_url: String,
}

impl ApiClientBuilder {
    fn new(credential: Credential) -> Self {
        Self {
            credential,
            user_agent: concat!("se-edu-bot/", env!("CARGO_PKG_VERSION")).to_string(),
            base_url: GITHUB_API_URL.to_string(),
        }
    }

    /// Set the user agent string (required by GitHub).
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the base URL or a header value is invalid, the
    /// credential cannot be signed, or the HTTP client cannot be created.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let mut base = self.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| ApiError::InvalidRequest {
            message: format!("Invalid API base URL '{}': {}", base, e),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(&self.user_agent, "User-Agent")?);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));

        let authorization = self.credential.authorization()?;
        let authenticated = authorization.is_some();
        if let Some(authorization) = authorization {
            let mut value = header_value(&authorization, "Authorization")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(ApiClient {
            http_client,
            base_url,
            authenticated,
        })
    }
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::InvalidRequest {
        message: format!("{} contains characters not allowed in a header", name),
    })
}

// ============================================================================
// Factories
// ============================================================================

/// Create an [`ApiClient`] for the GitHub API with the given credential.
///
/// # Errors
///
/// See [`ApiClientBuilder::build`].
pub fn create_api(credential: Credential, user_agent: &str) -> Result<ApiClient, ApiError> {
    ApiClient::builder(credential).user_agent(user_agent).build()
}

/// Create an [`ApiClient`] that authorizes as the GitHub App.
///
/// `expires_in` is the JWT lifetime; GitHub rejects lifetimes over 10 minutes.
pub fn create_app_api(
    app_id: GitHubAppId,
    private_key: AppPrivateKey,
    expires_in: Duration,
    user_agent: &str,
) -> Result<ApiClient, ApiError> {
    create_api(
        Credential::AppJwt {
            app_id,
            private_key,
            expires_in,
        },
        user_agent,
    )
}

/// Create an [`ApiClient`] that authorizes as a user or installation using an access token.
pub fn create_access_token_api(access_token: &str, user_agent: &str) -> Result<ApiClient, ApiError> {
    create_api(Credential::bearer_token(access_token), user_agent)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
