//! Configuration types for the HTTP service

use edu_bot_github::auth::{AppPrivateKey, Credential, GitHubAppId, InstallationId};
use edu_bot_github::client::{ApiClient, GITHUB_API_URL};
use edu_bot_github::{ApiError, ValidationError, WebhookSecret};
use serde::{Deserialize, Serialize};

/// GitHub refuses App JWTs that live longer than ten minutes.
pub const MAX_JWT_EXPIRY_SECONDS: i64 = 600;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// GitHub App and OAuth App credentials
    pub github: GitHubConfig,

    /// User login settings
    pub auth: AuthConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check that the configuration can run a server.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.github.validate()?;
        self.auth.validate()?;
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Path GitHub delivers webhooks to
    pub webhook_path: String,

    /// Trust `X-Forwarded-Proto` and `X-Forwarded-Host` from a reverse proxy
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            shutdown_timeout_seconds: 30,
            webhook_path: "/webhook".to_string(),
            trust_proxy: false,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.webhook_path.starts_with('/') {
            return Err(ValidationError::InvalidFormat {
                field: "server.webhook_path".to_string(),
                message: "must start with '/'".to_string(),
            });
        }
        Ok(())
    }
}

/// GitHub App and OAuth App credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// App ID from the App settings page
    pub app_id: u64,

    /// App private key in PEM format; `\n` escapes are accepted
    pub private_key: String,

    /// Installation the bot acts on and that users must be able to access
    pub installation_id: u64,

    /// Webhook secret configured on the App
    pub webhook_secret: String,

    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// User-Agent sent with every GitHub request
    pub user_agent: String,

    /// REST API base URL
    pub api_url: String,

    /// Web base URL hosting the OAuth endpoints
    pub oauth_url: String,

    /// Lifetime of App JWTs in seconds
    pub jwt_expiry_seconds: i64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            app_id: 0,
            private_key: String::new(),
            installation_id: 0,
            webhook_secret: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: "se-edu-bot".to_string(),
            api_url: GITHUB_API_URL.to_string(),
            oauth_url: "https://github.com/".to_string(),
            jwt_expiry_seconds: 540,
        }
    }
}

impl GitHubConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.app_id == 0 {
            return Err(required("github.app_id"));
        }
        if self.installation_id == 0 {
            return Err(required("github.installation_id"));
        }
        if self.webhook_secret.is_empty() {
            return Err(required("github.webhook_secret"));
        }
        if self.client_id.is_empty() {
            return Err(required("github.client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(required("github.client_secret"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(required("github.user_agent"));
        }
        if self.jwt_expiry_seconds <= 0 || self.jwt_expiry_seconds > MAX_JWT_EXPIRY_SECONDS {
            return Err(ValidationError::OutOfRange {
                field: "github.jwt_expiry_seconds".to_string(),
                message: format!("must be between 1 and {}", MAX_JWT_EXPIRY_SECONDS),
            });
        }
        for (field, value) in [
            ("github.api_url", &self.api_url),
            ("github.oauth_url", &self.oauth_url),
        ] {
            url::Url::parse(value).map_err(|e| ValidationError::InvalidFormat {
                field: field.to_string(),
                message: e.to_string(),
            })?;
        }
        self.app_private_key()?;
        Ok(())
    }

    pub fn app_id(&self) -> GitHubAppId {
        GitHubAppId::new(self.app_id)
    }

    pub fn installation_id(&self) -> InstallationId {
        InstallationId::new(self.installation_id)
    }

    /// Parse and validate the App private key.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the key is missing or not an RSA PEM key.
    pub fn app_private_key(&self) -> Result<AppPrivateKey, ValidationError> {
        if self.private_key.trim().is_empty() {
            return Err(required("github.private_key"));
        }
        AppPrivateKey::from_pem(&self.private_key)
    }

    pub fn webhook_secret(&self) -> WebhookSecret {
        WebhookSecret::new(self.webhook_secret.clone())
    }

    pub fn jwt_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.jwt_expiry_seconds)
    }

    /// How outbound API clients are built.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_url: self.api_url.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("app_id", &self.app_id)
            .field("private_key", &"<REDACTED>")
            .field("installation_id", &self.installation_id)
            .field("webhook_secret", &"<REDACTED>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .field("user_agent", &self.user_agent)
            .field("api_url", &self.api_url)
            .field("oauth_url", &self.oauth_url)
            .field("jwt_expiry_seconds", &self.jwt_expiry_seconds)
            .finish()
    }
}

/// User login settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Prefix of the login, callback and logout routes; empty for the root
    pub base_path: String,

    /// Where to send users when no usable redirect was requested
    pub default_redirect: String,

    /// Cookie remembering the post-login destination
    pub redirect_cookie_name: String,

    /// Cookie holding the user's access token
    pub access_token_cookie_name: String,

    /// Externally visible origin, e.g. `https://bot.example.com`
    pub public_origin: Option<String>,

    /// Mark cookies `Secure`; disable only for local HTTP development
    pub secure_cookies: bool,

    /// Lifetime of the access token cookie; a session cookie when unset
    pub access_token_max_age_seconds: Option<u64>,

    /// Upper bound on installation pages read per access check
    pub max_installation_pages: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_path: "/auth".to_string(),
            default_redirect: "/".to_string(),
            redirect_cookie_name: "AUTH_REDIRECT".to_string(),
            access_token_cookie_name: "GH_ACCESS_TOKEN".to_string(),
            public_origin: None,
            secure_cookies: true,
            access_token_max_age_seconds: None,
            max_installation_pages: 100,
        }
    }
}

impl AuthConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.base_path.is_empty()
            && (!self.base_path.starts_with('/') || self.base_path.ends_with('/'))
        {
            return Err(ValidationError::InvalidFormat {
                field: "auth.base_path".to_string(),
                message: "must be empty or start with '/' and not end with '/'".to_string(),
            });
        }
        if !self.default_redirect.starts_with('/') || self.default_redirect.starts_with("//") {
            return Err(ValidationError::InvalidFormat {
                field: "auth.default_redirect".to_string(),
                message: "must be a same-origin absolute path".to_string(),
            });
        }
        for (field, name) in [
            ("auth.redirect_cookie_name", &self.redirect_cookie_name),
            ("auth.access_token_cookie_name", &self.access_token_cookie_name),
        ] {
            if !is_cookie_name(name) {
                return Err(ValidationError::InvalidFormat {
                    field: field.to_string(),
                    message: format!("'{}' is not a valid cookie name", name),
                });
            }
        }
        if self.redirect_cookie_name == self.access_token_cookie_name {
            return Err(ValidationError::InvalidFormat {
                field: "auth.redirect_cookie_name".to_string(),
                message: "must differ from auth.access_token_cookie_name".to_string(),
            });
        }
        if let Some(origin) = &self.public_origin {
            let parsed = url::Url::parse(origin).map_err(|e| ValidationError::InvalidFormat {
                field: "auth.public_origin".to_string(),
                message: e.to_string(),
            })?;
            if parsed.path() != "/" || parsed.query().is_some() {
                return Err(ValidationError::InvalidFormat {
                    field: "auth.public_origin".to_string(),
                    message: "must be scheme and host only".to_string(),
                });
            }
        }
        if self.max_installation_pages == 0 {
            return Err(ValidationError::OutOfRange {
                field: "auth.max_installation_pages".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Everything needed to build an [`ApiClient`] apart from the credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_url: String,
    pub user_agent: String,
}

impl ClientSettings {
    /// Build a client authorized with `credential`.
    ///
    /// # Errors
    ///
    /// See [`edu_bot_github::client::ApiClientBuilder::build`].
    pub fn api(&self, credential: Credential) -> Result<ApiClient, ApiError> {
        ApiClient::builder(credential)
            .user_agent(self.user_agent.as_str())
            .base_url(self.api_url.as_str())
            .build()
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        GitHubConfig::default().client_settings()
    }
}

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

/// RFC 6265 token characters.
fn is_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
