//! HTTP-facing error taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use edu_bot_github::{ApiError, ValidationError};
use tracing::{error, warn};

const UPSTREAM_MESSAGE: &str = "GitHub request failed";

/// Request failures, mapped onto HTTP status codes.
///
/// | Kind | Status |
/// |------|--------|
/// | `ClientInput` | 400 |
/// | `Authorization` | 403 |
/// | `Security` | 400 |
/// | `Infrastructure` | 500 |
/// | `Upstream` | 502 |
///
/// Every failure halts the pipeline immediately; nothing here is retried.
/// The response body is `{"message": ...}`. Upstream details can contain
/// provider output, so they are logged server-side and replaced with a
/// generic message.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Malformed or incomplete input from the caller.
    #[error("{message}")]
    ClientInput { message: String },

    /// The caller is not allowed to proceed.
    #[error("{message}")]
    Authorization { message: String },

    /// A check that protects a trust boundary failed.
    #[error("{message}")]
    Security { message: String },

    /// The server is wired up incorrectly.
    #[error("{message}")]
    Infrastructure { message: String },

    /// GitHub failed or answered with something unusable.
    #[error("{message}")]
    Upstream { message: String },
}

impl RequestError {
    pub fn client_input(message: impl Into<String>) -> Self {
        Self::ClientInput {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::Security {
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ClientInput { .. } | Self::Security { .. } => StatusCode::BAD_REQUEST,
            Self::Authorization { .. } => StatusCode::FORBIDDEN,
            Self::Infrastructure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ApiError> for RequestError {
    fn from(e: ApiError) -> Self {
        if e.is_security_violation() {
            return Self::security(e.to_string());
        }
        match e {
            ApiError::Credential(_) | ApiError::InvalidRequest { .. } => {
                error!(error = %e, "GitHub client could not be built");
                Self::infrastructure("GitHub client unavailable")
            }
            _ => Self::upstream(e.to_string()),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Upstream { message } => {
                error!(error = %message, "Upstream request failed");
                UPSTREAM_MESSAGE.to_string()
            }
            Self::Infrastructure { message } => {
                error!(error = %message, "Internal server error occurred");
                message.clone()
            }
            Self::Security { message } => {
                warn!(error = %message, "Request rejected by security check");
                message.clone()
            }
            Self::ClientInput { message } | Self::Authorization { message } => message.clone(),
        };

        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ValidationError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
