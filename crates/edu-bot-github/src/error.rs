//! Error types for talking to GitHub.
//!
//! [`ApiError`] covers outbound calls and pagination, [`SigningError`] covers
//! App JWTs and [`ValidationError`] covers identifiers, keys and configuration
//! values. Nothing here is retried; callers decide what a failure means for
//! their request.

use thiserror::Error;

/// A GitHub REST call failed.
#[derive(Debug, Error)]
pub enum ApiError {
    /// GitHub answered with a non-2xx status.
    #[error("GitHub returned {status}: {message}")]
    HttpError { status: u16, message: String },

    /// The response decoded but lacked a field the caller needs.
    #[error("unexpected response from GitHub: {message}")]
    InvalidResponse { message: String },

    /// A `rel="next"` link pointed outside the trusted base URL.
    #[error("invalid next page url {url}")]
    UntrustedNextPage { url: String },

    /// The request could not be built (bad path or header value).
    #[error("cannot build GitHub request: {message}")]
    InvalidRequest { message: String },

    /// The credential could not produce an `Authorization` header.
    #[error("credential unusable: {0}")]
    Credential(#[from] SigningError),

    /// The response body was not the JSON the caller asked for.
    #[error("cannot decode GitHub response: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Transport failure: DNS, connect, TLS or a broken body stream.
    #[error("cannot reach GitHub: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl ApiError {
    /// GitHub rejected the credential (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::HttpError { status: 401, .. })
    }

    /// The failure was refused by a trust check rather than caused upstream.
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Self::UntrustedNextPage { .. })
    }
}

/// An App JWT could not be produced.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The RSA key was rejected by the signer.
    #[error("private key rejected: {message}")]
    InvalidKey { message: String },

    /// Claims could not be encoded or signed.
    #[error("cannot sign App JWT: {message}")]
    EncodingFailed { message: String },
}

/// A value failed validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is malformed: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("{field} is out of range: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
