//! GitHub App identity and credential types.
//!
//! This module provides:
//! - ID types ([`GitHubAppId`], [`InstallationId`])
//! - The App private key ([`AppPrivateKey`]), validated on construction and
//!   zeroized on drop
//! - [`Credential`], the three ways an [`ApiClient`](crate::client::ApiClient)
//!   can authenticate
//!
//! Credentials are immutable values. Nothing here performs network I/O or
//! caches tokens; an App JWT is signed when a client is built from it.

use chrono::Duration;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{SigningError, ValidationError};

pub mod jwt;

pub use jwt::{sign_app_jwt, JwtClaims};

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|e| ValidationError::InvalidFormat {
                        field: $field.to_string(),
                        message: e.to_string(),
                    })
            }
        }
    };
}

numeric_id!(
    /// Numeric App ID shown on the App's settings page; the `iss` of App JWTs.
    ///
    /// ```
    /// use edu_bot_github::auth::GitHubAppId;
    ///
    /// let app_id: GitHubAppId = "4711".parse().unwrap();
    /// assert_eq!(app_id, GitHubAppId::new(4711));
    /// assert_eq!(app_id.to_string(), "4711");
    /// ```
    GitHubAppId,
    "app_id"
);

numeric_id!(
    /// One grant of the App to a user or organization.
    ///
    /// Installation tokens are minted for it, and users are admitted to
    /// protected pages only when it is among their visible installations.
    InstallationId,
    "installation_id"
);

// ============================================================================
// Private Key
// ============================================================================

/// PEM-encoded RSA private key of the GitHub App.
///
/// The key is parsed once on construction so that a malformed key is reported
/// at configuration time instead of on the first webhook. Key material is
/// zeroized when the value is dropped and never appears in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AppPrivateKey {
    pem: String,
}

impl AppPrivateKey {
    /// Create a private key from a PEM string (PKCS#1 or PKCS#8).
    ///
    /// Keys pasted into environment variables often carry literal `\n`
    /// sequences instead of line breaks; those are expanded before parsing.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFormat` if the string is empty, has no
    /// PEM markers, or does not contain an RSA private key.
    pub fn from_pem(pem: &str) -> Result<Self, ValidationError> {
        let mut pem = pem.trim().to_string();
        if !pem.contains('\n') && pem.contains("\\n") {
            pem = pem.replace("\\n", "\n");
        }

        let malformed = |message: String| ValidationError::InvalidFormat {
            field: "private_key".to_string(),
            message,
        };

        if pem.is_empty() {
            return Err(malformed("empty".to_string()));
        }
        if !(pem.contains("-----BEGIN") && pem.contains("-----END")) {
            return Err(malformed("not PEM encoded".to_string()));
        }

        let parsed = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(&pem).map(drop).map_err(|e| e.to_string())
        } else {
            RsaPrivateKey::from_pkcs8_pem(&pem).map(drop).map_err(|e| e.to_string())
        };
        parsed.map_err(|e| malformed(format!("not an RSA private key: {}", e)))?;

        Ok(Self { pem })
    }

    /// PEM bytes for the JWT encoder.
    pub(crate) fn pem_bytes(&self) -> &[u8] {
        self.pem.as_bytes()
    }
}

impl FromStr for AppPrivateKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_pem(s)
    }
}

impl std::fmt::Debug for AppPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppPrivateKey")
            .field("pem", &"<REDACTED>")
            .finish()
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// How an API client authenticates.
///
/// # Examples
///
/// ```
/// use edu_bot_github::auth::Credential;
///
/// let credential = Credential::bearer_token("ghs_abc");
/// assert_eq!(
///     credential.authorization().unwrap().as_deref(),
///     Some("token ghs_abc")
/// );
/// assert_eq!(Credential::None.authorization().unwrap(), None);
/// ```
#[derive(Clone)]
pub enum Credential {
    /// Unauthenticated requests.
    None,

    /// Authenticate as the GitHub App itself with a freshly signed JWT.
    AppJwt {
        app_id: GitHubAppId,
        private_key: AppPrivateKey,
        expires_in: Duration,
    },

    /// Authenticate with a user or installation access token.
    BearerToken { token: String },
}

impl Credential {
    /// Build an access-token credential.
    pub fn bearer_token(token: impl Into<String>) -> Self {
        Self::BearerToken {
            token: token.into(),
        }
    }

    /// Produce the `Authorization` header value, or `None` when unauthenticated.
    ///
    /// For [`Credential::AppJwt`] a new JWT is signed on every call.
    ///
    /// # Errors
    ///
    /// Returns `SigningError` if the App JWT cannot be signed.
    pub fn authorization(&self) -> Result<Option<String>, SigningError> {
        match self {
            Self::None => Ok(None),
            Self::AppJwt {
                app_id,
                private_key,
                expires_in,
            } => {
                let jwt = sign_app_jwt(*app_id, private_key, *expires_in)?;
                Ok(Some(format!("Bearer {}", jwt)))
            }
            Self::BearerToken { token } => Ok(Some(format!("token {}", token))),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("Credential::None"),
            Self::AppJwt {
                app_id, expires_in, ..
            } => f
                .debug_struct("Credential::AppJwt")
                .field("app_id", app_id)
                .field("expires_in", expires_in)
                .field("private_key", &"<REDACTED>")
                .finish(),
            Self::BearerToken { .. } => f
                .debug_struct("Credential::BearerToken")
                .field("token", &"<REDACTED>")
                .finish(),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
