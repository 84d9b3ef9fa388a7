//! JWT generation for GitHub App authentication.
//!
//! GitHub requirements:
//! - RS256 signatures
//! - `iss` is the App ID
//! - `exp` no more than 10 minutes after `iat`
//!
//! `iat` is backdated by [`CLOCK_SKEW_SECONDS`] so a server whose clock runs
//! slightly ahead of GitHub's still produces an acceptable token.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::auth::{AppPrivateKey, GitHubAppId};
use crate::error::SigningError;

/// Seconds subtracted from `iat`.
pub const CLOCK_SKEW_SECONDS: i64 = 60;

/// Claims carried by an App JWT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Issuer: the GitHub App ID.
    pub iss: GitHubAppId,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl JwtClaims {
    fn new(app_id: GitHubAppId, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            iss: app_id,
            iat: (now - Duration::seconds(CLOCK_SKEW_SECONDS)).timestamp(),
            exp: (now + expires_in).timestamp(),
        }
    }
}

/// Sign an RS256 JWT identifying the GitHub App.
///
/// # Errors
///
/// Returns `SigningError::InvalidKey` if the key cannot be loaded by the
/// encoder, or `SigningError::EncodingFailed` if signing fails.
pub fn sign_app_jwt(
    app_id: GitHubAppId,
    private_key: &AppPrivateKey,
    expires_in: Duration,
) -> Result<String, SigningError> {
    let encoding_key =
        EncodingKey::from_rsa_pem(private_key.pem_bytes()).map_err(|e| SigningError::InvalidKey {
            message: format!("Failed to create encoding key: {}", e),
        })?;

    let claims = JwtClaims::new(app_id, expires_in);

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key).map_err(|e| {
        SigningError::EncodingFailed {
            message: format!("Failed to encode JWT: {}", e),
        }
    })
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
