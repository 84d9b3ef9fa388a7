//! Webhook delivery headers and HMAC-SHA1 signatures.
//!
//! GitHub signs each delivery with the App's webhook secret and sends the
//! result in `X-Hub-Signature` as `sha1=<lowercase hex>`. The signature covers
//! the exact request bytes, so verification must run against the raw body,
//! never a re-serialized JSON value.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SigningError;

type HmacSha1 = Hmac<Sha1>;

/// Header naming the event type.
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the unique delivery ID.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Header carrying the HMAC-SHA1 signature of the body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

const SIGNATURE_PREFIX: &str = "sha1=";

/// Shared secret configured on the GitHub App's webhook.
///
/// # Examples
///
/// ```
/// use edu_bot_github::webhook::WebhookSecret;
///
/// let secret = WebhookSecret::new("It's a Secret to Everybody");
/// let signature = secret.sign(b"Hello, World!").unwrap();
/// assert!(signature.starts_with("sha1="));
/// assert!(secret.verify(b"Hello, World!", &signature));
/// assert!(!secret.verify(b"Hello, World?", &signature));
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compute the `X-Hub-Signature` value for `payload`.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::EncodingFailed` if the MAC cannot be keyed.
    pub fn sign(&self, payload: &[u8]) -> Result<String, SigningError> {
        let mut mac = HmacSha1::new_from_slice(self.0.as_bytes()).map_err(|e| {
            SigningError::EncodingFailed {
                message: format!("Failed to create HMAC instance: {}", e),
            }
        })?;
        mac.update(payload);

        Ok(format!(
            "{}{}",
            SIGNATURE_PREFIX,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Check `signature` against the signature of `payload`.
    ///
    /// The comparison is byte-for-byte and constant-time over equal-length
    /// inputs. Any signing failure counts as a mismatch.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = self.sign(payload) else {
            return false;
        };

        let expected = expected.as_bytes();
        let provided = signature.as_bytes();
        if expected.len() != provided.len() {
            return false;
        }

        expected.ct_eq(provided).into()
    }
}

impl From<String> for WebhookSecret {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(<REDACTED>)")
    }
}

/// Compute the `sha1=<hex>` signature of `payload` under `secret`.
///
/// # Errors
///
/// See [`WebhookSecret::sign`].
pub fn sign_payload(secret: &str, payload: &[u8]) -> Result<String, SigningError> {
    WebhookSecret::new(secret).sign(payload)
}

/// Verify a `sha1=<hex>` signature of `payload` under `secret`.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    WebhookSecret::new(secret).verify(payload, signature)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
