//! Installation endpoints used by the bot.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{for_each_page, ApiClient, ApiRequest};
use crate::auth::InstallationId;
use crate::error::ApiError;

/// Account (user or organization) an installation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationAccount {
    pub login: String,
}

/// An App installation visible to the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: InstallationId,
    #[serde(default)]
    pub account: Option<InstallationAccount>,
}

/// One page of `GET /user/installations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInstallationsPage {
    #[serde(default)]
    pub total_count: u64,
    pub installations: Vec<Installation>,
}

/// Exchange the App credential for an installation access token.
///
/// `app_api` must be authorized with the App JWT.
///
/// # Errors
///
/// Returns `ApiError::InvalidResponse` if the response has no string `token`,
/// or the underlying request error.
#[instrument(skip(app_api), fields(installation_id = %installation_id))]
pub async fn request_installation_token(
    app_api: &ApiClient,
    installation_id: InstallationId,
) -> Result<String, ApiError> {
    let path = format!("installations/{}/access_tokens", installation_id);
    let response: serde_json::Value = app_api.post(&path, None).await?;

    match response.get("token").and_then(|token| token.as_str()) {
        Some(token) => {
            debug!("Installation access token issued");
            Ok(token.to_string())
        }
        None => Err(ApiError::InvalidResponse {
            message: "installation token response has no token".to_string(),
        }),
    }
}

/// List the IDs of every App installation the authenticated user can access.
///
/// Reads at most `max_pages` pages of `GET /user/installations`.
///
/// # Errors
///
/// Returns the first request or pagination error.
#[instrument(skip(user_api))]
pub async fn user_installation_ids(
    user_api: &ApiClient,
    max_pages: usize,
) -> Result<Vec<InstallationId>, ApiError> {
    let mut ids = Vec::new();
    let mut pages = 0usize;

    let result = for_each_page(
        user_api,
        ApiRequest::get("user/installations"),
        |page: UserInstallationsPage| {
            pages += 1;
            ids.extend(page.installations.iter().map(|installation| installation.id));
            let exhausted = pages >= max_pages;
            async move {
                if exhausted {
                    Err(PageLimit::Reached)
                } else {
                    Ok(())
                }
            }
        },
    )
    .await;

    match result {
        Ok(()) | Err(PageLimit::Reached) => Ok(ids),
        Err(PageLimit::Api(e)) => Err(e),
    }
}

/// Stops traversal once enough pages have been read.
enum PageLimit {
    Reached,
    Api(ApiError),
}

impl From<ApiError> for PageLimit {
    fn from(e: ApiError) -> Self {
        PageLimit::Api(e)
    }
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod tests;
