//! Link-header pagination.
//!
//! GitHub list endpoints return the URL of the following page in the `Link`
//! response header (RFC 8288). [`for_each_page`] walks that chain, handing each
//! decoded page body to an async handler before fetching the next one.
//!
//! Only links under the client's own base URL are followed. A `next` link that
//! points anywhere else would carry the client's `Authorization` header to a
//! foreign host, so traversal stops with [`ApiError::UntrustedNextPage`]
//! instead of issuing the request.

use std::future::Future;

use reqwest::header::LINK;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{error_for_status, ApiClient, ApiRequest};
use crate::error::ApiError;

/// Relation targets parsed from a `Link` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    /// URL of the next page
    pub next: Option<String>,
    /// URL of the previous page
    pub prev: Option<String>,
    /// URL of the first page
    pub first: Option<String>,
    /// URL of the last page
    pub last: Option<String>,
}

/// One decoded page and the link to the page after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Decoded response body
    pub body: T,
    /// URL of the next page, if any
    pub next: Option<String>,
}

/// Parse a `Link` header into its `next`/`prev`/`first`/`last` targets.
///
/// Unknown relations and malformed entries are skipped. A `rel` parameter may
/// carry several space-separated relation types.
///
/// # Examples
///
/// ```
/// use edu_bot_github::client::parse_link_header;
///
/// let links = parse_link_header(Some(
///     r#"<https://api.github.com/user/installations?page=2>; rel="next", <https://api.github.com/user/installations?page=5>; rel="last""#,
/// ));
/// assert_eq!(links.next.as_deref(), Some("https://api.github.com/user/installations?page=2"));
/// assert_eq!(links.last.as_deref(), Some("https://api.github.com/user/installations?page=5"));
/// assert!(links.prev.is_none());
/// ```
pub fn parse_link_header(header: Option<&str>) -> Links {
    let mut links = Links::default();
    let Some(mut rest) = header else {
        return links;
    };

    while let Some(start) = rest.find('<') {
        let after_open = &rest[start + 1..];
        let Some(end) = after_open.find('>') else {
            break;
        };
        let uri = after_open[..end].trim();
        let tail = &after_open[end + 1..];
        let params_end = tail.find('<').unwrap_or(tail.len());

        for param in tail[..params_end].split(';') {
            let param = param.trim().trim_end_matches(',').trim();
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            if !name.trim().eq_ignore_ascii_case("rel") {
                continue;
            }

            for rel in value.trim().trim_matches('"').split_whitespace() {
                let slot = match rel.to_ascii_lowercase().as_str() {
                    "next" => &mut links.next,
                    "prev" => &mut links.prev,
                    "first" => &mut links.first,
                    "last" => &mut links.last,
                    _ => continue,
                };
                if slot.is_none() {
                    *slot = Some(uri.to_string());
                }
            }
        }

        rest = &tail[params_end..];
    }

    links
}

/// Fetch one page and decode its body.
///
/// # Errors
///
/// Returns `ApiError` on transport failure, a non-2xx status or a body that
/// does not decode as `T`.
pub async fn fetch_page<T: DeserializeOwned>(
    client: &ApiClient,
    request: &ApiRequest,
) -> Result<Page<T>, ApiError> {
    let response = client.send(request).await?;
    let response = error_for_status(response).await?;

    let link_header = response
        .headers()
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let links = parse_link_header(link_header.as_deref());

    let bytes = response.bytes().await?;
    let body = serde_json::from_slice(&bytes)?;

    Ok(Page {
        body,
        next: links.next,
    })
}

/// Call `handler` with every page of a paginated endpoint, in order.
///
/// The handler's future is awaited to completion before the next page is
/// requested, so handlers see pages strictly sequentially. Traversal ends when
/// a page carries no `next` link or when the handler returns an error.
///
/// # Errors
///
/// - The first handler error, unchanged.
/// - `ApiError::UntrustedNextPage` (converted into `E`) when a `next` link does
///   not start with the client's base URL. No request is made to that link.
/// - Any request failure, converted into `E`.
///
/// # Examples
///
/// ```no_run
/// # use edu_bot_github::client::{for_each_page, ApiClient, ApiRequest, UserInstallationsPage};
/// # use edu_bot_github::ApiError;
/// # async fn example(api: &ApiClient) -> Result<(), ApiError> {
/// let mut ids = Vec::new();
/// for_each_page(api, ApiRequest::get("user/installations"), |page: UserInstallationsPage| {
///     ids.extend(page.installations.iter().map(|i| i.id));
///     async { Ok::<(), ApiError>(()) }
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn for_each_page<T, F, Fut, E>(
    client: &ApiClient,
    request: ApiRequest,
    mut handler: F,
) -> Result<(), E>
where
    T: DeserializeOwned,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: From<ApiError>,
{
    let mut request = request;
    let mut page_number = 1usize;

    loop {
        let page: Page<T> = fetch_page(client, &request).await?;
        handler(page.body).await?;

        let Some(next) = page.next else {
            debug!(pages = page_number, "Pagination finished");
            return Ok(());
        };

        request = next_page_request(client, &next)?;
        page_number += 1;
        debug!(page = page_number, path = %request.path, "Following next page link");
    }
}

/// Build the GET request for a `next` link, refusing links outside the base URL.
fn next_page_request(client: &ApiClient, next: &str) -> Result<ApiRequest, ApiError> {
    let base = client.base_url().as_str();
    let Some(relative) = next.strip_prefix(base) else {
        return Err(ApiError::UntrustedNextPage {
            url: next.to_string(),
        });
    };

    // Dot segments can climb out of the base path once resolved.
    let resolved = client.url_for(relative)?;
    if !resolved.as_str().starts_with(base) {
        return Err(ApiError::UntrustedNextPage {
            url: next.to_string(),
        });
    }

    Ok(ApiRequest::get(relative))
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
