//! Set-Cookie construction and Cookie header parsing.

use axum::http::{header::COOKIE, HeaderMap};

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Attributes applied to a cookie.
///
/// `Lax` is the default because both login cookies must survive the top-level
/// redirect back from GitHub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// Lifetime in seconds; a session cookie when `None`.
    pub max_age: Option<u64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            max_age: None,
        }
    }
}

impl CookieOptions {
    pub fn with_max_age(mut self, max_age: Option<u64>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

/// Build a `Set-Cookie` value. The value is percent-encoded.
///
/// ```
/// use edu_bot_api::cookie::{build_set_cookie, CookieOptions};
///
/// let header = build_set_cookie("AUTH_REDIRECT", "/a b", &CookieOptions::default().with_max_age(Some(600)));
/// assert_eq!(header, "AUTH_REDIRECT=%2Fa%20b; Path=/; Max-Age=600; HttpOnly; Secure; SameSite=Lax");
/// ```
pub fn build_set_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{}={}", name, urlencoding::encode(value));
    push_attributes(&mut cookie, options, options.max_age);
    cookie
}

/// Build a `Set-Cookie` value that deletes the cookie.
pub fn build_clear_cookie(name: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{}=", name);
    push_attributes(&mut cookie, options, Some(0));
    cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    cookie
}

fn push_attributes(cookie: &mut String, options: &CookieOptions, max_age: Option<u64>) {
    cookie.push_str("; Path=");
    cookie.push_str(&options.path);
    if let Some(max_age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie.push_str("; SameSite=");
    cookie.push_str(options.same_site.as_str());
}

/// Read and percent-decode cookie `name` from the request's `Cookie` headers.
///
/// Empty values count as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
        .map(|value| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

#[cfg(test)]
#[path = "cookie_tests.rs"]
mod tests;
