//! Request credentials
//!
//! The service does not validate tokens itself. The bearer token is taken
//! from the `Authorization` header and forwarded to the CMS, which is the
//! authority. The content branch travels in a cookie set by the editor UI.

use hyper::header::{AUTHORIZATION, COOKIE};
use hyper::HeaderMap;

/// Cookie carrying the editor's content branch
pub const BRANCH_COOKIE: &str = "x-branch";

/// Extract the token from a `Bearer <token>` header value
pub fn extract_bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.trim().strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok();
    extract_bearer_token(header).map(str::to_string)
}

/// Value of a cookie in a `Cookie` header, URL-decoded
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| {
            let value = value.trim().trim_matches('"');
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|value| !value.is_empty())
}

/// Branch from the `x-branch` cookie across all `Cookie` headers
pub fn branch_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| cookie_value(header, BRANCH_COOKIE))
}
