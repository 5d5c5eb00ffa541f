//! GET /api/categories
//!
//! Category listing for the request's branch, served from the listing
//! cache. Entries revalidate after the configured interval and are dropped
//! whenever an index mutation lands on the same branch.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{ETAG, IF_NONE_MATCH};
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use super::{error_response, request_context, rules_error_response};
use crate::cache::{CacheEntry, CacheKey};
use crate::cms::CategorySummary;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct CategoryListing<'a> {
    pub branch: &'a str,
    pub categories: &'a [CategorySummary],
}

pub async fn handle_list_categories(state: &AppState, headers: &HeaderMap) -> Response<Full<Bytes>> {
    let ctx = match request_context(state, headers) {
        Ok(ctx) => ctx,
        Err(e) => return rules_error_response(&e),
    };

    let key = CacheKey::category_listing(&ctx.branch);
    let entry = match state.cache.get(&key) {
        Some(entry) => entry,
        None => {
            let categories = match state.store.list_categories(&ctx).await {
                Ok(categories) => categories,
                Err(e) => {
                    error!(branch = %ctx.branch, error = %e, "Category listing failed");
                    return error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error",
                        Some(&e.to_string()),
                    );
                }
            };
            debug!(branch = %ctx.branch, count = categories.len(), "Fetched category listing");

            let listing = CategoryListing {
                branch: &ctx.branch,
                categories: &categories,
            };
            let body = serde_json::to_vec(&listing).unwrap_or_default();
            state.cache.set(&key, body)
        }
    };

    if if_none_match(headers, &entry.etag) {
        return not_modified_response(&entry);
    }
    cached_response(&entry)
}

/// Whether `If-None-Match` lists the entry's ETag
fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == "*" || candidate == etag)
        })
        .unwrap_or(false)
}

fn cached_response(entry: &CacheEntry) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header(ETAG, &entry.etag)
        .header("Cache-Control", format!("private, max-age={}", entry.remaining_ttl_secs()))
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(entry.data.clone())))
        .unwrap()
}

fn not_modified_response(entry: &CacheEntry) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(ETAG, &entry.etag)
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_if_none_match() {
        let mut headers = HeaderMap::new();
        assert!(!if_none_match(&headers, "\"abc\""));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"x\", \"abc\""));
        assert!(if_none_match(&headers, "\"abc\""));
        assert!(!if_none_match(&headers, "\"def\""));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(if_none_match(&headers, "\"def\""));
    }
}
