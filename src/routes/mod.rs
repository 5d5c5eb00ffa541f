//! HTTP routes for rules-api

pub mod categories;
pub mod health;
pub mod update_category;

pub use categories::handle_list_categories;
pub use health::{health_check, version_info};
pub use update_category::handle_update_category;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;

use crate::auth::{bearer_token, branch_from_headers};
use crate::cms::RequestContext;
use crate::server::AppState;
use crate::types::{Result, RulesError};

/// Error body
#[derive(Debug, Serialize)]
struct ApiError<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(data).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-store")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| internal_fallback())
}

fn error_response(status: StatusCode, error: &str, details: Option<&str>) -> Response<Full<Bytes>> {
    json_response(status, &ApiError { error, details })
}

fn internal_fallback() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(r#"{"error":"Internal error"}"#)));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

fn rules_error_response(err: &RulesError) -> Response<Full<Bytes>> {
    error_response(err.status_code(), &err.to_string(), None)
}

/// Credentials and branch for a request
///
/// Fails with `Unauthorized` when no token is available outside development
/// mode. In development a missing bearer token falls back to the configured
/// token.
fn request_context(state: &AppState, headers: &HeaderMap) -> Result<RequestContext> {
    let token = match bearer_token(headers) {
        Some(token) => Some(token),
        None if state.args.dev_mode() => state.args.cms_token.clone(),
        None => return Err(RulesError::Unauthorized("missing bearer token".to_string())),
    };
    let branch = branch_from_headers(headers).unwrap_or_else(|| state.args.default_branch.clone());
    Ok(RequestContext::new(token, branch))
}
