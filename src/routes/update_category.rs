//! POST /api/update-category
//!
//! Body:
//!
//! ```json
//! { "categories": ["azure-devops/branch-policies"], "ruleUri": "foo", "formType": "update" }
//! ```
//!
//! Category entries may also be objects of the form `{ "category": "..." }`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, Response, StatusCode};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{error_response, json_response, request_context, rules_error_response};
use crate::content::CategoryPath;
use crate::server::AppState;
use crate::services::{FormType, SyncRequest};
use crate::types::RulesError;

pub const INVALID_FORMAT_MESSAGE: &str = "Invalid data format: expected { categories: string[], ruleUri: string, formType?: \"create\" | \"update\" }";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryInput {
    Path(String),
    Entry { category: String },
}

impl CategoryInput {
    fn as_str(&self) -> &str {
        match self {
            Self::Path(path) | Self::Entry { category: path } => path,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateCategoryBody {
    categories: Vec<CategoryInput>,
    rule_uri: String,
    #[serde(default)]
    form_type: Option<String>,
}

/// Parse and validate a request body
pub fn parse_request(body: &[u8]) -> Result<SyncRequest, RulesError> {
    let parsed: UpdateCategoryBody = serde_json::from_slice(body)
        .map_err(|_| RulesError::BadRequest(INVALID_FORMAT_MESSAGE.to_string()))?;

    let rule_uri = parsed.rule_uri.trim();
    if rule_uri.is_empty() {
        return Err(RulesError::BadRequest(INVALID_FORMAT_MESSAGE.to_string()));
    }

    let categories = parsed
        .categories
        .iter()
        .map(CategoryInput::as_str)
        .filter(|c| !c.trim().is_empty())
        .map(CategoryPath::resolve)
        .filter(|c| !c.is_empty())
        .collect();

    Ok(SyncRequest {
        categories,
        rule_uri: rule_uri.to_string(),
        form_type: FormType::from_form(parsed.form_type.as_deref()),
    })
}

pub async fn handle_update_category(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected update-category request");
            return error_response(StatusCode::BAD_REQUEST, INVALID_FORMAT_MESSAGE, None);
        }
    };

    let ctx = match request_context(state, headers) {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(rule = %request.rule_uri, error = %e, "Rejected update-category request");
            return rules_error_response(&e);
        }
    };

    let rule_uri = request.rule_uri.clone();
    match state.sync.sync(&ctx, request).await {
        Ok(report) => {
            info!(
                rule = %rule_uri,
                added = report.added.len(),
                deleted = report.deleted.len(),
                unchanged = report.unchanged.len(),
                failed = report.failed.len(),
                "Category update complete"
            );
            json_response(StatusCode::OK, &report)
        }
        Err(RulesError::NotFound(_)) => {
            warn!(rule = %rule_uri, branch = %ctx.branch, "Rule not found");
            error_response(StatusCode::NOT_FOUND, "Rule not found", Some(&rule_uri))
        }
        Err(e) => {
            error!(rule = %rule_uri, error = %e, "Category update failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(&e.to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_category_forms() {
        let body = br#"{
            "categories": ["general", {"category": "categories/azure-devops/branch-policies.mdx"}, "  "],
            "ruleUri": " foo ",
            "formType": "create"
        }"#;
        let request = parse_request(body).unwrap();
        assert_eq!(request.rule_uri, "foo");
        assert_eq!(request.form_type, FormType::Create);
        assert_eq!(
            request.categories,
            vec![
                CategoryPath::resolve("general"),
                CategoryPath::resolve("azure-devops/branch-policies")
            ]
        );
    }

    #[test]
    fn test_parse_defaults_to_update() {
        let request = parse_request(br#"{"categories": [], "ruleUri": "foo"}"#).unwrap();
        assert_eq!(request.form_type, FormType::Update);
        assert!(request.categories.is_empty());
    }

    #[test]
    fn test_parse_rejects_invalid_bodies() {
        for body in [
            &br#"{}"#[..],
            br#"{"categories": "general", "ruleUri": "foo"}"#,
            br#"{"categories": [], "ruleUri": ""}"#,
            br#"{"categories": [1], "ruleUri": "foo"}"#,
            br#"not json"#,
        ] {
            assert!(matches!(parse_request(body), Err(RulesError::BadRequest(_))));
        }
    }
}
