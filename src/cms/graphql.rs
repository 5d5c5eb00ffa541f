//! GraphQL-backed content store
//!
//! Every call is a POST of `{ query, variables }` to the CMS endpoint with
//! the caller's bearer token and an `x-branch` header. When the endpoint
//! template contains `{branch}` it is substituted as well, which is how
//! hosted CMS URLs select a branch.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::queries;
use super::{CategorySummary, ContentStore, RequestContext, RuleSummary};
use crate::content::{CategoryDocument, CategoryPath, IndexItem, RulePath, SysInfo};
use crate::types::{Result, RulesError};

const BRANCH_PLACEHOLDER: &str = "{branch}";

/// Upper bound on pages fetched from a connection
const MAX_PAGES: usize = 200;

/// Configuration for the GraphQL client
#[derive(Debug, Clone)]
pub struct GraphqlConfig {
    /// Endpoint URL, optionally containing `{branch}`
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4001/graphql".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Deserialize)]
struct CategoryData<T> {
    category: Option<T>,
}

#[derive(Deserialize)]
struct IndexHolder {
    #[serde(default)]
    index: Option<Vec<IndexItem>>,
}

#[derive(Deserialize)]
struct RuleData {
    rule: Option<Value>,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage", default)]
    has_next_page: bool,
    #[serde(rename = "endCursor")]
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Edge<T> {
    node: Option<T>,
}

#[derive(Deserialize)]
struct Connection<T> {
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
    // A plain `default` would require `T: Default`
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

#[derive(Deserialize)]
struct RuleConnectionData {
    #[serde(rename = "ruleConnection")]
    rule_connection: Connection<RuleNode>,
}

#[derive(Deserialize)]
struct RuleNode {
    uri: Option<String>,
    #[serde(rename = "_sys")]
    sys: SysInfo,
    #[serde(default)]
    categories: Option<Vec<RuleCategoryEntry>>,
}

#[derive(Deserialize)]
struct RuleCategoryEntry {
    category: Option<CategoryRef>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoryRef {
    Path(String),
    Resolved {
        #[serde(rename = "_sys")]
        sys: SysInfo,
    },
}

impl CategoryRef {
    fn into_path(self) -> String {
        match self {
            Self::Path(path) => path,
            Self::Resolved { sys } => sys.relative_path,
        }
    }
}

#[derive(Deserialize)]
struct CategoryListData {
    #[serde(rename = "categoryConnection")]
    category_connection: Connection<CategoryNode>,
}

#[derive(Deserialize)]
struct CategoryNode {
    title: Option<String>,
    uri: Option<String>,
    #[serde(rename = "_sys")]
    sys: SysInfo,
}

/// Content store backed by the CMS GraphQL API
pub struct GraphqlContentStore {
    client: reqwest::Client,
    config: GraphqlConfig,
}

impl GraphqlContentStore {
    pub fn new(config: GraphqlConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("rules-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    /// Endpoint for a branch
    pub fn endpoint_for(&self, branch: &str) -> String {
        self.config
            .endpoint
            .replace(BRANCH_PLACEHOLDER, &urlencoding::encode(branch))
    }

    /// Execute a query and decode its `data`
    async fn execute<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        let url = self.endpoint_for(&ctx.branch);
        let mut request = self
            .client
            .post(&url)
            .header("x-branch", &ctx.branch)
            .json(&GraphqlRequest { query, variables });
        if let Some(token) = &ctx.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RulesError::Cms(format!("{} returned {}: {}", url, status, text)));
        }

        let body: GraphqlResponse<T> = response.json().await?;
        if !body.errors.is_empty() {
            return Err(RulesError::Graphql(
                body.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        body.data
            .ok_or_else(|| RulesError::Graphql(vec!["response contained no data".to_string()]))
    }
}

#[async_trait]
impl ContentStore for GraphqlContentStore {
    fn id(&self) -> &str {
        &self.config.endpoint
    }

    async fn category_index(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
    ) -> Result<Vec<IndexItem>> {
        let data: CategoryData<IndexHolder> = self
            .execute(
                ctx,
                queries::CATEGORY_INDEX,
                json!({ "relativePath": category.relative_path() }),
            )
            .await?;

        let holder = data
            .category
            .ok_or_else(|| RulesError::NotFound(category.canonical()))?;
        let items = holder.index.unwrap_or_default();
        let total = items.len();

        // Dangling references come back as `{ rule: null }`
        let resolved: Vec<IndexItem> = items
            .into_iter()
            .filter(|item| item.resolved_path().is_some())
            .collect();
        if resolved.len() < total {
            debug!(
                category = %category,
                dropped = total - resolved.len(),
                "GraphQL index contained unresolved references"
            );
        }
        Ok(resolved)
    }

    async fn category_document(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
    ) -> Result<CategoryDocument> {
        let data: CategoryData<CategoryDocument> = self
            .execute(
                ctx,
                queries::CATEGORY_DOCUMENT,
                json!({ "relativePath": category.relative_path() }),
            )
            .await?;

        data.category
            .ok_or_else(|| RulesError::NotFound(category.canonical()))
    }

    async fn rule_by_uri(&self, ctx: &RequestContext, uri: &str) -> Result<Option<RuleSummary>> {
        let data: RuleConnectionData = self
            .execute(ctx, queries::RULE_BY_URI, json!({ "uri": uri }))
            .await?;

        let node = data
            .rule_connection
            .edges
            .into_iter()
            .find_map(|edge| edge.node);

        Ok(node.map(|node| RuleSummary {
            uri: node.uri.unwrap_or_else(|| uri.to_string()),
            relative_path: node.sys.relative_path,
            categories: node
                .categories
                .unwrap_or_default()
                .into_iter()
                .filter_map(|entry| entry.category.map(CategoryRef::into_path))
                .collect(),
        }))
    }

    async fn rule_exists(&self, ctx: &RequestContext, rule: &RulePath) -> Result<bool> {
        let data: RuleData = self
            .execute(
                ctx,
                queries::RULE_EXISTS,
                json!({ "relativePath": rule.document_path() }),
            )
            .await?;

        Ok(data.rule.is_some_and(|r| !r.is_null()))
    }

    async fn update_category(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
        params: Value,
    ) -> Result<()> {
        let _: Value = self
            .execute(
                ctx,
                queries::UPDATE_CATEGORY,
                json!({
                    "relativePath": category.relative_path(),
                    "params": { "category": params },
                }),
            )
            .await?;
        Ok(())
    }

    async fn list_categories(&self, ctx: &RequestContext) -> Result<Vec<CategorySummary>> {
        let mut categories = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let data: CategoryListData = self
                .execute(
                    ctx,
                    queries::CATEGORY_LIST,
                    json!({ "first": queries::PAGE_SIZE, "after": after }),
                )
                .await?;

            let connection = data.category_connection;
            categories.extend(connection.edges.into_iter().filter_map(|e| e.node).map(|node| {
                CategorySummary {
                    title: node.title,
                    uri: node.uri,
                    path: CategoryPath::resolve(&node.sys.relative_path).canonical(),
                }
            }));

            match connection.page_info {
                Some(PageInfo {
                    has_next_page: true,
                    end_cursor: Some(cursor),
                }) if after.as_deref() != Some(cursor.as_str()) => after = Some(cursor),
                _ => return Ok(categories),
            }
        }

        warn!(pages = MAX_PAGES, "Category listing stopped at page limit");
        Ok(categories)
    }
}
