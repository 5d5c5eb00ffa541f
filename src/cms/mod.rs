//! CMS access
//!
//! The [`ContentStore`] trait is the seam between the synchronization logic
//! and the headless CMS. [`GraphqlContentStore`] talks to the real GraphQL
//! API; [`MemoryContentStore`] keeps documents in memory and records every
//! call, which the tests use to assert which queries were (not) issued.

pub mod graphql;
pub mod memory;
pub mod queries;

pub use graphql::GraphqlContentStore;
pub use memory::{MemoryContentStore, StoreCall};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::content::{CategoryDocument, CategoryPath, IndexItem, RulePath};
use crate::types::Result;

/// Per-request credentials and content branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Bearer token forwarded to the CMS
    pub token: Option<String>,
    /// Content branch (e.g. `main`, or a preview branch)
    pub branch: String,
}

impl RequestContext {
    pub fn new(token: Option<String>, branch: impl Into<String>) -> Self {
        Self {
            token,
            branch: branch.into(),
        }
    }
}

/// A rule as known to the CMS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSummary {
    pub uri: String,
    /// Document key in the rule collection, e.g. `foo/rule.mdx`
    pub relative_path: String,
    /// Categories the rule currently belongs to, in any form [`CategoryPath::resolve`] accepts
    pub categories: Vec<String>,
}

impl RuleSummary {
    pub fn rule_path(&self) -> RulePath {
        RulePath::from_relative_path(&self.relative_path)
    }
}

/// Entry of the category listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySummary {
    pub title: Option<String>,
    pub uri: Option<String>,
    /// Canonical path, e.g. `categories/general.mdx`
    pub path: String,
}

/// Operations the index synchronization needs from the CMS
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Identifier for logs
    fn id(&self) -> &str;

    /// Category index with every reference resolved by the CMS
    ///
    /// May fail, or return fewer items than the document holds, when a
    /// referenced rule file does not exist.
    async fn category_index(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
    ) -> Result<Vec<IndexItem>>;

    /// Full category document (all fields except a resolved index)
    async fn category_document(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
    ) -> Result<CategoryDocument>;

    /// Look up a rule by its uri
    async fn rule_by_uri(&self, ctx: &RequestContext, uri: &str) -> Result<Option<RuleSummary>>;

    /// Whether the rule's backing document exists
    async fn rule_exists(&self, ctx: &RequestContext, rule: &RulePath) -> Result<bool>;

    /// Replace a category document with the given params
    async fn update_category(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
        params: Value,
    ) -> Result<()>;

    /// All categories of the branch
    async fn list_categories(&self, ctx: &RequestContext) -> Result<Vec<CategorySummary>>;
}
