//! In-memory content store
//!
//! Holds category documents and rules in memory and records every call.
//! The category index query behaves like the CMS: references to rules it
//! does not know are dropped, and individual categories can be set up to
//! fail their index query or their mutation.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{CategorySummary, ContentStore, RequestContext, RuleSummary};
use crate::content::{CategoryDocument, CategoryPath, IndexItem, RulePath};
use crate::types::{Result, RulesError};

/// A call made against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    CategoryIndex(String),
    CategoryDocument(String),
    RuleByUri(String),
    RuleExists(String),
    UpdateCategory(String),
    ListCategories(String),
}

/// Mock content store for tests and local runs
#[derive(Default)]
pub struct MemoryContentStore {
    /// Canonical category path -> document
    categories: DashMap<String, CategoryDocument>,
    /// Rule uri -> summary
    rules: DashMap<String, RuleSummary>,
    failing_index_queries: Mutex<HashSet<String>>,
    failing_mutations: Mutex<HashSet<String>>,
    /// Rule paths whose existence query errors
    failing_existence_queries: Mutex<HashSet<String>>,
    /// Rule paths known by uri but without a document
    missing_rule_files: Mutex<HashSet<String>>,
    calls: Mutex<Vec<StoreCall>>,
    mutations: Mutex<Vec<(String, Value)>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a category document
    pub fn with_category(self, category: &str, document: CategoryDocument) -> Self {
        self.categories
            .insert(CategoryPath::resolve(category).canonical(), document);
        self
    }

    /// Register a rule at `{uri}/rule.mdx` belonging to the given categories
    pub fn with_rule(self, uri: &str, categories: &[&str]) -> Self {
        let summary = RuleSummary {
            uri: uri.to_string(),
            relative_path: RulePath::from_uri(uri).document_path(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        };
        self.rules.insert(uri.to_string(), summary);
        self
    }

    /// Make the validating index query for a category fail
    pub fn fail_index_query(self, category: &str) -> Self {
        if let Ok(mut failing) = self.failing_index_queries.lock() {
            failing.insert(CategoryPath::resolve(category).canonical());
        }
        self
    }

    /// Make mutations of a category fail
    pub fn fail_mutation(self, category: &str) -> Self {
        if let Ok(mut failing) = self.failing_mutations.lock() {
            failing.insert(CategoryPath::resolve(category).canonical());
        }
        self
    }

    /// Make the existence query for a rule fail
    pub fn fail_existence_query(self, uri: &str) -> Self {
        if let Ok(mut failing) = self.failing_existence_queries.lock() {
            failing.insert(RulePath::from_uri(uri).as_str().to_string());
        }
        self
    }

    /// Report a rule as not existing, even if registered with [`Self::with_rule`]
    pub fn without_rule_file(self, uri: &str) -> Self {
        if let Ok(mut missing) = self.missing_rule_files.lock() {
            missing.insert(RulePath::from_uri(uri).as_str().to_string());
        }
        self
    }

    /// Current document of a category
    pub fn category(&self, category: &str) -> Option<CategoryDocument> {
        self.categories
            .get(&CategoryPath::resolve(category).canonical())
            .map(|doc| doc.clone())
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Mutation payloads sent so far: (canonical category path, params)
    pub fn mutations(&self) -> Vec<(String, Value)> {
        self.mutations.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations().len()
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn is_failing(set: &Mutex<HashSet<String>>, key: &str) -> bool {
        set.lock().map(|s| s.contains(key)).unwrap_or(false)
    }

    fn known_rule(&self, path: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.rule_path().as_str() == path)
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn category_index(
        &self,
        _ctx: &RequestContext,
        category: &CategoryPath,
    ) -> Result<Vec<IndexItem>> {
        let key = category.canonical();
        self.record(StoreCall::CategoryIndex(key.clone()));

        if Self::is_failing(&self.failing_index_queries, &key) {
            return Err(RulesError::Graphql(vec![format!(
                "Unable to resolve index of {}",
                key
            )]));
        }

        let document = self
            .categories
            .get(&key)
            .map(|doc| doc.clone())
            .ok_or_else(|| RulesError::NotFound(key.clone()))?;

        Ok(document
            .index
            .into_iter()
            .filter(|item| {
                item.resolved_path()
                    .is_some_and(|path| self.known_rule(&path))
            })
            .collect())
    }

    async fn category_document(
        &self,
        _ctx: &RequestContext,
        category: &CategoryPath,
    ) -> Result<CategoryDocument> {
        let key = category.canonical();
        self.record(StoreCall::CategoryDocument(key.clone()));

        self.categories
            .get(&key)
            .map(|doc| doc.clone())
            .ok_or(RulesError::NotFound(key))
    }

    async fn rule_by_uri(&self, _ctx: &RequestContext, uri: &str) -> Result<Option<RuleSummary>> {
        self.record(StoreCall::RuleByUri(uri.to_string()));
        Ok(self.rules.get(uri).map(|rule| rule.clone()))
    }

    async fn rule_exists(&self, _ctx: &RequestContext, rule: &RulePath) -> Result<bool> {
        self.record(StoreCall::RuleExists(rule.as_str().to_string()));

        if Self::is_failing(&self.failing_existence_queries, rule.as_str()) {
            return Err(RulesError::Graphql(vec![format!(
                "Unable to query rule {}",
                rule
            )]));
        }
        if Self::is_failing(&self.missing_rule_files, rule.as_str()) {
            return Ok(false);
        }
        Ok(self.known_rule(rule.as_str()))
    }

    async fn update_category(
        &self,
        _ctx: &RequestContext,
        category: &CategoryPath,
        params: Value,
    ) -> Result<()> {
        let key = category.canonical();
        self.record(StoreCall::UpdateCategory(key.clone()));

        if Self::is_failing(&self.failing_mutations, &key) {
            return Err(RulesError::Graphql(vec![format!("Mutation of {} rejected", key)]));
        }

        let document: CategoryDocument = serde_json::from_value(params.clone())?;
        self.categories.insert(key.clone(), document);
        if let Ok(mut mutations) = self.mutations.lock() {
            mutations.push((key, params));
        }
        Ok(())
    }

    async fn list_categories(&self, ctx: &RequestContext) -> Result<Vec<CategorySummary>> {
        self.record(StoreCall::ListCategories(ctx.branch.clone()));

        let mut categories: Vec<CategorySummary> = self
            .categories
            .iter()
            .map(|entry| CategorySummary {
                title: entry.value().title.clone(),
                uri: entry.value().uri.clone(),
                path: entry.key().clone(),
            })
            .collect();
        categories.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(None, "main")
    }

    #[tokio::test]
    async fn test_index_query_drops_unknown_rules() {
        let store = MemoryContentStore::new()
            .with_rule("known", &["general"])
            .with_category(
                "general",
                CategoryDocument {
                    index: vec![
                        IndexItem::for_rule(&RulePath::from_uri("known")),
                        IndexItem::for_rule(&RulePath::from_uri("pending")),
                    ],
                    ..Default::default()
                },
            );

        let items = store
            .category_index(&ctx(), &CategoryPath::resolve("general"))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            store.calls(),
            vec![StoreCall::CategoryIndex("categories/general.mdx".into())]
        );
    }

    #[tokio::test]
    async fn test_failing_mutation() {
        let store = MemoryContentStore::new()
            .with_category("general", CategoryDocument::default())
            .fail_mutation("general");

        let result = store
            .update_category(&ctx(), &CategoryPath::resolve("general"), serde_json::json!({}))
            .await;
        assert!(result.is_err());
        assert_eq!(store.mutation_count(), 0);
    }
}
