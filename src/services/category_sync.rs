//! Category synchronization for rule submissions
//!
//! - **create**: the rule file does not exist yet. Every requested category
//!   is an add target, the rule path is built from the uri, and no
//!   existence query is ever issued.
//! - **update**: the rule is looked up, its current categories are split
//!   against the requested ones into adds, deletes and unchanged, and the
//!   add and delete batches run concurrently.
//!
//! Categories are processed independently; a failure in one is reported
//! and never aborts the others.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{TaggedCache, CATEGORIES_TAG};
use crate::cms::{ContentStore, RequestContext};
use crate::content::{CategoryPath, RulePath};
use crate::index::{IndexAction, IndexMutator, MutationOutcome};
use crate::types::{Result, RulesError};

/// Submission workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Create,
    Update,
}

impl FormType {
    /// `"create"` selects create; anything else, or nothing, selects update
    pub fn from_form(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("create") => Self::Create,
            _ => Self::Update,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub categories: Vec<CategoryPath>,
    pub rule_uri: String,
    pub form_type: FormType,
}

/// Processing state of one category within a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryState {
    Unprocessed,
    ExistenceChecked,
    ExistenceSkipped,
    MutationAttempted,
    Processed(MutationOutcome),
    Failed(String),
}

impl CategoryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Processed(_) | Self::Failed(_))
    }
}

/// Terminal result for one category
#[derive(Debug, Clone)]
pub struct CategoryResult {
    pub category: CategoryPath,
    pub action: IndexAction,
    pub state: CategoryState,
}

struct CategoryTask {
    category: CategoryPath,
    action: IndexAction,
    state: CategoryState,
}

impl CategoryTask {
    fn new(category: CategoryPath, action: IndexAction) -> Self {
        Self {
            category,
            action,
            state: CategoryState::Unprocessed,
        }
    }

    fn transition(&mut self, next: CategoryState) {
        debug!(
            category = %self.category,
            action = %self.action,
            from = ?self.state,
            to = ?next,
            "Category state"
        );
        self.state = next;
    }

    fn finish(self) -> CategoryResult {
        debug_assert!(self.state.is_terminal(), "unfinished category {:?}", self.state);
        CategoryResult {
            category: self.category,
            action: self.action,
            state: self.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCategory {
    pub category: String,
    pub error: String,
}

/// Outcome of a submission, serialized as the endpoint's response body
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(rename = "AddedCategories")]
    pub added: Vec<String>,
    #[serde(rename = "DeletedCategories")]
    pub deleted: Vec<String>,
    #[serde(rename = "NoChangedCategories")]
    pub unchanged: Vec<String>,
    #[serde(rename = "FailedCategories", skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedCategory>,
}

impl SyncReport {
    fn new(uri: &str, message: String) -> Self {
        Self {
            success: true,
            message,
            uri: uri.to_string(),
            added: Vec::new(),
            deleted: Vec::new(),
            unchanged: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn record(&mut self, result: CategoryResult) {
        let path = result.category.canonical();
        match result.state {
            CategoryState::Processed(_) => match result.action {
                IndexAction::Add => self.added.push(path),
                IndexAction::Delete => self.deleted.push(path),
            },
            CategoryState::Failed(error) => {
                self.unchanged.push(path.clone());
                self.failed.push(FailedCategory {
                    category: path,
                    error,
                });
            }
            // process() always ends in a terminal state
            _ => self.unchanged.push(path),
        }
    }
}

/// Three-way split of current vs. requested categories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDiff {
    pub to_add: Vec<CategoryPath>,
    pub to_delete: Vec<CategoryPath>,
    pub no_change: Vec<CategoryPath>,
}

/// Split categories; adds follow request order, deletes follow current order
pub fn diff_categories(current: &[CategoryPath], requested: &[CategoryPath]) -> CategoryDiff {
    let current = dedup(current.to_vec());
    let requested = dedup(requested.to_vec());
    let current_set: HashSet<&CategoryPath> = current.iter().collect();
    let requested_set: HashSet<&CategoryPath> = requested.iter().collect();

    CategoryDiff {
        to_add: requested
            .iter()
            .filter(|c| !current_set.contains(c))
            .cloned()
            .collect(),
        to_delete: current
            .iter()
            .filter(|c| !requested_set.contains(c))
            .cloned()
            .collect(),
        no_change: requested
            .iter()
            .filter(|c| current_set.contains(c))
            .cloned()
            .collect(),
    }
}

/// Drop repeated and empty categories, keeping first occurrences
pub fn dedup(categories: Vec<CategoryPath>) -> Vec<CategoryPath> {
    let mut seen = HashSet::new();
    categories
        .into_iter()
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

/// Orchestrates index mutations for a rule submission
pub struct CategorySyncService {
    store: Arc<dyn ContentStore>,
    mutator: IndexMutator,
    cache: Arc<TaggedCache>,
}

impl CategorySyncService {
    pub fn new(store: Arc<dyn ContentStore>, mutator: IndexMutator, cache: Arc<TaggedCache>) -> Self {
        Self {
            store,
            mutator,
            cache,
        }
    }

    pub async fn sync(&self, ctx: &RequestContext, request: SyncRequest) -> Result<SyncReport> {
        info!(
            rule = %request.rule_uri,
            form_type = ?request.form_type,
            categories = request.categories.len(),
            branch = %ctx.branch,
            "Processing category update"
        );

        match request.form_type {
            FormType::Create => Ok(self.sync_created(ctx, request).await),
            FormType::Update => self.sync_updated(ctx, request).await,
        }
    }

    async fn sync_created(&self, ctx: &RequestContext, request: SyncRequest) -> SyncReport {
        // The rule file does not exist yet, so its path cannot be queried
        let rule = RulePath::from_uri(&request.rule_uri);
        let categories = dedup(request.categories);

        let results = join_all(
            categories
                .into_iter()
                .map(|category| self.process(ctx, category, &rule, IndexAction::Add, false)),
        )
        .await;

        let mut report = SyncReport::new(
            &request.rule_uri,
            format!("Categories updated for new rule {}", request.rule_uri),
        );
        for result in results {
            report.record(result);
        }
        report
    }

    async fn sync_updated(&self, ctx: &RequestContext, request: SyncRequest) -> Result<SyncReport> {
        let rule = self
            .store
            .rule_by_uri(ctx, &request.rule_uri)
            .await?
            .ok_or_else(|| RulesError::NotFound(format!("Rule not found: {}", request.rule_uri)))?;
        let rule_path = rule.rule_path();

        let current: Vec<CategoryPath> = rule
            .categories
            .iter()
            .map(|c| CategoryPath::resolve(c))
            .collect();
        let diff = diff_categories(&current, &request.categories);

        debug!(
            rule = %rule_path,
            to_add = diff.to_add.len(),
            to_delete = diff.to_delete.len(),
            no_change = diff.no_change.len(),
            "Category diff"
        );

        let adds = join_all(
            diff.to_add
                .into_iter()
                .map(|category| self.process(ctx, category, &rule_path, IndexAction::Add, true)),
        );
        let deletes = join_all(
            diff.to_delete
                .into_iter()
                .map(|category| self.process(ctx, category, &rule_path, IndexAction::Delete, false)),
        );
        let (added, deleted) = futures::join!(adds, deletes);

        let mut report = SyncReport::new(
            &request.rule_uri,
            format!("Categories updated for rule {}", request.rule_uri),
        );
        report.unchanged = diff.no_change.iter().map(CategoryPath::canonical).collect();
        for result in added.into_iter().chain(deleted) {
            report.record(result);
        }
        Ok(report)
    }

    async fn process(
        &self,
        ctx: &RequestContext,
        category: CategoryPath,
        rule: &RulePath,
        action: IndexAction,
        check_existence: bool,
    ) -> CategoryResult {
        let mut task = CategoryTask::new(category, action);

        if task.category.escapes_collection() {
            warn!(category = %task.category, "Rejected category path outside the collection");
            task.transition(CategoryState::Failed(format!(
                "Invalid category path: {}",
                task.category.slug()
            )));
            return task.finish();
        }

        if check_existence {
            match self.store.rule_exists(ctx, rule).await {
                Ok(true) => {
                    task.transition(CategoryState::ExistenceChecked);
                }
                Ok(false) => {
                    task.transition(CategoryState::Failed(format!("Rule {} does not exist", rule)));
                    return task.finish();
                }
                Err(e) => {
                    warn!(
                        category = %task.category,
                        rule = %rule,
                        error = %e,
                        "Existence check failed, proceeding without validation"
                    );
                    task.transition(CategoryState::ExistenceSkipped);
                }
            }
        } else {
            task.transition(CategoryState::ExistenceSkipped);
        }

        task.transition(CategoryState::MutationAttempted);
        let next = match self.mutator.apply(ctx, &task.category, rule, action).await {
            Ok(outcome) => {
                if matches!(outcome, MutationOutcome::Updated { .. }) {
                    self.cache.invalidate_tag(&ctx.branch, CATEGORIES_TAG);
                }
                CategoryState::Processed(outcome)
            }
            Err(e) => CategoryState::Failed(e.to_string()),
        };
        task.transition(next);
        task.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{MemoryContentStore, StoreCall};
    use crate::content::CategoryDocument;
    use crate::index::IndexReader;

    fn paths(slugs: &[&str]) -> Vec<CategoryPath> {
        slugs.iter().map(|s| CategoryPath::resolve(s)).collect()
    }

    #[test]
    fn test_form_type_parsing() {
        assert_eq!(FormType::from_form(Some("create")), FormType::Create);
        assert_eq!(FormType::from_form(Some("Create ")), FormType::Create);
        assert_eq!(FormType::from_form(Some("update")), FormType::Update);
        assert_eq!(FormType::from_form(Some("other")), FormType::Update);
        assert_eq!(FormType::from_form(None), FormType::Update);
    }

    #[test]
    fn test_diff_categories() {
        let current = paths(&["general", "azure-devops/pull-requests.mdx"]);
        let requested = paths(&["categories/azure-devops/pull-requests.mdx", "azure-devops/branch-policies"]);

        let diff = diff_categories(&current, &requested);
        assert_eq!(diff.to_add, paths(&["azure-devops/branch-policies"]));
        assert_eq!(diff.to_delete, paths(&["general"]));
        assert_eq!(diff.no_change, paths(&["azure-devops/pull-requests"]));
    }

    #[test]
    fn test_dedup_keeps_first_and_drops_empty() {
        let deduped = dedup(paths(&["b", "a", "b.mdx", "", "categories/a.mdx"]));
        assert_eq!(deduped, paths(&["b", "a"]));
    }

    #[test]
    fn test_terminal_states() {
        assert!(CategoryState::Failed("x".into()).is_terminal());
        assert!(CategoryState::Processed(MutationOutcome::Unchanged).is_terminal());
        assert!(!CategoryState::MutationAttempted.is_terminal());
    }

    fn service(store: Arc<MemoryContentStore>, root: &std::path::Path) -> CategorySyncService {
        let store: Arc<dyn ContentStore> = store;
        let reader = IndexReader::new(Arc::clone(&store), root);
        let mutator = IndexMutator::new(Arc::clone(&store), reader);
        CategorySyncService::new(store, mutator, Arc::new(TaggedCache::with_defaults()))
    }

    #[tokio::test]
    async fn test_update_checks_existence_for_adds_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryContentStore::new()
                .with_rule("foo", &["general"])
                .with_category("general", CategoryDocument::default())
                .with_category("testing", CategoryDocument::default()),
        );
        let service = service(Arc::clone(&store), dir.path());

        let report = service
            .sync(
                &RequestContext::new(None, "main"),
                SyncRequest {
                    categories: paths(&["testing"]),
                    rule_uri: "foo".into(),
                    form_type: FormType::Update,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.added, vec!["categories/testing.mdx"]);
        assert_eq!(report.deleted, vec!["categories/general.mdx"]);
        let existence_checks: Vec<_> = store
            .calls()
            .into_iter()
            .filter(|call| matches!(call, StoreCall::RuleExists(_)))
            .collect();
        assert_eq!(existence_checks, vec![StoreCall::RuleExists("foo/rule".into())]);
    }

    #[tokio::test]
    async fn test_missing_category_document_fails_only_that_category() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryContentStore::new().with_category("general", CategoryDocument::default()));
        let service = service(Arc::clone(&store), dir.path());

        let report = service
            .sync(
                &RequestContext::new(None, "main"),
                SyncRequest {
                    categories: paths(&["general", "missing"]),
                    rule_uri: "new-rule".into(),
                    form_type: FormType::Create,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.added, vec!["categories/general.mdx"]);
        assert_eq!(report.unchanged, vec!["categories/missing.mdx"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].category, "categories/missing.mdx");
    }

    fn update_request(categories: &[&str], uri: &str) -> SyncRequest {
        SyncRequest {
            categories: paths(categories),
            rule_uri: uri.into(),
            form_type: FormType::Update,
        }
    }

    #[tokio::test]
    async fn test_failed_existence_query_still_adds() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryContentStore::new()
                .with_rule("foo", &[])
                .with_category("testing", CategoryDocument::default())
                .fail_existence_query("foo"),
        );
        let service = service(Arc::clone(&store), dir.path());

        let report = service
            .sync(&RequestContext::new(None, "main"), update_request(&["testing"], "foo"))
            .await
            .unwrap();

        assert_eq!(report.added, vec!["categories/testing.mdx"]);
        assert!(report.failed.is_empty());
        assert!(store
            .calls()
            .contains(&StoreCall::UpdateCategory("categories/testing.mdx".into())));
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_rule_file_fails_the_add() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryContentStore::new()
                .with_rule("foo", &["general"])
                .with_category("general", CategoryDocument::default())
                .with_category("testing", CategoryDocument::default())
                .without_rule_file("foo"),
        );
        let service = service(Arc::clone(&store), dir.path());

        let report = service
            .sync(
                &RequestContext::new(None, "main"),
                update_request(&["general", "testing"], "foo"),
            )
            .await
            .unwrap();

        assert!(report.added.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].category, "categories/testing.mdx");
        assert_eq!(report.failed[0].error, "Rule foo/rule does not exist");
        assert_eq!(
            report.unchanged,
            vec!["categories/general.mdx", "categories/testing.mdx"]
        );
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_category_outside_collection_fails_without_io() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryContentStore::new().with_category("general", CategoryDocument::default()));
        let service = service(Arc::clone(&store), dir.path());

        let report = service
            .sync(
                &RequestContext::new(None, "main"),
                SyncRequest {
                    categories: paths(&["general", "../../outside"]),
                    rule_uri: "new-rule".into(),
                    form_type: FormType::Create,
                },
            )
            .await
            .unwrap();

        assert_eq!(report.added, vec!["categories/general.mdx"]);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.starts_with("Invalid category path"));
        assert!(store
            .calls()
            .iter()
            .all(|call| !format!("{call:?}").contains("outside")));
    }

    #[test]
    fn test_report_serialization_shape() {
        let mut report = SyncReport::new("foo", "done".into());
        report.added.push("categories/a.mdx".into());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["URI"], "foo");
        assert_eq!(value["AddedCategories"][0], "categories/a.mdx");
        assert!(value.get("FailedCategories").is_none());
        assert_eq!(value["NoChangedCategories"], serde_json::json!([]));
    }
}
