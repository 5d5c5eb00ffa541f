//! Index mutator
//!
//! Computes a category's new index for one rule and one action, then
//! persists it by replacing the whole category document. Untouched fields
//! are preserved by fetching the document first. One mutation per category
//! per action; no retries and no rollback.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use super::reader::IndexReader;
use crate::cms::{ContentStore, RequestContext};
use crate::content::{contains_rule, CategoryPath, IndexItem, RulePath};
use crate::types::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    Add,
    Delete,
}

impl fmt::Display for IndexAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Result of applying an action to an index in memory
#[derive(Debug, Clone, PartialEq)]
pub enum IndexChange {
    /// Nothing to persist
    Unchanged(Vec<IndexItem>),
    Changed(Vec<IndexItem>),
}

/// Apply an action to an index
///
/// Existing entries keep their original form and order. A new entry uses
/// the upload path string form.
pub fn compute_index(current: &[IndexItem], rule: &RulePath, action: IndexAction) -> IndexChange {
    match action {
        IndexAction::Add if contains_rule(current, rule) => IndexChange::Unchanged(current.to_vec()),
        IndexAction::Add => {
            let mut items = current.to_vec();
            items.push(IndexItem::for_rule(rule));
            IndexChange::Changed(items)
        }
        IndexAction::Delete => {
            let items: Vec<IndexItem> = current
                .iter()
                .filter(|item| !item.matches(rule))
                .cloned()
                .collect();
            if items.len() == current.len() {
                IndexChange::Unchanged(items)
            } else {
                IndexChange::Changed(items)
            }
        }
    }
}

/// What happened to one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Index already in the requested state; no mutation issued
    Unchanged,
    /// Mutation issued; carries the new index length
    Updated { entries: usize },
}

/// Reads, diffs and persists category indexes
#[derive(Clone)]
pub struct IndexMutator {
    reader: IndexReader,
    store: Arc<dyn ContentStore>,
}

impl IndexMutator {
    pub fn new(store: Arc<dyn ContentStore>, reader: IndexReader) -> Self {
        Self { reader, store }
    }

    /// Add or remove one rule in one category
    pub async fn apply(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
        rule: &RulePath,
        action: IndexAction,
    ) -> Result<MutationOutcome> {
        let current = self.reader.read(ctx, category).await;

        let items = match compute_index(&current.items, rule, action) {
            IndexChange::Unchanged(_) => {
                debug!(
                    category = %category,
                    rule = %rule,
                    action = %action,
                    "Index already up to date"
                );
                return Ok(MutationOutcome::Unchanged);
            }
            IndexChange::Changed(items) => items,
        };

        let document = self.store.category_document(ctx, category).await?;
        let params = document.mutation_params(&items);

        if let Err(e) = self.store.update_category(ctx, category, params).await {
            error!(
                category = %category,
                rule = %rule,
                action = %action,
                error = %e,
                "Category mutation failed"
            );
            return Err(e);
        }

        info!(
            category = %category,
            rule = %rule,
            action = %action,
            entries = items.len(),
            branch = %ctx.branch,
            "Category index updated"
        );
        Ok(MutationOutcome::Updated {
            entries: items.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{MemoryContentStore, StoreCall};
    use crate::content::{CategoryDocument, ResolvedRuleRef, RuleRef, SysInfo};

    fn resolved(relative_path: &str) -> IndexItem {
        IndexItem::Bare(RuleRef::Resolved(ResolvedRuleRef {
            sys: Some(SysInfo {
                relative_path: relative_path.to_string(),
            }),
            uri: None,
        }))
    }

    #[test]
    fn test_add_is_idempotent() {
        let rule = RulePath::from_uri("foo");
        let current = vec![resolved("foo/rule")];
        assert!(matches!(
            compute_index(&current, &rule, IndexAction::Add),
            IndexChange::Unchanged(_)
        ));
    }

    #[test]
    fn test_add_appends_upload_path_and_preserves_existing_forms() {
        let existing = IndexItem::Bare(RuleRef::RawPath("public/uploads/rules/a/rule".into()));
        let change = compute_index(
            &[existing.clone(), resolved("b/rule.mdx")],
            &RulePath::from_uri("c"),
            IndexAction::Add,
        );

        let IndexChange::Changed(items) = change else {
            panic!("expected change");
        };
        assert_eq!(items[0], existing);
        assert_eq!(items[1], resolved("b/rule.mdx"));
        assert_eq!(
            items[2],
            IndexItem::Entry {
                rule: RuleRef::RawPath("public/uploads/rules/c/rule.mdx".into())
            }
        );
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let current = vec![resolved("a/rule.mdx")];
        assert_eq!(
            compute_index(&current, &RulePath::from_uri("b"), IndexAction::Delete),
            IndexChange::Unchanged(current.clone())
        );
    }

    #[test]
    fn test_delete_matches_any_form() {
        let current = vec![
            IndexItem::Bare(RuleRef::RawPath("public/uploads/rules/foo/rule".into())),
            resolved("bar/rule.mdx"),
        ];
        let change = compute_index(&current, &RulePath::from_uri("foo"), IndexAction::Delete);
        assert_eq!(change, IndexChange::Changed(vec![resolved("bar/rule.mdx")]));
    }

    fn mutator(store: Arc<MemoryContentStore>, root: &std::path::Path) -> IndexMutator {
        let store: Arc<dyn ContentStore> = store;
        IndexMutator::new(Arc::clone(&store), IndexReader::new(store, root))
    }

    #[tokio::test]
    async fn test_second_add_issues_no_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryContentStore::new()
                .with_rule("foo", &[])
                .with_category(
                    "general",
                    CategoryDocument {
                        title: Some("General".into()),
                        ..Default::default()
                    },
                ),
        );
        let mutator = mutator(Arc::clone(&store), dir.path());
        let ctx = RequestContext::new(Some("token".into()), "main");
        let category = CategoryPath::resolve("general");
        let rule = RulePath::from_uri("foo");

        let first = mutator.apply(&ctx, &category, &rule, IndexAction::Add).await.unwrap();
        assert_eq!(first, MutationOutcome::Updated { entries: 1 });

        let second = mutator.apply(&ctx, &category, &rule, IndexAction::Add).await.unwrap();
        assert_eq!(second, MutationOutcome::Unchanged);
        assert_eq!(store.mutation_count(), 1);

        let doc = store.category("general").unwrap();
        assert_eq!(doc.title.as_deref(), Some("General"));
    }

    #[tokio::test]
    async fn test_mutation_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryContentStore::new()
                .with_category("general", CategoryDocument::default())
                .fail_mutation("general"),
        );
        let mutator = mutator(Arc::clone(&store), dir.path());

        let result = mutator
            .apply(
                &RequestContext::new(None, "main"),
                &CategoryPath::resolve("general"),
                &RulePath::from_uri("foo"),
                IndexAction::Add,
            )
            .await;
        assert!(result.is_err());
        assert!(store
            .calls()
            .contains(&StoreCall::UpdateCategory("categories/general.mdx".into())));
    }
}
