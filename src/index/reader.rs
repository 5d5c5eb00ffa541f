//! Index reader
//!
//! Reads a category's current rule index from two sources, one after the
//! other, and reconciles them:
//!
//! 1. the validating GraphQL query, which may fail or come back short when
//!    a referenced rule file does not exist yet;
//! 2. the category file's front matter in the local content checkout, read
//!    without any validation.
//!
//! When GraphQL has fewer entries than the file, the file wins. The
//! discrepancy is assumed to come from unresolvable references rather than
//! from a stale file; no timestamps are compared. When GraphQL wins, entries
//! that also appear in the file keep the file's text, since the CMS hands
//! back resolved objects rather than what was stored. Nothing here returns
//! an error: GraphQL failures fall back to the file, and an unreadable file
//! counts as an empty index.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cms::{ContentStore, RequestContext};
use crate::content::{CategoryPath, FrontMatter, IndexItem};

/// Which side of the reconciliation produced the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSource {
    Graphql,
    File,
    /// GraphQL failed and the file yielded nothing
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledIndex {
    pub items: Vec<IndexItem>,
    pub source: IndexSource,
}

/// Pick between the GraphQL result (`None` if the query failed) and the file result
pub fn reconcile(graphql: Option<Vec<IndexItem>>, file: Vec<IndexItem>) -> ReconciledIndex {
    match graphql {
        Some(items) if items.len() >= file.len() => ReconciledIndex {
            items: with_stored_text(items, &file),
            source: IndexSource::Graphql,
        },
        _ if !file.is_empty() => ReconciledIndex {
            items: file,
            source: IndexSource::File,
        },
        _ => ReconciledIndex {
            items: Vec::new(),
            source: IndexSource::Empty,
        },
    }
}

/// Swap each GraphQL entry for the file entry resolving to the same rule
fn with_stored_text(graphql: Vec<IndexItem>, file: &[IndexItem]) -> Vec<IndexItem> {
    let mut stored: HashMap<String, &IndexItem> = HashMap::new();
    for item in file {
        if let Some(path) = item.resolved_path() {
            stored.entry(path).or_insert(item);
        }
    }

    graphql
        .into_iter()
        .map(|item| {
            item.resolved_path()
                .and_then(|path| stored.get(&path))
                .map(|stored| (*stored).clone())
                .unwrap_or(item)
        })
        .collect()
}

/// Reads category indexes from the CMS with a file-system fallback
#[derive(Clone)]
pub struct IndexReader {
    store: Arc<dyn ContentStore>,
    content_root: PathBuf,
}

impl IndexReader {
    pub fn new(store: Arc<dyn ContentStore>, content_root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            content_root: content_root.into(),
        }
    }

    /// Current index of a category
    ///
    /// The GraphQL query completes before the file is read.
    pub async fn read(&self, ctx: &RequestContext, category: &CategoryPath) -> ReconciledIndex {
        let graphql = self.read_graphql(ctx, category).await;
        let file = self.read_file(category).await;

        let graphql_len = graphql.as_ref().map(Vec::len);
        let file_len = file.len();
        let reconciled = reconcile(graphql, file);

        if reconciled.source != IndexSource::Graphql && graphql_len.is_some() {
            warn!(
                category = %category,
                graphql = ?graphql_len,
                file = file_len,
                "GraphQL index shorter than file index, using file"
            );
        } else {
            debug!(
                category = %category,
                source = ?reconciled.source,
                entries = reconciled.items.len(),
                "Read category index"
            );
        }
        reconciled
    }

    async fn read_graphql(
        &self,
        ctx: &RequestContext,
        category: &CategoryPath,
    ) -> Option<Vec<IndexItem>> {
        match self.store.category_index(ctx, category).await {
            Ok(items) => Some(items),
            Err(e) => {
                warn!(
                    category = %category,
                    error = %e,
                    "GraphQL index query failed, falling back to content file"
                );
                None
            }
        }
    }

    /// Index from the category file's front matter; empty on any failure
    pub async fn read_file(&self, category: &CategoryPath) -> Vec<IndexItem> {
        let Some(path) = category.file_path(&self.content_root) else {
            warn!(category = %category, "Category path leaves the content root, skipping file");
            return Vec::new();
        };
        match FrontMatter::read(&path).await {
            Ok(front_matter) => front_matter.index(),
            Err(e) => {
                warn!(
                    category = %category,
                    path = %path.display(),
                    error = %e,
                    "Could not read category file, treating index as empty"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::cms::MemoryContentStore;
    use crate::content::{CategoryDocument, RulePath};
    use serde_json::json;

    fn items(uris: &[&str]) -> Vec<IndexItem> {
        uris.iter()
            .map(|uri| IndexItem::for_rule(&RulePath::from_uri(uri)))
            .collect()
    }

    fn write_category(root: &Path, slug: &str, uris: &[&str]) {
        let path = CategoryPath::resolve(slug).file_path(root).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut content = String::from("---\ntitle: Test\nindex:\n");
        for uri in uris {
            content.push_str(&format!("  - rule: public/uploads/rules/{}/rule.mdx\n", uri));
        }
        content.push_str("---\n");
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_reconcile_prefers_longer_file() {
        let result = reconcile(Some(Vec::new()), items(&["a", "b", "c"]));
        assert_eq!(result.source, IndexSource::File);
        assert_eq!(result.items.len(), 3);
    }

    #[test]
    fn test_reconcile_keeps_graphql_when_not_shorter() {
        let result = reconcile(Some(items(&["a", "b"])), items(&["a", "b"]));
        assert_eq!(result.source, IndexSource::Graphql);

        let result = reconcile(Some(Vec::new()), Vec::new());
        assert_eq!(result.source, IndexSource::Graphql);
    }

    #[test]
    fn test_graphql_win_keeps_stored_text() {
        let resolved: IndexItem =
            serde_json::from_value(json!({ "rule": { "_sys": { "relativePath": "foo/rule.mdx" } } }))
                .unwrap();
        let unmatched: IndexItem =
            serde_json::from_value(json!({ "rule": { "_sys": { "relativePath": "bar/rule.mdx" } } }))
                .unwrap();
        let stored: IndexItem =
            serde_json::from_value(json!({ "rule": "public/uploads/rules/foo/rule" })).unwrap();

        let result = reconcile(Some(vec![resolved, unmatched.clone()]), vec![stored.clone()]);
        assert_eq!(result.source, IndexSource::Graphql);
        assert_eq!(result.items, vec![stored, unmatched]);
        assert_eq!(
            result.items[0].to_persisted().unwrap().rule,
            "public/uploads/rules/foo/rule"
        );
    }

    #[test]
    fn test_reconcile_without_any_source() {
        let result = reconcile(None, Vec::new());
        assert_eq!(result.source, IndexSource::Empty);
        assert!(result.items.is_empty());
    }

    #[tokio::test]
    async fn test_file_wins_when_rules_are_not_yet_resolvable() {
        let dir = tempfile::tempdir().unwrap();
        write_category(dir.path(), "general", &["a", "b", "c"]);

        // None of the rules exist in the store, so GraphQL returns 0 items
        let store = MemoryContentStore::new().with_category(
            "general",
            CategoryDocument {
                index: items(&["a", "b", "c"]),
                ..Default::default()
            },
        );
        let reader = IndexReader::new(Arc::new(store), dir.path());

        let result = reader
            .read(&RequestContext::new(None, "main"), &CategoryPath::resolve("general"))
            .await;
        assert_eq!(result.source, IndexSource::File);
        assert_eq!(result.items.len(), 3);
    }

    #[tokio::test]
    async fn test_graphql_failure_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        write_category(dir.path(), "azure-devops/branch-policies", &["a"]);

        let store = MemoryContentStore::new().fail_index_query("azure-devops/branch-policies");
        let reader = IndexReader::new(Arc::new(store), dir.path());

        let result = reader
            .read(
                &RequestContext::new(None, "main"),
                &CategoryPath::resolve("azure-devops/branch-policies"),
            )
            .await;
        assert_eq!(result.source, IndexSource::File);
        assert!(result.items[0].matches(&RulePath::from_uri("a")));
    }

    #[tokio::test]
    async fn test_file_outside_content_root_is_not_read() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("content");
        std::fs::create_dir_all(root.join("categories")).unwrap();
        std::fs::write(
            dir.path().join("outside.mdx"),
            "---\nindex:\n  - rule: public/uploads/rules/a/rule.mdx\n---\n",
        )
        .unwrap();

        let reader = IndexReader::new(Arc::new(MemoryContentStore::new()), &root);
        let category = CategoryPath::resolve("../../outside");
        assert!(reader.read_file(&category).await.is_empty());

        let result = reader.read(&RequestContext::new(None, "main"), &category).await;
        assert_eq!(result.source, IndexSource::Empty);
    }

    #[tokio::test]
    async fn test_missing_file_and_failed_query_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryContentStore::new().fail_index_query("general");
        let reader = IndexReader::new(Arc::new(store), dir.path());

        let result = reader
            .read(&RequestContext::new(None, "main"), &CategoryPath::resolve("general"))
            .await;
        assert_eq!(result.source, IndexSource::Empty);
    }
}
