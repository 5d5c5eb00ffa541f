//! Path resolution for category and rule documents
//!
//! Category identifiers arrive in several shapes (`general`,
//! `azure-devops/branch-policies`, `general.mdx`, `categories/general.mdx`).
//! All of them resolve to one [`CategoryPath`], which knows how to render
//! itself as the CMS collection-relative key, the canonical content path
//! reported to clients, and the on-disk location under a content root.
//!
//! Rules are keyed by `uri`; the join key between a rule and category
//! indexes is `{uri}/rule`. Nothing here touches the network.

use std::fmt;
use std::path::{Path, PathBuf};

/// Folder of the category collection inside the content root
pub const CATEGORY_COLLECTION_DIR: &str = "categories";

/// Prefix used when a rule is referenced by its upload path
pub const RULE_UPLOAD_PREFIX: &str = "public/uploads/rules/";

/// File extension of content documents
pub const CONTENT_EXTENSION: &str = ".mdx";

const RULE_FILE_STEM: &str = "rule";

fn strip_extension(s: &str) -> &str {
    s.strip_suffix(".mdx")
        .or_else(|| s.strip_suffix(".md"))
        .unwrap_or(s)
}

/// A resolved category location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryPath {
    /// Slug without collection prefix or extension, e.g. `azure-devops/branch-policies`
    slug: String,
}

impl CategoryPath {
    /// Resolve any accepted category identifier
    pub fn resolve(input: &str) -> Self {
        let trimmed = input.trim().trim_matches('/');
        let without_prefix = trimmed
            .strip_prefix(CATEGORY_COLLECTION_DIR)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(trimmed);

        Self {
            slug: strip_extension(without_prefix).trim_matches('/').to_string(),
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Path relative to the content root: `categories/{slug}.mdx`
    pub fn canonical(&self) -> String {
        format!("{}/{}{}", CATEGORY_COLLECTION_DIR, self.slug, CONTENT_EXTENSION)
    }

    /// Key inside the CMS category collection: `{slug}.mdx`
    pub fn relative_path(&self) -> String {
        format!("{}{}", self.slug, CONTENT_EXTENSION)
    }

    /// True if any slug segment is `.` or `..`
    ///
    /// Such a path would leave the category collection, both on disk and
    /// as a CMS relative path.
    pub fn escapes_collection(&self) -> bool {
        self.slug
            .split('/')
            .any(|segment| matches!(segment.trim(), "." | ".."))
    }

    /// Location of the category file under a local content checkout
    ///
    /// `None` for a path that escapes the category collection.
    pub fn file_path(&self, content_root: &Path) -> Option<PathBuf> {
        if self.escapes_collection() {
            return None;
        }
        let mut path = content_root.join(CATEGORY_COLLECTION_DIR);
        let mut segments = self.slug.split('/').filter(|s| !s.is_empty()).peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{}{}", segment, CONTENT_EXTENSION));
            }
        }
        Some(path)
    }

    pub fn is_empty(&self) -> bool {
        self.slug.is_empty()
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// The join key of a rule: `{uri}/rule`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RulePath {
    path: String,
}

impl RulePath {
    /// Construct from the rule's business key without querying for the rule
    pub fn from_uri(uri: &str) -> Self {
        let uri = uri.trim().trim_matches('/');
        Self {
            path: format!("{}/{}", uri, RULE_FILE_STEM),
        }
    }

    /// Construct from a CMS relative path such as `foo/rule.mdx`
    pub fn from_relative_path(relative_path: &str) -> Self {
        Self {
            path: normalize_rule_path(relative_path),
        }
    }

    /// Join key, e.g. `use-pull-requests/rule`
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Document key inside the CMS rule collection: `{uri}/rule.mdx`
    pub fn document_path(&self) -> String {
        format!("{}{}", self.path, CONTENT_EXTENSION)
    }

    /// Form persisted into category indexes: `public/uploads/rules/{uri}/rule.mdx`
    pub fn upload_path(&self) -> String {
        format!("{}{}", RULE_UPLOAD_PREFIX, self.document_path())
    }
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Normalize any textual rule reference to its join key
///
/// Used for comparison only; persisted index entries keep their original text.
pub fn normalize_rule_path(reference: &str) -> String {
    let trimmed = reference.trim().trim_start_matches('/');
    let without_prefix = trimmed.strip_prefix(RULE_UPLOAD_PREFIX).unwrap_or(trimmed);
    strip_extension(without_prefix).trim_matches('/').to_string()
}
