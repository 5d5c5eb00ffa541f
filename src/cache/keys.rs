//! Cache key scheme
//!
//! Keys are scoped by content branch first, then by tag, so a whole branch
//! or one tag within a branch can be invalidated with a prefix match:
//!
//! ```text
//! {branch}:{tag}:{key}
//! ```

use std::fmt;

/// Tag of the category listing
pub const CATEGORIES_TAG: &str = "categories";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub branch: String,
    pub tag: String,
    pub key: String,
}

impl CacheKey {
    pub fn new(branch: &str, tag: &str, key: &str) -> Self {
        Self {
            branch: sanitize(branch),
            tag: sanitize(tag),
            key: key.to_string(),
        }
    }

    /// Key of the full category listing for a branch
    pub fn category_listing(branch: &str) -> Self {
        Self::new(branch, CATEGORIES_TAG, "all")
    }

    pub fn to_storage_key(&self) -> String {
        format!("{}:{}:{}", self.branch, self.tag, self.key)
    }

    /// Prefix matching every key of a tag within a branch
    pub fn tag_prefix(branch: &str, tag: &str) -> String {
        format!("{}:{}:", sanitize(branch), sanitize(tag))
    }
}

/// Branch and tag names must not contain the separator
fn sanitize(part: &str) -> String {
    part.replace(':', "%3A")
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_key())
    }
}
