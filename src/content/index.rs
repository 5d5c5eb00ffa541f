//! Category index entries
//!
//! A category's `index` references rules in more than one textual form:
//!
//! - a raw upload path string: `public/uploads/rules/foo/rule.mdx`
//! - a resolved object from the CMS: `{ "_sys": { "relativePath": "foo/rule.mdx" } }`
//! - an object carrying only the rule `uri`
//!
//! and each of those may be wrapped CMS-style as `{ "rule": <reference> }`.
//! Newly created rules can be referenced before their file exists, so the
//! form that was already present is written back as-is. Normalization via
//! [`RuleRef::resolved_path`] is used for comparison only.

use serde::{Deserialize, Serialize};

use super::paths::{normalize_rule_path, RulePath, RULE_UPLOAD_PREFIX};

/// `_sys` block of a resolved CMS document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysInfo {
    #[serde(rename = "relativePath")]
    pub relative_path: String,
}

/// A rule reference the CMS has already resolved to a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRuleRef {
    #[serde(rename = "_sys", default, skip_serializing_if = "Option::is_none")]
    pub sys: Option<SysInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Reference to a rule, in whichever form the source used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleRef {
    RawPath(String),
    Resolved(ResolvedRuleRef),
}

impl RuleRef {
    /// Join key used to compare references (`foo/rule`)
    ///
    /// Returns `None` for a resolved object that carries neither a relative
    /// path nor a uri (a reference the CMS could not resolve).
    pub fn resolved_path(&self) -> Option<String> {
        let path = match self {
            Self::RawPath(raw) => normalize_rule_path(raw),
            Self::Resolved(ResolvedRuleRef { sys: Some(sys), .. }) => {
                normalize_rule_path(&sys.relative_path)
            }
            Self::Resolved(ResolvedRuleRef { uri: Some(uri), .. }) => {
                RulePath::from_uri(uri).as_str().to_string()
            }
            Self::Resolved(_) => return None,
        };
        (!path.is_empty()).then_some(path)
    }

    /// Textual form written back to the CMS
    pub fn persisted(&self) -> Option<String> {
        match self {
            Self::RawPath(raw) if !raw.trim().is_empty() => Some(raw.clone()),
            Self::RawPath(_) => None,
            Self::Resolved(ResolvedRuleRef { sys: Some(sys), .. }) => {
                Some(format!("{}{}", RULE_UPLOAD_PREFIX, sys.relative_path))
            }
            Self::Resolved(ResolvedRuleRef { uri: Some(uri), .. }) => {
                Some(RulePath::from_uri(uri).upload_path())
            }
            Self::Resolved(_) => None,
        }
    }

    pub fn matches(&self, rule: &RulePath) -> bool {
        self.resolved_path().as_deref() == Some(rule.as_str())
    }
}

/// One entry of a category index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexItem {
    /// CMS-style `{ rule: <reference> }`
    Entry { rule: RuleRef },
    /// A bare reference
    Bare(RuleRef),
}

/// Index entry shape accepted by the CMS mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIndexItem {
    pub rule: String,
}

impl IndexItem {
    /// New entry for a rule, using the upload path string form
    pub fn for_rule(rule: &RulePath) -> Self {
        Self::Entry {
            rule: RuleRef::RawPath(rule.upload_path()),
        }
    }

    pub fn rule(&self) -> &RuleRef {
        match self {
            Self::Entry { rule } | Self::Bare(rule) => rule,
        }
    }

    pub fn resolved_path(&self) -> Option<String> {
        self.rule().resolved_path()
    }

    pub fn matches(&self, rule: &RulePath) -> bool {
        self.rule().matches(rule)
    }

    pub fn to_persisted(&self) -> Option<PersistedIndexItem> {
        self.rule().persisted().map(|rule| PersistedIndexItem { rule })
    }
}

/// True if any entry resolves to the given rule
pub fn contains_rule(items: &[IndexItem], rule: &RulePath) -> bool {
    items.iter().any(|item| item.matches(rule))
}
