//! Content model: paths, category documents, index entries, front matter

pub mod document;
pub mod front_matter;
pub mod index;
pub mod paths;

pub use document::{prune_nulls, CategoryDocument};
pub use front_matter::FrontMatter;
pub use index::{contains_rule, IndexItem, PersistedIndexItem, ResolvedRuleRef, RuleRef, SysInfo};
pub use paths::{normalize_rule_path, CategoryPath, RulePath};
