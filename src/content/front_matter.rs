//! YAML front matter of local content files
//!
//! Category `.mdx` files start with a `---` delimited YAML block. The index
//! is read from it directly, without asking the CMS to resolve references,
//! which is what makes it usable for rules whose files do not exist yet.

use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::debug;

use super::index::IndexItem;
use crate::types::{Result, RulesError};

const DELIMITER: &str = "---";

/// Parsed front matter plus the remaining document body
#[derive(Debug, Clone, Default)]
pub struct FrontMatter {
    pub fields: Mapping,
    pub body: String,
}

impl FrontMatter {
    /// Split and parse a document
    ///
    /// A document without front matter yields empty fields and the whole
    /// input as body. An unterminated block is an error.
    pub fn parse(content: &str) -> Result<Self> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut lines = content.split_inclusive('\n');
        match lines.next() {
            Some(first) if first.trim_end() == DELIMITER => {}
            _ => {
                return Ok(Self {
                    fields: Mapping::new(),
                    body: content.to_string(),
                })
            }
        }

        let mut yaml = String::new();
        let mut closed = false;
        for line in lines.by_ref() {
            if line.trim_end() == DELIMITER {
                closed = true;
                break;
            }
            yaml.push_str(line);
        }
        if !closed {
            return Err(RulesError::ContentParse(
                "front matter block is not terminated".to_string(),
            ));
        }

        let body: String = lines.collect();
        if yaml.trim().is_empty() {
            return Ok(Self {
                fields: Mapping::new(),
                body,
            });
        }
        let fields = match serde_yaml::from_str::<Value>(&yaml)? {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            other => {
                return Err(RulesError::ContentParse(format!(
                    "front matter is not a mapping: {:?}",
                    other
                )))
            }
        };

        Ok(Self { fields, body })
    }

    /// Read and parse a file
    pub async fn read(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// The `index` sequence, without validating that referenced rules exist
    ///
    /// Entries that do not look like a rule reference at all are skipped.
    pub fn index(&self) -> Vec<IndexItem> {
        let Some(Value::Sequence(items)) = self.fields.get("index") else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match serde_yaml::from_value::<IndexItem>(item.clone()) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable index entry");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATEGORY: &str = r#"---
type: category
title: General
uri: general
index:
  - rule: public/uploads/rules/a/rule.mdx
  - rule: public/uploads/rules/b/rule.mdx
  - public/uploads/rules/c/rule
---
Some intro text
"#;

    #[test]
    fn test_parse_category_front_matter() {
        let fm = FrontMatter::parse(CATEGORY).unwrap();
        assert_eq!(fm.get_str("title"), Some("General"));
        assert_eq!(fm.body, "Some intro text\n");

        let paths: Vec<_> = fm.index().iter().filter_map(IndexItem::resolved_path).collect();
        assert_eq!(paths, vec!["a/rule", "b/rule", "c/rule"]);
    }

    #[test]
    fn test_no_front_matter() {
        let fm = FrontMatter::parse("# Just markdown\n").unwrap();
        assert!(fm.fields.is_empty());
        assert!(fm.index().is_empty());
        assert_eq!(fm.body, "# Just markdown\n");
    }

    #[test]
    fn test_empty_front_matter() {
        let fm = FrontMatter::parse("---\n---\nbody").unwrap();
        assert!(fm.fields.is_empty());
        assert_eq!(fm.body, "body");
    }

    #[test]
    fn test_unterminated_front_matter() {
        let err = FrontMatter::parse("---\ntitle: x\n").unwrap_err();
        assert!(matches!(err, RulesError::ContentParse(_)));
    }

    #[test]
    fn test_missing_index_is_empty() {
        let fm = FrontMatter::parse("---\ntitle: x\n---\n").unwrap();
        assert!(fm.index().is_empty());
    }

    #[test]
    fn test_crlf_delimiters() {
        let fm = FrontMatter::parse("---\r\ntitle: x\r\nindex:\r\n  - rule: public/uploads/rules/a/rule.mdx\r\n---\r\n").unwrap();
        assert_eq!(fm.index().len(), 1);
    }

    #[test]
    fn test_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("general.mdx");
        std::fs::write(&path, CATEGORY).unwrap();

        let fm = tokio_test::block_on(FrontMatter::read(&path)).unwrap();
        assert_eq!(fm.index().len(), 3);

        let missing = tokio_test::block_on(FrontMatter::read(&dir.path().join("missing.mdx")));
        assert!(missing.is_err());
    }
}
