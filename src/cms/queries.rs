//! GraphQL documents sent to the CMS

/// Category index with rule references resolved (fails on dangling references)
pub const CATEGORY_INDEX: &str = r#"
query CategoryIndex($relativePath: String!) {
  category(relativePath: $relativePath) {
    index {
      rule {
        uri
        _sys { relativePath }
      }
    }
  }
}
"#;

/// Category fields preserved across a mutation
pub const CATEGORY_DOCUMENT: &str = r#"
query CategoryDocument($relativePath: String!) {
  category(relativePath: $relativePath) {
    title
    uri
    guid
    body
    created
    createdBy
    lastUpdated
    lastUpdatedBy
    isArchived
    archivedreason
    redirects
  }
}
"#;

pub const RULE_BY_URI: &str = r#"
query RuleByUri($uri: String!) {
  ruleConnection(filter: { uri: { eq: $uri } }, first: 1) {
    edges {
      node {
        uri
        _sys { relativePath }
        categories {
          category {
            _sys { relativePath }
          }
        }
      }
    }
  }
}
"#;

pub const RULE_EXISTS: &str = r#"
query RuleExists($relativePath: String!) {
  rule(relativePath: $relativePath) {
    _sys { relativePath }
  }
}
"#;

pub const UPDATE_CATEGORY: &str = r#"
mutation UpdateCategory($relativePath: String!, $params: DocumentUpdateMutation!) {
  updateDocument(collection: "category", relativePath: $relativePath, params: $params) {
    __typename
  }
}
"#;

pub const CATEGORY_LIST: &str = r#"
query CategoryList($first: Float, $after: String) {
  categoryConnection(first: $first, after: $after) {
    pageInfo { hasNextPage endCursor }
    edges {
      node {
        title
        uri
        _sys { relativePath }
      }
    }
  }
}
"#;

/// Page size for connection queries
pub const PAGE_SIZE: u32 = 50;
