//! Error types for rules-api

use hyper::StatusCode;

/// Main error type for rules-api operations
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport-level failure talking to the CMS (connect, timeout, non-2xx)
    #[error("CMS error: {0}")]
    Cms(String),

    /// The CMS answered but reported GraphQL errors
    #[error("GraphQL error: {}", .0.join("; "))]
    Graphql(Vec<String>),

    /// Local content file could not be parsed
    #[error("Content parse error: {0}")]
    ContentParse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RulesError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Cms(_) => StatusCode::BAD_GATEWAY,
            Self::Graphql(_) => StatusCode::BAD_GATEWAY,
            Self::ContentParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for RulesError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for RulesError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for RulesError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ContentParse(format!("YAML error: {}", err))
    }
}

impl From<reqwest::Error> for RulesError {
    fn from(err: reqwest::Error) -> Self {
        Self::Cms(err.to_string())
    }
}

impl From<hyper::Error> for RulesError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

/// Result type alias for rules-api operations
pub type Result<T> = std::result::Result<T, RulesError>;
