//! Configuration for rules-api
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::cms::graphql::GraphqlConfig;

/// Longest accepted revalidation interval for the category listing cache
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// rules-api - keeps category indexes in sync with rule submissions
#[derive(Parser, Debug, Clone)]
#[command(name = "rules-api")]
#[command(about = "Category index synchronization for the rules content repository")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3001")]
    pub listen: SocketAddr,

    /// Runtime environment; `development` skips the bearer token requirement
    #[arg(long, env = "NODE_ENV", default_value = "production")]
    pub node_env: String,

    /// Local checkout of the content repository, relative to the working directory
    #[arg(long, env = "LOCAL_CONTENT_RELATIVE_PATH", default_value = "../content")]
    pub content_path: PathBuf,

    /// CMS GraphQL endpoint; `{branch}` is replaced by the request's branch
    #[arg(long, env = "CMS_GRAPHQL_URL", default_value = "http://localhost:4001/graphql")]
    pub graphql_url: String,

    /// CMS token used in development when the request carries none
    #[arg(long, env = "CMS_TOKEN")]
    pub cms_token: Option<String>,

    /// Branch used when the request has no `x-branch` cookie
    #[arg(long, env = "DEFAULT_BRANCH", default_value = "main")]
    pub default_branch: String,

    /// Request timeout in milliseconds for CMS calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Revalidation interval of the category listing cache
    #[arg(long, env = "CATEGORY_CACHE_TTL_SECS", default_value = "3600")]
    pub category_cache_ttl_secs: u64,

    /// Maximum number of cached listings
    #[arg(long, env = "CACHE_MAX_ENTRIES", default_value = "1000")]
    pub cache_max_entries: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3001)),
            node_env: "production".to_string(),
            content_path: PathBuf::from("../content"),
            graphql_url: "http://localhost:4001/graphql".to_string(),
            cms_token: None,
            default_branch: "main".to_string(),
            request_timeout_ms: 30_000,
            category_cache_ttl_secs: 3600,
            cache_max_entries: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl Args {
    pub fn dev_mode(&self) -> bool {
        self.node_env.eq_ignore_ascii_case("development")
    }

    /// Content root resolved against the working directory
    pub fn content_root(&self) -> PathBuf {
        if self.content_path.is_absolute() {
            return self.content_path.clone();
        }
        std::env::current_dir()
            .map(|cwd| cwd.join(&self.content_path))
            .unwrap_or_else(|_| self.content_path.clone())
    }

    pub fn graphql_config(&self) -> GraphqlConfig {
        GraphqlConfig {
            endpoint: self.graphql_url.clone(),
            timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(
            self.cache_max_entries,
            Duration::from_secs(self.category_cache_ttl_secs),
        )
    }

    /// Validate configuration
    ///
    /// A missing content root is not an error; the file fallback then finds
    /// nothing and every read comes from the CMS.
    pub fn validate(&self) -> Result<(), String> {
        if self.graphql_url.trim().is_empty() {
            return Err("CMS_GRAPHQL_URL must not be empty".to_string());
        }

        if self.default_branch.trim().is_empty() {
            return Err("DEFAULT_BRANCH must not be empty".to_string());
        }

        if self.category_cache_ttl_secs == 0 {
            return Err("CATEGORY_CACHE_TTL_SECS must be greater than zero".to_string());
        }

        if self.category_cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(format!(
                "CATEGORY_CACHE_TTL_SECS must be at most {}",
                MAX_CACHE_TTL_SECS
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_in(dir: &std::path::Path) -> Args {
        Args {
            content_path: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_defaults() {
        let args = Args::parse_from(["rules-api"]);
        assert_eq!(args.listen.port(), 3001);
        assert_eq!(args.default_branch, "main");
        assert_eq!(args.cache_config().ttl, Duration::from_secs(3600));
        assert_eq!(args.graphql_config().timeout, Duration::from_millis(30_000));
    }

    #[test]
    fn test_dev_mode() {
        let mut args = Args::default();
        assert!(!args.dev_mode());
        args.node_env = "development".to_string();
        assert!(args.dev_mode());
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(args_in(dir.path()).validate().is_ok());

        let mut args = args_in(dir.path());
        args.category_cache_ttl_secs = 0;
        assert!(args.validate().is_err());

        let mut args = args_in(dir.path());
        args.graphql_url = " ".to_string();
        assert!(args.validate().is_err());

        let mut args = args_in(dir.path());
        args.category_cache_ttl_secs = MAX_CACHE_TTL_SECS + 1;
        assert!(args.validate().is_err());

        let mut args = args_in(dir.path());
        args.category_cache_ttl_secs = u64::MAX;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_missing_content_root_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let missing = args_in(&dir.path().join("missing"));
        assert!(!missing.content_root().is_dir());
        assert!(missing.validate().is_ok());
    }
}
