//! rules-api - category index synchronization service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rules_api::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rules_api={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  rules-api - category index sync");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode() { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("CMS GraphQL: {}", args.graphql_url);
    let content_root = args.content_root();
    info!("Content root: {}", content_root.display());
    if !content_root.is_dir() {
        warn!(
            "Content root {} is not a directory, file fallback disabled",
            content_root.display()
        );
    }
    info!("Default branch: {}", args.default_branch);
    info!("Request timeout: {}ms", args.request_timeout_ms);
    info!("======================================");

    let state = Arc::new(AppState::new(args)?);
    server::run(state).await?;

    Ok(())
}
