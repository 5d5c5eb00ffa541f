//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::{spawn_cleanup_task, TaggedCache};
use crate::cms::{ContentStore, GraphqlContentStore};
use crate::config::Args;
use crate::index::{IndexMutator, IndexReader};
use crate::routes;
use crate::services::CategorySyncService;
use crate::types::{Result, RulesError};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// CMS access
    pub store: Arc<dyn ContentStore>,
    /// Category index synchronization
    pub sync: CategorySyncService,
    /// Category listing cache
    pub cache: Arc<TaggedCache>,
    pub started_at: Instant,
}

impl AppState {
    /// Build state backed by the GraphQL CMS
    pub fn new(args: Args) -> Result<Self> {
        let store = GraphqlContentStore::new(args.graphql_config())?;
        Ok(Self::with_store(args, Arc::new(store)))
    }

    /// Build state around any content store
    pub fn with_store(args: Args, store: Arc<dyn ContentStore>) -> Self {
        let cache = Arc::new(TaggedCache::new(args.cache_config()));
        let reader = IndexReader::new(Arc::clone(&store), args.content_root());
        let mutator = IndexMutator::new(Arc::clone(&store), reader);
        let sync = CategorySyncService::new(Arc::clone(&store), mutator, Arc::clone(&cache));

        Self {
            args,
            store,
            sync,
            cache,
            started_at: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "rules-api listening on {} (store: {})",
        state.args.listen,
        state.store.id()
    );

    if state.args.dev_mode() {
        warn!("Development mode enabled - bearer token not required");
    }

    spawn_cleanup_task(Arc::clone(&state.cache));
    info!(
        "Category cache enabled (max {} entries, ttl {}s)",
        state.cache.config().max_entries,
        state.cache.config().ttl.as_secs()
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = Uuid::new_v4();

    info!(request_id = %request_id, "[{}] {} {}", addr, method, path);

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body from {}: {}", addr, e);
            return Ok(to_boxed(error_response(&RulesError::from(e))));
        }
    };

    let mut response = route(&state, method, &path, &parts.headers, body)
        .instrument(info_span!("request", id = %request_id))
        .await;
    if let Ok(value) = hyper::header::HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    Ok(to_boxed(response))
}

/// Dispatch a request with an already-collected body
pub async fn route(
    state: &AppState,
    method: Method,
    path: &str,
    headers: &hyper::HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    match (method, path) {
        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(state),

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        (Method::POST, "/api/update-category") => {
            routes::handle_update_category(state, headers, body).await
        }

        (Method::GET, "/api/categories") => routes::handle_list_categories(state, headers).await,

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        _ => not_found_response(path),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn error_response(err: &RulesError) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": err.to_string() });

    Response::builder()
        .status(err.status_code())
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
