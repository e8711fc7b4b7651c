//! Application wiring (component J): `AppState`, router assembly, and the
//! process entry point. Copied idiom-for-idiom from the teacher's
//! `server.rs` — same `AppState` + `build_app` + `run` + `shutdown_signal`
//! shape — generalized from the S3 storage-backend surface to this
//! gateway's cache/service surface.

use crate::config::Config;
use crate::content_cache::ContentCache;
use crate::error::{Error, Result};
use crate::handlers;
use crate::handlers::upload::UPLOAD_ID_HEADER;
use crate::listing_cache::ListingCache;
use crate::metadata_store::MetadataStore;
use crate::models::UploadEvent;
use crate::progress::ProgressBroker;
use crate::services::{BucketService, ContentService, ObjectService, UploadService};
use crate::upstream::{FilesystemUpstream, UpstreamStore};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Query};
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Allowance for multipart field/boundary framing on top of the declared
/// file size, per spec.md §6.
const FRAMING_OVERHEAD_BYTES: u64 = 4096;

pub struct AppState {
    pub config: Config,
    pub metadata_store: Arc<MetadataStore>,
    pub content_cache: Arc<ContentCache>,
    pub listing_cache: Arc<ListingCache>,
    pub broker: Arc<ProgressBroker>,
    pub content_service: Arc<ContentService>,
    pub object_service: Arc<ObjectService>,
    pub bucket_service: Arc<BucketService>,
    pub upload_service: Arc<UploadService>,
    pub upload_max_size_bytes: u64,
}

pub async fn run(config: Config) -> Result<()> {
    let state = Arc::new(build_state(config.clone())?);

    let cancel = CancellationToken::new();
    state.content_cache.clone().start_maintenance(
        Duration::from_secs(config.cache.cleanup_interval_minutes * 60),
        cancel.clone(),
    );
    state.broker.clone().start_cleanup(cancel.clone());

    let app = build_app(state.clone());
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], config.server.port)));

    info!("cachegate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    Ok(())
}

pub fn build_state(config: Config) -> Result<AppState> {
    let metadata_store = Arc::new(MetadataStore::open(&config.cache.db_path)?);
    let content_cache = Arc::new(ContentCache::new(metadata_store.clone(), config.cache.dir.clone(), &config.cache));
    let listing_cache = Arc::new(ListingCache::new(Duration::from_secs(60 * 60), Duration::from_secs(10 * 60)));
    let broker = Arc::new(ProgressBroker::new());

    let upstream: Arc<dyn UpstreamStore> = Arc::new(FilesystemUpstream::new(config.cache.dir.join("upstream"))?);

    let content_service = Arc::new(ContentService::new(content_cache.clone(), upstream.clone()));
    let object_service = Arc::new(ObjectService::new(listing_cache.clone(), content_cache.clone(), upstream.clone()));
    let bucket_service = Arc::new(BucketService::new(listing_cache.clone(), upstream.clone()));
    let upload_service = Arc::new(UploadService::new(listing_cache.clone(), upstream, broker.clone()));

    Ok(AppState {
        upload_max_size_bytes: config.upload.max_size_bytes(),
        config,
        metadata_store,
        content_cache,
        listing_cache,
        broker,
        content_service,
        object_service,
        bucket_service,
        upload_service,
    })
}

pub fn build_app(state: Arc<AppState>) -> Router {
    // spec.md §6: upload size is enforced once on the raw request stream
    // before multipart parsing starts (here, via `Content-Length`), and a
    // second time in the handler against the declared part size once
    // fields are actually being read.
    let max_upload_size = state.upload_max_size_bytes;
    let broker = state.broker.clone();

    Router::new()
        .route("/api/v1/buckets", get(handlers::buckets::list_buckets))
        .route("/api/v1/buckets/{bucket}/objects", get(handlers::objects::list_objects))
        .route("/api/v1/buckets/{bucket}/content/{*key}", get(handlers::content::get_content))
        .route(
            "/api/v1/buckets/{bucket}/upload/{*key}",
            post(handlers::upload::upload_object)
                .layer(middleware::from_fn(move |req, next| {
                    enforce_upload_size(max_upload_size, broker.clone(), req, next)
                })),
        )
        .route("/api/v1/buckets/{bucket}/directories", post(handlers::upload::create_directory))
        .route("/api/v1/uploads/{upload_id}/progress", get(handlers::progress::stream_progress))
        .route("/api/v1/cache/content", delete(handlers::cache_admin::clear_content_cache))
        .route("/api/v1/cache/api", delete(handlers::cache_admin::clear_listing_cache))
        .route("/api/v1/settings/buckets", get(handlers::settings::list_settings))
        .route(
            "/api/v1/settings/buckets/{bucket}",
            get(handlers::settings::get_settings).put(handlers::settings::put_settings),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // Upload size is policed by `enforce_upload_size` above and by the
        // per-chunk check in the upload handler, per spec.md §6 — axum's
        // own ambient request-body cap would otherwise reject large but
        // within-policy uploads before either of those runs.
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Rejects a request whose declared `Content-Length` already exceeds
/// `limit` before multipart parsing begins, returning the same JSON error
/// shape the rest of the gateway uses rather than axum's generic body-limit
/// rejection. Requests with no `Content-Length` (chunked transfer) fall
/// through to the per-chunk check in the handler.
///
/// A subscriber may already be watching this upload's progress stream by
/// the time this rejection fires, so the upload id (header or query
/// string, same precedence as the handler) is registered and given a
/// mirrored `error` event here too — otherwise a declared-length rejection
/// would look to that subscriber like an unknown id rather than a failure.
async fn enforce_upload_size(max_size: u64, broker: Arc<ProgressBroker>, req: Request<Body>, next: Next) -> Response {
    let declared = req
        .headers()
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(len) = declared {
        if len > max_size + FRAMING_OVERHEAD_BYTES {
            if let Some(id) = upload_id_from_request(&req) {
                broker.register(&id).await;
                broker.publish(&id, UploadEvent::error(&id, "file too large")).await;
            }
            return Error::TooLarge("file too large".into(), max_size).into_response();
        }
    }

    next.run(req).await
}

#[derive(serde::Deserialize)]
struct UploadIdQuery {
    upload_id: Option<String>,
}

fn upload_id_from_request(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(UPLOAD_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            Query::<UploadIdQuery>::try_from_uri(req.uri())
                .ok()
                .and_then(|q| q.0.upload_id)
        })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("received terminate signal, shutting down...");
        },
    }
}
