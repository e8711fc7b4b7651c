//! End-to-end scenarios from spec.md §8, driven straight through
//! `server::build_app` with `tower::ServiceExt::oneshot` — the idiomatic
//! way to exercise an axum router without binding a real socket, per
//! SPEC_FULL.md §10.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cachegate::config::{CacheConfig, Config, ServerConfig, UploadConfig};
use cachegate::server;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn test_config(dir: &TempDir, max_cache_size_mb: i64, max_upload_size_mb: u64) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        cache: CacheConfig {
            db_path: dir.path().join("cache.db"),
            dir: dir.path().join("cache"),
            ttl_minutes: 120,
            cleanup_interval_minutes: 60,
            max_size_mb: max_cache_size_mb,
        },
        upload: UploadConfig {
            max_size_mb: max_upload_size_mb,
        },
    }
}

fn upstream_root(config: &Config) -> PathBuf {
    config.cache.dir.join("upstream")
}

async fn seed_upstream_object(config: &Config, bucket: &str, key: &str, body: &[u8]) {
    let path = upstream_root(config).join(bucket).join(key);
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(&path, body).await.unwrap();
}

fn build_router(config: Config) -> axum::Router {
    let state = Arc::new(server::build_state(config).unwrap());
    server::build_app(state)
}

fn build_router_with_state(config: Config) -> (axum::Router, Arc<server::AppState>) {
    let state = Arc::new(server::build_state(config).unwrap());
    (server::build_app(state.clone()), state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Scenario 1: miss-then-hit. First read is a cache miss served from
/// upstream; the second is a cache hit with identical bytes and no further
/// upstream dependency (the upstream file is left untouched either way,
/// so this also exercises that the cached copy — not a re-fetch — served
/// the second request).
#[tokio::test]
async fn miss_then_hit_content_read() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 100);
    seed_upstream_object(&config, "b", "k.txt", b"payload").await;
    let app = build_router(config);

    let req = Request::get("/api/v1/buckets/b/content/k.txt").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-cache").unwrap(), "MISS");
    let body = body_bytes(response).await;
    assert_eq!(body, b"payload");

    let req = Request::get("/api/v1/buckets/b/content/k.txt").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-cache").unwrap(), "HIT");
    let body = body_bytes(response).await;
    assert_eq!(body, b"payload");
}

/// Scenario 4: upload too large. A declared `Content-Length` beyond
/// `MaxUploadSize + 4096` is rejected before multipart parsing begins.
#[tokio::test]
async fn upload_exceeding_max_size_is_rejected_with_413() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 1); // 1 MB cap
    let app = build_router(config);

    let oversized = vec![0u8; 2 * 1024 * 1024];
    let boundary = "X-BOUNDARY-X";
    let mut payload = Vec::new();
    payload.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    payload.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"big.bin\"\r\n");
    payload.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    payload.extend_from_slice(&oversized);
    payload.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = Request::post("/api/v1/buckets/b/upload/big.bin")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("content-length", payload.len().to_string())
        .body(Body::from(payload))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TooLarge");
    assert_eq!(json["max_size"], 1024 * 1024);
}

/// Scenario 4, subscriber variant: a declared-`Content-Length` rejection
/// still registers the upload id and publishes an `error` event, so a
/// subscriber is told the upload failed rather than seeing an unknown id.
#[tokio::test]
async fn upload_exceeding_max_size_with_upload_id_publishes_error_event() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 1); // 1 MB cap
    let (app, state) = build_router_with_state(config);

    let oversized = vec![0u8; 2 * 1024 * 1024];
    let boundary = "X-BOUNDARY-X";
    let mut payload = Vec::new();
    payload.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    payload.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"big.bin\"\r\n");
    payload.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    payload.extend_from_slice(&oversized);
    payload.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = Request::post("/api/v1/buckets/b/upload/big.bin")
        .header("x-upload-id", "u-413")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("content-length", payload.len().to_string())
        .body(Body::from(payload))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    // The rejection happens in middleware, before `upload_object` runs, but
    // it still registers the id and publishes an `error` event — a
    // subscriber arriving after the fact gets that event replayed rather
    // than the empty-then-closed stream an unknown id produces.
    let (mut rx, _unsub) = state.broker.subscribe("u-413").await;
    let event = rx.recv().await.unwrap();
    assert_eq!(event.phase, cachegate::models::UploadPhase::Error);
    assert_eq!(event.error_message.as_deref(), Some("file too large"));
}

/// Scenario 6 (partial): a key containing a `..` segment is rejected with
/// `400 InvalidArgument` rather than being written anywhere.
#[tokio::test]
async fn upload_with_traversal_segment_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 100);
    let app = build_router(config);

    let boundary = "X-BOUNDARY-X";
    let mut payload = Vec::new();
    payload.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    payload.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"x\"\r\n");
    payload.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
    payload.extend_from_slice(b"hello");
    payload.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = Request::post("/api/v1/buckets/b/upload/a/../b")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .unwrap();

    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "InvalidArgument");
}

/// Bucket-settings CRUD over the HTTP surface named in spec.md §6.
#[tokio::test]
async fn settings_roundtrip_over_http() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 100);
    let app = build_router(config);

    let put_body = serde_json::json!({ "bucket_name": "b", "public_url": "https://example.com/b" });
    let req = Request::put("/api/v1/settings/buckets/b")
        .header("content-type", "application/json")
        .body(Body::from(put_body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let req = Request::get("/api/v1/settings/buckets/b").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["public_url"], "https://example.com/b");

    let req = Request::get("/api/v1/settings/buckets/missing").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// `DELETE /api/v1/cache/content` narrowed to a single key.
#[tokio::test]
async fn clear_content_cache_by_key_over_http() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 100);
    seed_upstream_object(&config, "b", "k", b"x").await;
    let app = build_router(config);

    let req = Request::get("/api/v1/buckets/b/content/k").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let req = Request::delete("/api/v1/cache/content?bucket=b&key=k").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["deleted"], 1);

    let req = Request::get("/api/v1/buckets/b/content/k").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.headers().get("x-cache").unwrap(), "MISS");
}

/// Scenario 5 (fan-out, simplified): a subscriber joining after the
/// upload has already completed replays exactly the terminal event, then
/// the SSE stream closes.
#[tokio::test]
async fn progress_stream_replays_completed_event_then_closes() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 100);
    let state = Arc::new(server::build_state(config).unwrap());

    state.broker.register("u1").await;
    state.broker
        .publish(
            "u1",
            cachegate::models::UploadEvent::complete(
                "u1",
                cachegate::models::UploadResult { key: "k".into(), size: 3, etag: "e".into() },
            ),
        )
        .await;

    let app = server::build_app(state);
    let req = Request::get("/api/v1/uploads/u1/progress").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("event: complete"));
}

/// An unknown upload id yields a `200` SSE stream that closes immediately
/// with no events, per spec.md §6's "404 maps to an empty-then-closed SSE
/// stream (200)" rule.
#[tokio::test]
async fn progress_stream_for_unknown_upload_closes_immediately() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, 0, 100);
    let app = build_router(config);

    let req = Request::get("/api/v1/uploads/does-not-exist/progress").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert!(body.is_empty());
}
