//! Upload handlers: decodes a multipart body, drives the two-phase
//! progress broker publish sequence spec.md §4.5/§4.7 describe, and
//! delegates the actual write to `UploadService`.

use crate::error::{Error, Result};
use crate::models::{UploadEvent, UploadPhase, UploadResult};
use crate::server::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

pub(crate) const UPLOAD_ID_HEADER: &str = "x-upload-id";
const FILE_FIELD: &str = "file";

#[derive(Deserialize, Default)]
pub struct UploadQuery {
    #[serde(default)]
    overwrite: bool,
    upload_id: Option<String>,
}

pub async fn upload_object(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResult>> {
    let upload_id = headers
        .get(UPLOAD_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or(query.upload_id);

    if let Some(id) = &upload_id {
        state.broker.register(id).await;
    }

    let result = handle_upload(&state, &bucket, &key, query.overwrite, &mut multipart, upload_id.as_deref()).await;

    match &result {
        Ok(upload_result) => {
            if let Some(id) = &upload_id {
                state
                    .broker
                    .publish(id, UploadEvent::complete(id, upload_result.clone()))
                    .await;
            }
        }
        Err(e) => {
            if let Some(id) = &upload_id {
                state.broker.publish(id, UploadEvent::error(id, e.to_string())).await;
            }
        }
    }

    result.map(Json)
}

async fn handle_upload(
    state: &Arc<AppState>,
    bucket: &str,
    key: &str,
    overwrite: bool,
    multipart: &mut Multipart,
    upload_id: Option<&str>,
) -> Result<UploadResult> {
    let mut body: Option<Vec<u8>> = None;
    let mut content_type = "application/octet-stream".to_string();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidArgument(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name != FILE_FIELD && body.is_some() {
            continue;
        }

        content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or(content_type);

        let mut buf = Vec::new();
        let mut received: u64 = 0;
        let mut last_emit = std::time::Instant::now();

        while let Some(chunk) = field.chunk().await.map_err(|e| Error::InvalidArgument(e.to_string()))? {
            received += chunk.len() as u64;
            if received > state.upload_max_size_bytes {
                if let Some(id) = upload_id {
                    state
                        .broker
                        .publish(id, UploadEvent::error(id, "file too large"))
                        .await;
                }
                return Err(Error::TooLarge("file too large".into(), state.upload_max_size_bytes));
            }
            buf.extend_from_slice(&chunk);

            if let Some(id) = upload_id {
                if last_emit.elapsed() >= std::time::Duration::from_millis(100) {
                    last_emit = std::time::Instant::now();
                    state
                        .broker
                        .publish(id, UploadEvent::progress(id, UploadPhase::Receiving, received, None))
                        .await;
                }
            }
        }

        if let Some(id) = upload_id {
            state
                .broker
                .publish(id, UploadEvent::progress(id, UploadPhase::Receiving, received, Some(received)))
                .await;
        }

        body = Some(buf);
    }

    let body = body.ok_or_else(|| Error::InvalidArgument("missing file field".into()))?;

    state
        .upload_service
        .upload_object(bucket, key, &content_type, body, overwrite, upload_id)
        .await
        .map(|put_result| UploadResult {
            key: key.to_string(),
            size: put_result.size as u64,
            etag: put_result.etag,
        })
}

pub async fn create_directory(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Json(params): Json<CreateDirectoryRequest>,
) -> Result<Json<serde_json::Value>> {
    state.upload_service.create_directory(&bucket, &params.path).await?;
    Ok(Json(serde_json::json!({ "path": params.path })))
}

#[derive(serde::Deserialize)]
pub struct CreateDirectoryRequest {
    pub path: String,
}
