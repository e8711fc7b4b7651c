use crate::error::{Error, Result};
use crate::models::BucketSettings;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;

pub async fn list_settings(State(state): State<Arc<AppState>>) -> Result<Json<Vec<BucketSettings>>> {
    let buckets = state.bucket_service.get_buckets().await?;
    let mut settings = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        if let Some(s) = state.metadata_store.get_settings(&bucket.name)? {
            settings.push(s);
        }
    }
    Ok(Json(settings))
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<Json<BucketSettings>> {
    state
        .metadata_store
        .get_settings(&bucket)?
        .map(Json)
        .ok_or_else(|| Error::InvalidArgument(format!("no settings for bucket {bucket}")))
}

pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Json(mut settings): Json<BucketSettings>,
) -> Result<Json<BucketSettings>> {
    settings.bucket_name = bucket;
    state.metadata_store.upsert_settings(&settings)?;
    Ok(Json(settings))
}
