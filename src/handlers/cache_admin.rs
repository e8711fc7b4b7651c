//! Cache administration endpoints: `DELETE /api/v1/cache/content` and
//! `DELETE /api/v1/cache/api`, per spec.md §6's table. Both accept query
//! parameters that narrow the invalidation to a single key/bucket, falling
//! back to clearing everything when the parameter is absent.

use crate::error::{Error, Result};
use crate::server::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ClearContentParams {
    pub bucket: Option<String>,
    pub key: Option<String>,
}

/// `DELETE /api/v1/cache/content?bucket=&key=`: `key` requires `bucket`.
/// With both set, clears that one entry; with only `bucket`, clears the
/// whole bucket; with neither, clears the entire content cache.
pub async fn clear_content_cache(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClearContentParams>,
) -> Result<Json<serde_json::Value>> {
    let deleted = match (params.bucket.as_deref(), params.key.as_deref()) {
        (Some(bucket), Some(key)) => state.content_cache.clear_key(bucket, key).await?,
        (Some(bucket), None) => state.content_cache.clear_bucket(bucket).await?,
        (None, Some(_)) => {
            return Err(Error::InvalidArgument("key requires bucket".into()));
        }
        (None, None) => state.content_cache.clear_all().await?,
    };
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct ClearListingParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub bucket: Option<String>,
}

/// `DELETE /api/v1/cache/api?type=buckets|objects&bucket=`: `type=buckets`
/// clears the bucket-list slot; `type=objects` clears object listings,
/// narrowed to `bucket` when given, else all buckets; no `type` clears
/// both.
pub async fn clear_listing_cache(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ClearListingParams>,
) -> Result<Json<serde_json::Value>> {
    let message = match params.kind.as_deref() {
        Some("buckets") => {
            state.listing_cache.invalidate_buckets().await;
            "bucket listing cache cleared".to_string()
        }
        Some("objects") => {
            match params.bucket.as_deref() {
                Some(bucket) => {
                    state.listing_cache.invalidate_objects(bucket).await;
                    format!("object listing cache cleared for bucket {bucket}")
                }
                None => {
                    state.listing_cache.invalidate_all_objects().await;
                    "object listing cache cleared".to_string()
                }
            }
        }
        Some(other) => {
            return Err(Error::InvalidArgument(format!("unknown cache type {other}")));
        }
        None => {
            state.listing_cache.invalidate_all().await;
            "listing cache cleared".to_string()
        }
    };
    Ok(Json(serde_json::json!({ "message": message })))
}
