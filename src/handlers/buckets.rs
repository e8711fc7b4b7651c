use crate::error::Result;
use crate::server::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<Json<Vec<crate::models::Bucket>>> {
    let buckets = state.bucket_service.get_buckets().await?;
    Ok(Json(buckets))
}
