use crate::error::Result;
use crate::models::ListObjectsParams;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use std::sync::Arc;

pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    Query(params): Query<ListObjectsParams>,
) -> Result<Json<crate::models::ListObjectsResult>> {
    let result = state.object_service.get_objects(&bucket, &params).await?;
    Ok(Json(result))
}
