use crate::error::Result;
use crate::server::AppState;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response> {
    let content = state.content_service.get_content(&bucket, &key).await?;

    let stream = ReaderStream::new(content.body);
    let body = Body::from_stream(stream);

    Ok((
        [
            (header::CONTENT_TYPE, content.content_type),
            (header::ETAG, content.etag),
            (
                header::CONTENT_LENGTH,
                content.size.to_string(),
            ),
            (
                header::HeaderName::from_static("x-cache"),
                if content.cache_hit { "HIT".to_string() } else { "MISS".to_string() },
            ),
        ],
        body,
    )
        .into_response())
}
