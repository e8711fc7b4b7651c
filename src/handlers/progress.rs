//! SSE handler for upload progress (component E's HTTP-facing side).
//! Relays broker events until `complete`/`error` or client disconnect,
//! always invoking the unsubscribe closure on stream end, per spec.md §4.5.

use crate::progress::broker::EventReceiver;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use std::convert::Infallible;
use std::sync::Arc;

enum StreamState {
    Open(EventReceiver, Box<dyn FnOnce() + Send>),
    Done,
}

pub async fn stream_progress(State(state): State<Arc<AppState>>, Path(upload_id): Path<String>) -> Response {
    let (rx, unsubscribe) = state.broker.subscribe(&upload_id).await;

    let stream = stream::unfold(StreamState::Open(rx, unsubscribe), |state| async move {
        match state {
            StreamState::Open(mut rx, unsubscribe) => match rx.recv().await {
                Some(event) => {
                    let terminal = event.is_terminal();
                    let name = event.event_name();
                    let sse_event = serde_json::to_string(&event)
                        .map(|json| Event::default().event(name).data(json))
                        .unwrap_or_else(|_| Event::default().event("error").data("serialization failed"));

                    let next_state = if terminal {
                        unsubscribe();
                        StreamState::Done
                    } else {
                        StreamState::Open(rx, unsubscribe)
                    };
                    Some((Ok::<_, Infallible>(sse_event), next_state))
                }
                None => {
                    unsubscribe();
                    None
                }
            },
            StreamState::Done => None,
        }
    });

    let sse = Sse::new(stream).keep_alive(KeepAlive::default());

    // spec.md §6's SSE framing requires these headers explicitly; axum's
    // `Sse` only sets `Content-Type` on its own.
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response()
}
