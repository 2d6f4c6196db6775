//! HTTP handlers for the event-stream endpoint and its companion message
//! endpoint.

use super::registry::EventResult;
use super::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

/// Wraps the per-client receiver so the client is deregistered the moment
/// the stream is dropped (client disconnect), not just on the next failed
/// write.
struct ClientStream {
    inner: UnboundedReceiverStream<EventResult>,
    registry: std::sync::Arc<super::registry::ClientRegistry>,
    session_id: String,
}

impl Stream for ClientStream {
    type Item = EventResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        self.registry.unregister(&self.session_id);
    }
}

/// `GET /` and `GET /sse` (both paths are exposed for profile
/// compatibility).
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = EventResult>> {
    let (session_id, rx): (String, UnboundedReceiver<EventResult>) = state.registry.register();
    info!(session_id, "sse client connected");

    let endpoint = format!("/messages?session_id={session_id}");
    state
        .registry
        .send_to(&session_id, Event::default().event("endpoint").data(endpoint));

    let stream = ClientStream {
        inner: UnboundedReceiverStream::new(rx),
        registry: state.registry.clone(),
        session_id,
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.keep_alive_secs))
            .text("ping"),
    )
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    session_id: Option<String>,
}

/// `POST /messages?session_id=<id>`. The HTTP response is always
/// `202 Accepted`; the RPC result (if any) is delivered over the matching
/// event stream instead.
pub async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let Some(session_id) = query.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "missing session_id"})),
        )
            .into_response();
    };

    let request: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("malformed request body: {e}")})),
            )
                .into_response();
        }
    };

    if let Some(response) = state.rpc.dispatch(&request).await {
        let payload = response.to_string();
        state
            .registry
            .send_to(&session_id, Event::default().event("message").data(payload));
    }

    (StatusCode::ACCEPTED, Json(json!({"accepted": true}))).into_response()
}

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
