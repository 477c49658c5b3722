//! The streaming generation endpoint.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{routing::post, Json, Router};
use contentgen::broadcast::{JobPhase, ProgressEvent};
use contentgen::JobRequest;
use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::state::AppState;

/// POST /api/collections/generate/stream
///
/// Always answers with an event stream. A malformed body or a request the
/// coordinator rejects produces a stream holding one `error` event.
async fn generate_stream(
    State(state): State<AppState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = match payload {
        Ok(Json(request)) => state.coordinator.submit(request),
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Malformed generation request");
            rejected(&rejection.body_text())
        }
    };

    Sse::new(event_stream(receiver)).keep_alive(KeepAlive::default())
}

fn rejected(reason: &str) -> mpsc::UnboundedReceiver<ProgressEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(ProgressEvent::error(
        JobPhase::Loading,
        &format!("Invalid request: {reason}"),
    ));
    rx
}

/// Turns a job's receiver into SSE frames, ending after the terminal event.
pub fn event_stream(
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(receiver), |state| async move {
        let mut receiver = state?;
        let event = receiver.recv().await?;
        let next = if event.is_terminal() {
            None
        } else {
            Some(receiver)
        };
        Some((Ok(to_frame(&event)), next))
    })
}

fn to_frame(event: &ProgressEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize progress event");
            Event::default().data(
                serde_json::json!({
                    "type": "error",
                    "progress": event.progress,
                    "message": "Failed to serialize progress event",
                    "phase": event.phase,
                    "error": e.to_string(),
                    "timestamp": event.timestamp,
                })
                .to_string(),
            )
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/collections/generate/stream", post(generate_stream))
}
