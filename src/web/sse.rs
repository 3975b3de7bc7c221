//! Server-Sent Events (SSE) handler

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Extension,
};
use std::{sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::middleware::Caller;
use super::routes::deny_unless_admin;
use super::AppState;

pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    if let Some(denied) = deny_unless_admin(&state, &caller) {
        return denied;
    }

    let rx = state.event_bus.subscribe();
    let stream = BroadcastStream::new(rx);

    // Lagged receivers just skip the dropped events
    let event_stream = stream.filter_map(|result| {
        let event = result.ok()?;
        let json = serde_json::to_string(&*event).ok()?;
        Some(Ok::<_, std::convert::Infallible>(
            Event::default().data(json).event("login"),
        ))
    });

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
    .into_response()
}
