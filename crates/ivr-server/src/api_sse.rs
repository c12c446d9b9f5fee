//! SSE activity stream handler.

use crate::AppState;
use axum::{
    extract::Extension,
    response::{sse::Event, Sse},
};
use futures_util::Stream;
use ivr_observe::ActivityEvent;
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

fn event_name(event: &ActivityEvent) -> &'static str {
    match event {
        ActivityEvent::Entry(_) => "entry",
        ActivityEvent::Cleared { .. } => "cleared",
    }
}

/// Handler for `GET /events/activity`.
///
/// Streams caller utterances and assistant replies as they are logged, plus a
/// `cleared` event when a call ends.
pub async fn activity_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.activity.subscribe();
    let stream = BroadcastStream::new(rx);

    let mapped_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(Event::default().event(event_name(&event)).data(data))),
            Err(e) => {
                tracing::error!("failed to serialize activity event: {}", e);
                None
            }
        },
        Err(broadcast_error) => {
            tracing::warn!(
                error = %broadcast_error,
                "activity SSE stream lagged; entries were dropped for this subscriber"
            );
            None
        }
    });

    Sse::new(mapped_stream).keep_alive(axum::response::sse::KeepAlive::default())
}
