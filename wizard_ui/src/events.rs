use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::{stream::Stream, StreamExt};
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::BroadcastStream;
use tracing::error;

use crate::state::AppState;

/// Server-Sent Events handler streaming preview and cycle events to the
/// host page in real time.
pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events_tx.subscribe();

    let stream = BroadcastStream::new(rx).map(|msg| {
        match msg {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Ok(Event::default().data(json)),
                Err(e) => {
                    error!("failed to serialize ui event: {}", e);
                    Ok(Event::default().comment("error serializing event"))
                }
            },
            Err(e) => {
                // Slow consumers lag rather than block the generator.
                error!("error receiving from broadcast: {}", e);
                Ok(Event::default().comment("event stream lagged"))
            }
        }
    });

    Sse::new(stream)
}
