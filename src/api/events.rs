// ============================================
// Server-Sent Events for listing revalidation
// ============================================
//
// Streams `revalidate` events to the admin UI whenever a mutation makes a
// listing stale. Clients refetch the path named in the event payload.
//
// Event types:
// - `connected`  initial confirmation
// - `revalidate` `{ "path": "/ngos", "at": "..." }`

use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use axum::extract::State;
use futures::stream::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{broadcast, mpsc};

use super::AppState;

/// Per-client buffer between the broadcast fan-out and the HTTP body.
const CLIENT_BUFFER: usize = 64;

struct RevalidationStream {
    rx: mpsc::Receiver<Event>,
}

impl Stream for RevalidationStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|event| event.map(Ok))
    }
}

/// GET /v1/events
pub async fn revalidation_events(State(state): State<AppState>) -> Response {
    let (tx, rx) = mpsc::channel::<Event>(CLIENT_BUFFER);
    let mut listings = state.ctx.revalidator.subscribe();

    let connected = Event::default()
        .event("connected")
        .data(r#"{"message":"Connected to listing revalidation stream"}"#);
    // The receiver is held below, so the first send cannot fail.
    let _ = tx.send(connected).await;

    tracing::info!("SSE client connected");

    tokio::spawn(async move {
        loop {
            let changed = match listings.recv().await {
                Ok(changed) => changed,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE client lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let event = match Event::default().event("revalidate").json_data(&changed) {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("SSE: failed to encode event: {}", e);
                    continue;
                }
            };

            if tx.send(event).await.is_err() {
                tracing::debug!("SSE client disconnected");
                break;
            }
        }
    });

    Sse::new(RevalidationStream { rx })
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(15))
                .text("ping"),
        )
        .into_response()
}
