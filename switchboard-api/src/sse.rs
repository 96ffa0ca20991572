//! Push-only observer stream
//!
//! Observers subscribe to the broadcast feed over server-sent events.
//! Delivery is best-effort: a consumer that falls behind the broadcast
//! buffer is disconnected rather than allowed to back-pressure the hub,
//! and can re-sync from `GET /api/events`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::hub::Hub;

/// SSE handler for `GET /events`. Streams every subsequent coordination
/// event until the observer disconnects or lags out.
pub async fn sse_handler(
    State(hub): State<Arc<Hub>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = hub.subscribe();
    let stream = BroadcastStream::new(rx)
        .take_while(|result| {
            if result.is_err() {
                warn!("Observer lagged behind the event buffer; disconnecting");
            }
            result.is_ok()
        })
        .filter_map(|result| {
            result.ok().map(|event| {
                Ok(Event::default()
                    .event(event.kind.as_str())
                    .data(event.to_wire().to_string()))
            })
        });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
