//! Change feed over Server-Sent Events

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use leadline_common::Result;
use serde::Deserialize;

use crate::api::middleware::MessagingState;
use crate::domain::events::EventKind;
use crate::notifier::Received;

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    /// Comma-separated kinds, e.g. `message.created,message.status_changed`
    pub kinds: Option<String>,
}

/// Stream change events. A subscriber that falls behind receives one `lagged` event carrying
/// the number of dropped events, then the stream ends; clients reconnect and re-fetch.
pub async fn stream_events(
    State(state): State<MessagingState>,
    Query(params): Query<EventsParams>,
) -> Result<
    Sse<impl futures_core::Stream<Item = std::result::Result<Event, std::convert::Infallible>>>,
> {
    let kinds = match params.kinds.as_deref() {
        Some(raw) => EventKind::parse_list(raw)?,
        None => Vec::new(),
    };
    let mut subscription = state.service.subscribe(&kinds);

    let stream = async_stream::stream! {
        loop {
            match subscription.next().await {
                Received::Event(event) => {
                    let data = serde_json::to_string(&event)
                        .unwrap_or_else(|_| "{}".to_string());
                    yield Ok(Event::default()
                        .id(event.id.to_string())
                        .event(event.kind.as_str())
                        .data(data));
                }
                Received::Lagged(missed) => {
                    tracing::warn!(missed, "Event subscriber lagged, closing stream");
                    yield Ok(Event::default().event("lagged").data(missed.to_string()));
                    break;
                }
                Received::Closed => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
