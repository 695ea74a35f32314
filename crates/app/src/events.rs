use std::time::Duration;

use axum::response::sse::{Event, KeepAlive};
use catalog_admin_client::{SessionEvent, SessionEventFilter, SessionEvents};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::warn;

const KEEP_ALIVE_SECS: u64 = 20;

fn into_sse_event(event: &SessionEvent) -> Result<Event, serde_json::Error> {
    let data = serde_json::to_string(&event.redacted())?;
    Ok(Event::default().event(event.kind().as_str()).data(data))
}

fn matching_events(
    events: &SessionEvents,
    filter: SessionEventFilter,
) -> impl Stream<Item = SessionEvent> + Send + 'static {
    BroadcastStream::new(events.subscribe()).filter_map(move |result| match result {
        Ok(event) if filter.matches(&event) => Some(event),
        Ok(_) => None,
        Err(err) => {
            warn!(stage = "app", error = %err, "session event subscriber lagged");
            None
        }
    })
}

/// SSE stream of session events matching `filter`. Token values never leave the process.
pub fn session_stream(
    events: &SessionEvents,
    filter: SessionEventFilter,
) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    matching_events(events, filter).map(|event| into_sse_event(&event))
}

pub fn session_keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(KEEP_ALIVE_SECS))
        .text("heartbeat")
}
