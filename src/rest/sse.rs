// rest/sse.rs — Live project feed.
//
// GET /api/v1/projects/{id}/live
//
// Streams freshly appended project events as Server-Sent Events in the
// stored wire shape. There is no replay: a client connecting after an event
// was broadcast never sees it and must refetch current state first.

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;

use crate::AppContext;

pub async fn project_events_sse(
    State(ctx): State<Arc<AppContext>>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    let (_listener, rx) = ctx.broadcaster.subscribe(&project_id);

    let s = stream::unfold(rx, move |mut rx| async move {
        match rx.recv().await {
            Some(payload) => {
                // The payload already carries the wire shape; surface the
                // event_type as the SSE event name for client-side routing.
                let name = serde_json::from_str::<serde_json::Value>(&payload)
                    .ok()
                    .and_then(|v| {
                        v.get("event_type")
                            .and_then(|t| t.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| "event".to_string());
                let sse_event = Event::default().data(payload).event(name);
                Some((Ok::<Event, std::convert::Infallible>(sse_event), rx))
            }
            None => None,
        }
    });

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
