use crate::extractors::authenticated_identity::AuthenticatedIdentity;
use crate::{AppState, Error};
use async_stream::stream;
use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures::Stream;
use log::*;
use ::sse::{ClientStream, Frame};
use std::convert::Infallible;

/// SSE handler that opens the caller's event stream.
/// One stream per identity: opening a new one closes the previous one.
pub(crate) async fn stream_handler(
    AuthenticatedIdentity(identity): AuthenticatedIdentity,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("Establishing stream connection for {}", identity.id);

    let client = app_state.hub.connect(identity).await?;

    // Liveness comes from the hub's own heartbeat frames, so no KeepAlive.
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Sse::new(frames(client)),
    ))
}

/// Dropping the returned stream drops `client`, which unregisters the session.
fn frames(mut client: ClientStream) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        while let Some(frame) = client.next_frame().await {
            yield Ok::<_, Infallible>(to_event(&frame));
        }
        debug!(
            "Stream {} of {} ended",
            client.session().connection_id().as_str(),
            client.session().identity_id()
        );
    }
}

fn to_event(frame: &Frame) -> Event {
    let mut event = Event::default();

    // axum panics on header values that would split the frame.
    if let Some(id) = single_line(&frame.id, "id") {
        event = event.id(id);
    }
    if let Some(name) = single_line(&frame.event, "event") {
        event = event.event(name);
    }

    event.data(&frame.data)
}

fn single_line<'a>(value: &'a Option<String>, field: &str) -> Option<&'a str> {
    let value = value.as_deref()?;
    if value.contains(['\n', '\r', '\0']) {
        warn!("Dropping SSE {field} containing a control character");
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn wire(event: Event) -> String {
        let events = futures::stream::iter([Ok::<_, Infallible>(event)]);
        let body = Sse::new(events).into_response().into_body();
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn frames_keep_id_event_data_order() {
        let frame = Frame {
            id: Some("7".to_string()),
            event: Some("update".to_string()),
            data: "{\"granted\":true}".to_string(),
        };

        assert_eq!(
            wire(to_event(&frame)).await,
            "id: 7\nevent: update\ndata: {\"granted\":true}\n\n"
        );
    }

    #[tokio::test]
    async fn headers_that_would_split_the_frame_are_left_out() {
        let frame = Frame {
            id: Some("3".to_string()),
            event: Some("evil\ndata: injected".to_string()),
            data: "{}".to_string(),
        };

        assert_eq!(wire(to_event(&frame)).await, "id: 3\ndata: {}\n\n");
    }
}
