use crate::events::{EventBus, EventSubscription, RoomEvent, LOBBY_CHANNEL};
use crate::rooms::{RoomDirectory, RoomId, RoomRegistry};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use warp::http::{self, StatusCode};
use warp::reply::{self, Response};
use warp::sse;
use warp::Reply;

/// SSE stream of a single room's events.
///
/// GET `/api/rooms/{id}/events`. The room must exist in the directory;
/// the subscription itself is what puts this connection in the room's
/// broadcast group.
pub async fn stream_room_events(
    room_id: RoomId,
    registry: Arc<RoomRegistry>,
    event_bus: Arc<EventBus>,
) -> Response {
    match registry.lookup(&room_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                "room_not_found",
                format!("room `{room_id}` was not found"),
            );
        }
        Err(err) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "room_storage_error",
                err.to_string(),
            );
        }
    }

    event_stream(event_bus.subscribe(room_id))
}

/// SSE stream of lobby-wide events (room created / dissolved).
///
/// GET `/api/lobby/events`.
pub async fn stream_lobby_events(event_bus: Arc<EventBus>) -> Response {
    event_stream(event_bus.subscribe(LOBBY_CHANNEL))
}

fn event_stream(subscription: EventSubscription) -> Response {
    let stream = subscription_stream(subscription);
    let keep_alive = sse::keep_alive()
        .interval(Duration::from_secs(15))
        .text(":keep-alive\n");

    let reply = sse::reply(keep_alive.stream(stream));
    reply::with_header(reply, http::header::CACHE_CONTROL, "no-cache").into_response()
}

fn subscription_stream(
    subscription: EventSubscription,
) -> impl tokio_stream::Stream<Item = Result<sse::Event, Infallible>> {
    // The subscription must outlive the stream so its Drop impl
    // unsubscribes when the client goes away; park it in an Arc the
    // mapped closure keeps alive while the receiver is streamed.
    let mut subscription = subscription;
    let (_placeholder_tx, placeholder_rx) = mpsc::channel(1);
    let receiver = std::mem::replace(&mut subscription.receiver, placeholder_rx);
    let subscription = Arc::new(subscription);

    ReceiverStream::new(receiver).map(move |event| {
        let _keep_alive = Arc::clone(&subscription);
        Ok(render_event(event))
    })
}

fn render_event(event: RoomEvent) -> sse::Event {
    match serde_json::to_string(&event) {
        Ok(json) => sse::Event::default().event("room_event").data(json),
        Err(err) => {
            let fallback = serde_json::json!({
                "type": "error",
                "message": format!("failed to serialize room event: {err}")
            })
            .to_string();
            sse::Event::default().event("room_event").data(fallback)
        }
    }
}

fn error_response(status: StatusCode, error: &'static str, message: String) -> Response {
    #[derive(Serialize)]
    struct ErrorBody<'a> {
        error: &'a str,
        message: String,
    }

    let body = ErrorBody { error, message };
    reply::with_status(reply::json(&body), status).into_response()
}
