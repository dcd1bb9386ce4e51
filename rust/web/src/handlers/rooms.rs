use super::{empty_response, error_response, success_response};
use crate::events::{EventBus, RoomEvent, RoomTransport};
use crate::rooms::{GameMode, RoomId, RoomListing, RoomRegistry, Visibility};
use crate::session::SessionManager;
use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub mode: Option<GameMode>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRoomRequest {
    #[serde(default)]
    pub password: Option<String>,
}

/// Registers a new room and announces it on the lobby stream.
///
/// POST `/api/rooms` with `{ "name", "visibility"?, "password"?, "mode"? }`.
/// Visibility defaults to public, mode to player-vs-player. Responds 201
/// with the room's public listing.
pub async fn create_room(
    registry: Arc<RoomRegistry>,
    event_bus: Arc<EventBus>,
    identity: String,
    request: CreateRoomRequest,
) -> Response {
    let visibility = request.visibility.unwrap_or(Visibility::Public);
    let mode = request.mode.unwrap_or(GameMode::PlayerVsPlayer);

    match registry.create(&request.name, visibility, request.password, mode, &identity) {
        Ok(room) => {
            let listing = RoomListing::from(&room);
            event_bus.broadcast_lobby(RoomEvent::RoomCreated {
                room: listing.clone(),
            });
            success_response(StatusCode::CREATED, listing)
        }
        Err(err) => error_response(err),
    }
}

/// Lists every room for the lobby, oldest first.
///
/// GET `/api/rooms`; responds 200 with an array of listings.
pub async fn list_rooms(registry: Arc<RoomRegistry>) -> Response {
    match registry.list() {
        Ok(listings) => success_response(StatusCode::OK, listings),
        Err(err) => error_response(err),
    }
}

/// Joins (or reconnects to) a room.
///
/// POST `/api/rooms/{id}/join` with `{ "password"? }`. Responds 200 with
/// the full session snapshot for the joining connection; membership and
/// seat changes reach the room via its event stream.
pub async fn join_room(
    sessions: Arc<SessionManager>,
    room_id: RoomId,
    identity: String,
    request: JoinRoomRequest,
) -> Response {
    match sessions.join(&room_id, &identity, request.password.as_deref()) {
        Ok(snapshot) => success_response(StatusCode::OK, snapshot),
        Err(err) => error_response(err),
    }
}

/// Leaves a room. The last member out dissolves it.
///
/// POST `/api/rooms/{id}/leave`; responds 204.
pub async fn leave_room(
    sessions: Arc<SessionManager>,
    room_id: RoomId,
    identity: String,
) -> Response {
    match sessions.leave(&room_id, &identity) {
        Ok(()) => empty_response(StatusCode::NO_CONTENT),
        Err(err) => error_response(err),
    }
}

/// Dissolves a room on the creator's request.
///
/// DELETE `/api/rooms/{id}`; responds 204. Subscribers of the room and
/// the lobby receive `room_dissolved`.
pub async fn dissolve_room(
    sessions: Arc<SessionManager>,
    room_id: RoomId,
    identity: String,
) -> Response {
    match sessions.dissolve(&room_id, &identity) {
        Ok(()) => empty_response(StatusCode::NO_CONTENT),
        Err(err) => error_response(err),
    }
}
