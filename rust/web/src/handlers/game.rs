use super::{error_response, success_response};
use crate::rooms::RoomId;
use crate::session::SessionManager;
use serde::Deserialize;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub cell: usize,
}

#[derive(Debug, Deserialize)]
pub struct RematchAnswer {
    pub accept: bool,
}

/// Submits a move for the caller's mark.
///
/// POST `/api/rooms/{id}/moves` with `{ "cell": 0..=8 }`. Responds 202
/// with the resulting `board_update` event; when the bot answers, its
/// move arrives as a second `board_update` on the room stream.
pub async fn submit_move(
    sessions: Arc<SessionManager>,
    room_id: RoomId,
    identity: String,
    request: MoveRequest,
) -> Response {
    match sessions.make_move(&room_id, &identity, request.cell) {
        Ok(event) => success_response(StatusCode::ACCEPTED, event),
        Err(err) => error_response(err),
    }
}

/// Opens a rematch vote on a finished game. Creator only.
///
/// POST `/api/rooms/{id}/rematch`; responds 202 with the
/// `rematch_requested` event. Against the bot the reset follows
/// immediately on the room stream.
pub async fn request_rematch(
    sessions: Arc<SessionManager>,
    room_id: RoomId,
    identity: String,
) -> Response {
    match sessions.request_rematch(&room_id, &identity) {
        Ok(event) => success_response(StatusCode::ACCEPTED, event),
        Err(err) => error_response(err),
    }
}

/// Answers an open rematch vote.
///
/// POST `/api/rooms/{id}/rematch/response` with `{ "accept": bool }`.
/// Responds 202 with the closing event: `room_reset` once both marks have
/// voted yes, `rematch_declined` on a refusal, `rematch_status` otherwise.
pub async fn respond_rematch(
    sessions: Arc<SessionManager>,
    room_id: RoomId,
    identity: String,
    request: RematchAnswer,
) -> Response {
    match sessions.respond_rematch(&room_id, &identity, request.accept) {
        Ok(event) => success_response(StatusCode::ACCEPTED, event),
        Err(err) => error_response(err),
    }
}
