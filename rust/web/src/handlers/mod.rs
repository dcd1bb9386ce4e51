pub mod game;
pub mod health;
pub mod rooms;
pub mod sse;

pub use game::{request_rematch, respond_rematch, submit_move, MoveRequest, RematchAnswer};
pub use rooms::{
    create_room, dissolve_room, join_room, leave_room, list_rooms, CreateRoomRequest,
    JoinRoomRequest,
};

use crate::errors::IntoErrorResponse;
use serde::Serialize;
use warp::http::{self, StatusCode};
use warp::reply::{self, Response};
use warp::Reply;

pub(crate) fn success_response<T>(status: StatusCode, body: T) -> Response
where
    T: Serialize,
{
    reply::with_status(reply::json(&body), status).into_response()
}

pub(crate) fn empty_response(status: StatusCode) -> Response {
    http::Response::builder()
        .status(status)
        .body(warp::hyper::Body::empty())
        .expect("build empty response")
}

pub(crate) fn error_response(err: impl IntoErrorResponse) -> Response {
    err.into_http_response()
}
