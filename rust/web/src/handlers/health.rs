use serde_json::json;
use warp::reply::{json as json_reply, Json};

pub fn health() -> Json {
    json_reply(&json!({
        "status": "ok",
    }))
}
