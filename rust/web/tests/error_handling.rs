use serde_json::{json, Value};
use std::time::Duration;
use tictac_web::server::{ServerConfig, WebServer};
use warp::hyper::{self, Body, Client as HyperClient, Request};

async fn start_server() -> (tictac_web::server::ServerHandle, String) {
    let server = WebServer::new(ServerConfig::for_tests());
    let handle = server.start().await.expect("start server");
    let address = format!("http://{}", handle.address());
    tokio::time::sleep(Duration::from_millis(20)).await;
    (handle, address)
}

async fn post_json(
    client: &HyperClient<hyper::client::HttpConnector>,
    uri: &str,
    player: &str,
    body: &str,
) -> hyper::Response<Body> {
    let request = Request::builder()
        .method(hyper::Method::POST)
        .uri(uri)
        .header("x-player", player)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request");
    client.request(request).await.expect("issue request")
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (handle, address) = start_server().await;
    let client = HyperClient::new();

    let response = client
        .get(format!("{address}/health").parse().expect("uri"))
        .await
        .expect("request health");
    assert_eq!(response.status(), hyper::StatusCode::OK);

    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let body: Value = serde_json::from_slice(&bytes).expect("parse body");
    assert_eq!(body["status"], "ok");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn operations_on_unknown_rooms_are_not_found() {
    let (handle, address) = start_server().await;
    let client = HyperClient::new();

    for uri in [
        format!("{address}/api/rooms/nope/join"),
        format!("{address}/api/rooms/nope/moves"),
    ] {
        let body = if uri.ends_with("moves") {
            json!({ "cell": 0 }).to_string()
        } else {
            json!({}).to_string()
        };
        let response = post_json(&client, &uri, "alice", &body).await;
        assert_eq!(
            response.status(),
            hyper::StatusCode::NOT_FOUND,
            "uri: {uri}"
        );
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .expect("read body");
        let error: Value = serde_json::from_slice(&bytes).expect("parse body");
        assert_eq!(error["error"], "room_not_found");
        assert_eq!(error["details"]["room_id"], "nope");
    }

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn malformed_payloads_are_rejected() {
    let (handle, address) = start_server().await;
    let client = HyperClient::new();

    // Not JSON at all.
    let response = post_json(&client, &format!("{address}/api/rooms"), "alice", "not json").await;
    assert_eq!(response.status(), hyper::StatusCode::BAD_REQUEST);

    // JSON of the wrong shape.
    let response = post_json(
        &client,
        &format!("{address}/api/rooms"),
        "alice",
        &json!({ "name": 42 }).to_string(),
    )
    .await;
    assert_eq!(response.status(), hyper::StatusCode::BAD_REQUEST);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn blank_room_names_are_rejected() {
    let (handle, address) = start_server().await;
    let client = HyperClient::new();

    let response = post_json(
        &client,
        &format!("{address}/api/rooms"),
        "alice",
        &json!({ "name": "   " }).to_string(),
    )
    .await;
    assert_eq!(response.status(), hyper::StatusCode::BAD_REQUEST);
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let error: Value = serde_json::from_slice(&bytes).expect("parse body");
    assert_eq!(error["error"], "room_name_required");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn private_room_without_password_is_rejected() {
    let (handle, address) = start_server().await;
    let client = HyperClient::new();

    let response = post_json(
        &client,
        &format!("{address}/api/rooms"),
        "alice",
        &json!({ "name": "Hideout", "visibility": "private" }).to_string(),
    )
    .await;
    assert_eq!(response.status(), hyper::StatusCode::BAD_REQUEST);
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let error: Value = serde_json::from_slice(&bytes).expect("parse body");
    assert_eq!(error["error"], "room_password_required");

    handle.shutdown().await.expect("shutdown");
}
