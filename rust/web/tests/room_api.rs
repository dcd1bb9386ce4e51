use serde_json::{json, Value};
use std::time::Duration;
use tictac_web::server::{ServerConfig, WebServer};
use warp::hyper::{self, Body, Client as HyperClient, Request};

async fn send(
    client: &HyperClient<hyper::client::HttpConnector>,
    method: hyper::Method,
    uri: &str,
    player: &str,
    body: Option<Value>,
) -> (hyper::StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-player", player);
    let body = match body {
        Some(json) => {
            builder = builder.header(hyper::header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("build request");
    let response = client.request(request).await.expect("issue request");
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, json)
}

#[tokio::test]
async fn room_api_lifecycle() {
    let server = WebServer::new(ServerConfig::for_tests());
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    // Create a public pvp room as alice.
    let (status, created) = send(
        &client,
        hyper::Method::POST,
        &format!("http://{address}/api/rooms"),
        "alice",
        Some(json!({ "name": "Arena", "mode": "pvp" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::CREATED);
    assert_eq!(created["name"], "Arena");
    assert_eq!(created["created_by"], "alice");
    let room_id = created["id"].as_str().expect("room id").to_string();

    // The lobby listing shows it.
    let (status, listings) = send(
        &client,
        hyper::Method::GET,
        &format!("http://{address}/api/rooms"),
        "alice",
        None,
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    let listings = listings.as_array().expect("listing array");
    assert!(listings.iter().any(|room| room["id"] == room_id.as_str()));

    // Alice and bob take the two seats; carol bounces off.
    let join_uri = format!("http://{address}/api/rooms/{room_id}/join");
    let (status, snapshot) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "alice",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(snapshot["your_mark"], "x");
    assert_eq!(snapshot["is_creator"], true);
    assert_eq!(snapshot["turn"], "x");

    let (status, snapshot) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "bob",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(snapshot["your_mark"], "o");
    assert_eq!(snapshot["is_creator"], false);

    let (status, error) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "carol",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::CONFLICT);
    assert_eq!(error["error"], "room_full");

    // X sweeps the top row.
    let moves_uri = format!("http://{address}/api/rooms/{room_id}/moves");
    let script = [("alice", 0), ("bob", 4), ("alice", 1), ("bob", 5)];
    for (player, cell) in script {
        let (status, update) = send(
            &client,
            hyper::Method::POST,
            &moves_uri,
            player,
            Some(json!({ "cell": cell })),
        )
        .await;
        assert_eq!(status, hyper::StatusCode::ACCEPTED);
        assert_eq!(update["type"], "board_update");
        assert!(update["winner"].is_null());
    }

    let (status, update) = send(
        &client,
        hyper::Method::POST,
        &moves_uri,
        "alice",
        Some(json!({ "cell": 2 })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::ACCEPTED);
    assert_eq!(update["winner"], "x");
    assert_eq!(update["last_move"]["cell"], 2);

    // A move on the finished board is refused.
    let (status, error) = send(
        &client,
        hyper::Method::POST,
        &moves_uri,
        "bob",
        Some(json!({ "cell": 8 })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::CONFLICT);
    assert_eq!(error["error"], "invalid_state");

    // Rematch: creator requests, bob accepts, the board resets with O to
    // open.
    let rematch_uri = format!("http://{address}/api/rooms/{room_id}/rematch");
    let (status, error) = send(&client, hyper::Method::POST, &rematch_uri, "bob", None).await;
    assert_eq!(status, hyper::StatusCode::FORBIDDEN);
    assert_eq!(error["error"], "not_authorized");

    let (status, event) = send(&client, hyper::Method::POST, &rematch_uri, "alice", None).await;
    assert_eq!(status, hyper::StatusCode::ACCEPTED);
    assert_eq!(event["type"], "rematch_requested");

    let (status, event) = send(
        &client,
        hyper::Method::POST,
        &format!("{rematch_uri}/response"),
        "bob",
        Some(json!({ "accept": true })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::ACCEPTED);
    assert_eq!(event["type"], "room_reset");
    assert_eq!(event["turn"], "o");

    let (_, snapshot) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "alice",
        Some(json!({})),
    )
    .await;
    assert!(snapshot["winner"].is_null());
    assert_eq!(snapshot["turn"], "o");
    assert!(snapshot["board"]
        .as_array()
        .expect("board array")
        .iter()
        .all(Value::is_null));

    // Only the creator can dissolve; afterwards the room is gone.
    let room_uri = format!("http://{address}/api/rooms/{room_id}");
    let (status, _) = send(&client, hyper::Method::DELETE, &room_uri, "bob", None).await;
    assert_eq!(status, hyper::StatusCode::FORBIDDEN);

    let (status, _) = send(&client, hyper::Method::DELETE, &room_uri, "alice", None).await;
    assert_eq!(status, hyper::StatusCode::NO_CONTENT);

    let (status, error) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "alice",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "room_not_found");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn bot_room_replies_within_one_request() {
    let server = WebServer::new(ServerConfig::for_tests());
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, created) = send(
        &client,
        hyper::Method::POST,
        &format!("http://{address}/api/rooms"),
        "alice",
        Some(json!({ "name": "Solo", "mode": "bot" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::CREATED);
    let room_id = created["id"].as_str().expect("room id").to_string();

    let join_uri = format!("http://{address}/api/rooms/{room_id}/join");
    let (status, snapshot) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "alice",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(snapshot["your_mark"], "x");
    assert_eq!(snapshot["players"]["o"], "__bot__");

    let (status, _) = send(
        &client,
        hyper::Method::POST,
        &format!("http://{address}/api/rooms/{room_id}/moves"),
        "alice",
        Some(json!({ "cell": 0 })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::ACCEPTED);

    // The bot's answer landed in the same request: two marks on the board
    // and the turn back with the human.
    let (_, snapshot) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "alice",
        Some(json!({})),
    )
    .await;
    let filled = snapshot["board"]
        .as_array()
        .expect("board array")
        .iter()
        .filter(|cell| !cell.is_null())
        .count();
    assert_eq!(filled, 2);
    assert_eq!(snapshot["turn"], "x");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn private_room_enforces_its_password() {
    let server = WebServer::new(ServerConfig::for_tests());
    let handle = server.start().await.expect("start server");
    let address = handle.address();
    let client = HyperClient::new();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, created) = send(
        &client,
        hyper::Method::POST,
        &format!("http://{address}/api/rooms"),
        "alice",
        Some(json!({
            "name": "Hideout",
            "visibility": "private",
            "password": "xyz"
        })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::CREATED);
    let room_id = created["id"].as_str().expect("room id").to_string();
    // The listing must not leak the password.
    assert!(created.get("password").is_none());

    let join_uri = format!("http://{address}/api/rooms/{room_id}/join");

    // Creator joins with no password at all.
    let (status, _) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "alice",
        Some(json!({})),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);

    let (status, error) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "bob",
        Some(json!({ "password": "wrong" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::FORBIDDEN);
    assert_eq!(error["error"], "access_denied");

    let (status, snapshot) = send(
        &client,
        hyper::Method::POST,
        &join_uri,
        "bob",
        Some(json!({ "password": "xyz" })),
    )
    .await;
    assert_eq!(status, hyper::StatusCode::OK);
    assert_eq!(snapshot["your_mark"], "o");

    handle.shutdown().await.expect("shutdown");
}
