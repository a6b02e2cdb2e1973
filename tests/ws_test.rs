//! Integration tests for WebSocket auth, presence events, and the
//! single-session-per-user policy.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use tienda_server::directory::SqliteUserDirectory;
use tienda_server::ws::registry::ConnectionRegistry;

type WsRead = futures_util::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Helper: start the server on a random port and return (base_url, addr, db).
async fn start_test_server() -> (String, SocketAddr, tienda_server::db::DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = tienda_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = tienda_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let registry = Arc::new(ConnectionRegistry::new(Arc::new(SqliteUserDirectory::new(
        db.clone(),
    ))));

    let state = tienda_server::state::AppState {
        db: db.clone(),
        jwt_secret,
        registry,
    };

    let app = tienda_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr, db)
}

/// Register a user and return (access_token, user_id).
async fn register_user(base_url: &str, email: &str, full_name: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "email": email,
            "password": "Secret123",
            "full_name": full_name,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201, "Registration failed for {}", email);
    let body: serde_json::Value = resp.json().await.unwrap();
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["user_id"].as_str().unwrap().to_string(),
    )
}

/// Read frames until a JSON event with the given type arrives.
/// Panics if nothing matching shows up within 2 seconds.
async fn wait_for_event(read: &mut WsRead, event_type: &str) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .unwrap_or_else(|_| panic!("Timed out waiting for '{}' event", event_type))
            .expect("Stream ended while waiting for event")
            .expect("WebSocket error while waiting for event");

        if let Message::Text(text) = msg {
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            if value["type"] == event_type {
                return value;
            }
        }
    }
}

/// Read frames until a Close arrives; returns its code (0 when absent).
async fn wait_for_close(read: &mut WsRead) -> u16 {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timed out waiting for close frame")
        {
            Some(Ok(Message::Close(Some(frame)))) => return frame.code.into(),
            Some(Ok(Message::Close(None))) | None => return 0,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return 0,
        }
    }
}

#[tokio::test]
async fn test_ws_connection_with_valid_jwt_gets_session_list() {
    let (base_url, addr, _db) = start_test_server().await;
    let (token, _user_id) = register_user(&base_url, "ada@example.com", "Ada Lovelace").await;

    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    let (mut _write, mut read) = ws_stream.split();

    let event = wait_for_event(&mut read, "clients-updated").await;
    assert_eq!(event["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ws_auth_failure_invalid_token() {
    let (_base_url, addr, _db) = start_test_server().await;

    let ws_url = format!("ws://{}/ws?token=invalid_jwt_token", addr);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WebSocket should upgrade even with invalid token");
    let (mut _write, mut read) = ws_stream.split();

    let code = wait_for_close(&mut read).await;
    assert!(
        code == 4002 || code == 0,
        "Expected close code 4002 (token invalid), got {}",
        code
    );
}

#[tokio::test]
async fn test_ws_inactive_user_is_rejected() {
    let (base_url, addr, db) = start_test_server().await;
    let (token, _user_id) = register_user(&base_url, "dormant@example.com", "Grace Hopper").await;

    // Deactivate after the token was issued: the directory check at
    // registration is what must catch it.
    {
        let conn = db.lock().unwrap();
        conn.execute(
            "UPDATE users SET is_active = 0 WHERE email = 'dormant@example.com'",
            [],
        )
        .unwrap();
    }

    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect");
    let (mut _write, mut read) = ws_stream.split();

    let code = wait_for_close(&mut read).await;
    assert_eq!(code, 4006, "Expected close code 4006 (registration rejected)");
}

#[tokio::test]
async fn test_second_login_evicts_first_session() {
    let (base_url, addr, _db) = start_test_server().await;
    let (token, _user_id) = register_user(&base_url, "ada@example.com", "Ada Lovelace").await;
    let ws_url = format!("ws://{}/ws?token={}", addr, token);

    // First session
    let (stream_a, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect first session");
    let (mut _write_a, mut read_a) = stream_a.split();
    let event = wait_for_event(&mut read_a, "clients-updated").await;
    assert_eq!(event["sessions"].as_array().unwrap().len(), 1);

    // Second session for the same user displaces the first
    let (stream_b, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect second session");
    let (mut _write_b, mut read_b) = stream_b.split();

    let code = wait_for_close(&mut read_a).await;
    assert_eq!(code, 4005, "Expected close code 4005 (session replaced)");

    // The survivor sees exactly one live session
    let event = wait_for_event(&mut read_b, "clients-updated").await;
    assert_eq!(event["sessions"].as_array().unwrap().len(), 1);

    // And the presence endpoint agrees
    let client = reqwest::Client::new();
    let presence: serde_json::Value = client
        .get(format!("{}/api/presence", base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = presence.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["display_name"], "Ada Lovelace");
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let (base_url, addr, _db) = start_test_server().await;
    let (token, _user_id) = register_user(&base_url, "ada@example.com", "Ada Lovelace").await;

    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect");
    let (mut write, mut read) = ws_stream.split();

    wait_for_event(&mut read, "clients-updated").await;

    write
        .send(Message::Ping(vec![42, 43, 44].into()))
        .await
        .expect("Failed to send ping");

    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Expected pong within timeout")
            .unwrap()
            .unwrap();
        match msg {
            Message::Pong(data) => {
                assert_eq!(data.as_ref(), &[42, 43, 44], "Pong data should match ping");
                break;
            }
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_chat_message_is_relayed_with_display_name() {
    let (base_url, addr, _db) = start_test_server().await;
    let (token_a, _) = register_user(&base_url, "ada@example.com", "Ada Lovelace").await;
    let (token_b, _) = register_user(&base_url, "alan@example.com", "Alan Turing").await;

    let (stream_a, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws?token={}",
        addr, token_a
    ))
    .await
    .expect("Failed to connect A");
    let (mut _write_a, mut read_a) = stream_a.split();
    wait_for_event(&mut read_a, "clients-updated").await;

    let (stream_b, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws?token={}",
        addr, token_b
    ))
    .await
    .expect("Failed to connect B");
    let (mut write_b, mut read_b) = stream_b.split();
    wait_for_event(&mut read_b, "clients-updated").await;

    // Two distinct users online at once
    let event = wait_for_event(&mut read_a, "clients-updated").await;
    assert_eq!(event["sessions"].as_array().unwrap().len(), 2);

    write_b
        .send(Message::Text(
            json!({ "type": "message-from-client", "message": "hola!" })
                .to_string()
                .into(),
        ))
        .await
        .expect("Failed to send chat message");

    let event = wait_for_event(&mut read_a, "message-from-server").await;
    assert_eq!(event["full_name"], "Alan Turing");
    assert_eq!(event["message"], "hola!");

    // Sender hears the fan-out too
    let event = wait_for_event(&mut read_b, "message-from-server").await;
    assert_eq!(event["full_name"], "Alan Turing");
}

#[tokio::test]
async fn test_disconnect_updates_presence() {
    let (base_url, addr, _db) = start_test_server().await;
    let (token_a, _) = register_user(&base_url, "ada@example.com", "Ada Lovelace").await;
    let (token_b, _) = register_user(&base_url, "alan@example.com", "Alan Turing").await;

    let (stream_a, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws?token={}",
        addr, token_a
    ))
    .await
    .unwrap();
    let (mut write_a, mut read_a) = stream_a.split();
    wait_for_event(&mut read_a, "clients-updated").await;

    let (stream_b, _) = tokio_tungstenite::connect_async(&format!(
        "ws://{}/ws?token={}",
        addr, token_b
    ))
    .await
    .unwrap();
    let (mut _write_b, mut read_b) = stream_b.split();
    wait_for_event(&mut read_b, "clients-updated").await;

    // A closes; B should observe the session list shrink back to one
    write_a.send(Message::Close(None)).await.unwrap();

    loop {
        let event = wait_for_event(&mut read_b, "clients-updated").await;
        if event["sessions"].as_array().unwrap().len() == 1 {
            break;
        }
    }

    let client = reqwest::Client::new();
    let presence: serde_json::Value = client
        .get(format!("{}/api/presence", base_url))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entries = presence.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["display_name"], "Alan Turing");
}
