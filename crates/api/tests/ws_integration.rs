//! Integration tests for the `/ws` real-time channel.
//!
//! Each test serves the full router on an ephemeral port and talks to it with
//! a real WebSocket client.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use common::{TestApp, TestUser};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn open(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    client
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

/// Connects and authenticates as `user`, returning the catch-up frame.
async fn open_as(addr: SocketAddr, user: &TestUser) -> (Client, Value) {
    let mut client = open(addr).await;
    send_json(
        &mut client,
        json!({ "type": "auth", "userId": user.id, "token": user.token }),
    )
    .await;
    let catch_up = next_json(&mut client).await;
    assert_eq!(catch_up["type"], "notifications");
    (client, catch_up)
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(_) => panic!("socket closed while waiting for a frame"),
            _ => continue,
        }
    }
}

/// Next frame of the given `type`, skipping others.
async fn next_of_type(client: &mut Client, kind: &str) -> Value {
    loop {
        let frame = next_json(client).await;
        if frame["type"] == kind {
            return frame;
        }
    }
}

async fn expect_closed(client: &mut Client) {
    loop {
        let frame = tokio::time::timeout(FRAME_TIMEOUT, client.next())
            .await
            .expect("socket left open");
        match frame {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(Message::Text(text))) => panic!("unexpected frame: {}", text),
            Some(Ok(_)) => continue,
        }
    }
}

async fn wait_until_disconnected(app: &TestApp, user_id: i64) {
    let registry = app.state.notifications.registry();
    for _ in 0..100 {
        if !registry.is_connected(user_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("user {} still registered", user_id);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_hello_for_another_user_is_rejected() {
    let app = TestApp::new();
    let addr = serve(&app).await;
    let user = app.register_asm().await;
    let other = app.register_asm().await;

    let mut client = open(addr).await;
    send_json(
        &mut client,
        json!({ "type": "auth", "userId": other.id, "token": user.token }),
    )
    .await;

    let frame = next_json(&mut client).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["message"], "Authentication failed");
    expect_closed(&mut client).await;

    assert!(!app.state.notifications.registry().is_connected(user.id));
    assert!(!app.state.notifications.registry().is_connected(other.id));
}

#[tokio::test]
async fn test_hello_without_token_is_rejected() {
    let app = TestApp::new();
    let addr = serve(&app).await;
    let user = app.register_asm().await;

    let mut client = open(addr).await;
    send_json(&mut client, json!({ "type": "auth", "userId": user.id })).await;

    let frame = next_json(&mut client).await;
    assert_eq!(frame["type"], "error");
    expect_closed(&mut client).await;
    assert_eq!(app.state.notifications.registry().connection_count(), 0);
}

#[tokio::test]
async fn test_silent_socket_times_out() {
    let app = TestApp::with_overrides(&[("websocket.auth_timeout_secs", "1")]);
    let addr = serve(&app).await;

    let mut client = open(addr).await;

    let frame = next_json(&mut client).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["message"], "Authentication timed out");
    expect_closed(&mut client).await;
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn test_hello_sends_unread_catch_up() {
    let app = TestApp::new();
    let addr = serve(&app).await;
    let admin = app.create_admin().await;
    let user = app.register_asm().await;
    let complaint = app.submit_complaint(&user).await;

    let (_client, catch_up) = open_as(addr, &admin).await;

    let unread = catch_up["data"].as_array().unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0]["title"], "New Complaint Received");
    assert_eq!(unread[0]["complaintId"], complaint["id"]);
    assert!(app.state.notifications.registry().is_connected(admin.id));
}

#[tokio::test]
async fn test_transition_pushes_live_notification_to_owner() {
    let app = TestApp::new();
    let addr = serve(&app).await;
    let admin = app.create_admin().await;
    let owner = app.register_asm().await;
    let bystander = app.register_asm().await;
    let id = app.submit_complaint(&owner).await["id"].as_i64().unwrap();

    let (mut owner_client, catch_up) = open_as(addr, &owner).await;
    assert!(catch_up["data"].as_array().unwrap().is_empty());
    let (mut bystander_client, _) = open_as(addr, &bystander).await;

    let (status, _) = app
        .patch(
            &format!("/api/complaints/{}", id),
            json!({ "status": "resolved" }),
            Some(&admin.token),
        )
        .await;
    assert_eq!(status, axum::http::StatusCode::OK);

    let frame = next_of_type(&mut owner_client, "new_notification").await;
    assert_eq!(frame["data"]["title"], "Complaint Status Updated");
    assert_eq!(frame["data"]["complaintId"], id);
    assert_eq!(frame["data"]["isRead"], false);

    let frame = next_of_type(&mut owner_client, "complaint_update").await;
    assert_eq!(frame["action"], "status_changed");
    assert_eq!(frame["data"]["status"], "resolved");

    // Someone else's complaint never reaches this socket
    let quiet = tokio::time::timeout(Duration::from_millis(300), bystander_client.next()).await;
    assert!(quiet.is_err(), "bystander received {:?}", quiet);
}

#[tokio::test]
async fn test_close_unregisters_connection() {
    let app = TestApp::new();
    let addr = serve(&app).await;
    let user = app.register_asm().await;

    let (mut client, _) = open_as(addr, &user).await;
    assert!(app.state.notifications.registry().is_connected(user.id));

    client.close(None).await.unwrap();
    wait_until_disconnected(&app, user.id).await;
    assert_eq!(app.state.notifications.registry().connection_count(), 0);
}

#[tokio::test]
async fn test_two_sockets_for_one_user_each_get_a_copy() {
    let app = TestApp::new();
    let addr = serve(&app).await;
    let admin = app.create_admin().await;
    let user = app.register_asm().await;

    let (mut first, _) = open_as(addr, &admin).await;
    let (mut second, _) = open_as(addr, &admin).await;
    assert_eq!(app.state.notifications.registry().connection_count(), 2);

    app.submit_complaint(&user).await;

    for client in [&mut first, &mut second] {
        let frame = next_of_type(client, "new_notification").await;
        assert_eq!(frame["data"]["title"], "New Complaint Received");
    }

    // Dropping one socket leaves the other registered
    first.close(None).await.unwrap();
    for _ in 0..100 {
        if app.state.notifications.registry().connection_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(app.state.notifications.registry().connection_count(), 1);
    assert!(app.state.notifications.registry().is_connected(admin.id));
}
