//! Real-time channel.
//!
//! `GET /ws` upgrades to a WebSocket. The client must open with
//! `{"type":"auth","userId":..,"token":".."}`; only then is the connection
//! registered and sent its unread notifications. Afterwards the socket only
//! carries server pushes drained from the connection's queue. A socket that
//! has not authenticated within `websocket.auth_timeout_secs` is closed.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use domain::models::realtime::{ClientMessage, ServerMessage};
use domain::services::ConnectionHandle;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};

use crate::app::AppState;
use crate::middleware::UserAuth;

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let auth_timeout = state.config.websocket.auth_timeout();
    let user_id = match tokio::time::timeout(auth_timeout, authenticate(&state, &mut receiver)).await
    {
        Ok(Ok(user_id)) => user_id,
        Ok(Err(reason)) => {
            tracing::debug!(reason, "WebSocket authentication failed");
            reject(&mut sender, "Authentication failed").await;
            return;
        }
        Err(_) => {
            tracing::debug!("WebSocket closed before authenticating");
            reject(&mut sender, "Authentication timed out").await;
            return;
        }
    };

    let (handle, mut rx) = ConnectionHandle::channel(state.config.websocket.queue_capacity);
    let connection_id = handle.id();

    if let Err(e) = state.notifications.connect(user_id, handle).await {
        // Registered already; live pushes still flow without the catch-up burst.
        tracing::error!(user_id, %connection_id, error = %e, "Catch-up burst failed");
    }
    tracing::info!(user_id, %connection_id, "WebSocket connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Ping) => {}
                    Ok(ClientMessage::Auth { .. }) => {
                        tracing::debug!(user_id, "Ignoring repeated auth message");
                    }
                    Err(e) => tracing::debug!(user_id, error = %e, "Unreadable client message"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either side to finish, then stop the other
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.notifications.disconnect(connection_id);
    tracing::info!(user_id, %connection_id, "WebSocket disconnected");
}

/// Reads frames until the hello arrives. The token must be valid and name the
/// same user the hello claims.
async fn authenticate(state: &AppState, receiver: &mut WsReceiver) -> Result<i64, &'static str> {
    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => return Err("closed"),
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Auth { user_id, token }) => {
                let token = token.ok_or("missing token")?;
                let auth = UserAuth::validate(&state.jwt, &token).map_err(|_| "invalid token")?;
                return if auth.user_id == user_id {
                    Ok(user_id)
                } else {
                    Err("token does not match user")
                };
            }
            Ok(ClientMessage::Ping) => continue,
            Err(_) => return Err("malformed hello"),
        }
    }
    Err("closed")
}

async fn reject(sender: &mut WsSender, message: &str) {
    let frame = ServerMessage::Error {
        message: message.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&frame) {
        let _ = sender.send(Message::Text(json)).await;
    }
    let _ = sender.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_deserialize() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"auth","userId":7,"token":"abc"}"#).unwrap();
        match msg {
            ClientMessage::Auth { user_id, token } => {
                assert_eq!(user_id, 7);
                assert_eq!(token.as_deref(), Some("abc"));
            }
            other => panic!("Expected Auth, got {:?}", other),
        }
    }

    #[test]
    fn test_hello_without_token_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"auth","userId":7}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Auth { token: None, .. }));
    }
}
