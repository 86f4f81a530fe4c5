//! Messages exchanged over the real-time channel.

use serde::{Deserialize, Serialize};

use super::complaint::Complaint;
use super::notification::Notification;

/// What happened to a complaint in a `complaint_update` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintAction {
    Created,
    Updated,
    StatusChanged,
}

/// Server → client frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Catch-up burst of unread notifications sent right after authentication.
    Notifications { data: Vec<Notification> },
    NewNotification { data: Notification },
    ComplaintUpdate {
        action: ComplaintAction,
        data: Complaint,
    },
    Error { message: String },
}

/// Client → server frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Auth {
        #[serde(rename = "userId")]
        user_id: i64,
        #[serde(default)]
        token: Option<String>,
    },
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationKind;
    use chrono::Utc;

    #[test]
    fn test_new_notification_frame() {
        let msg = ServerMessage::NewNotification {
            data: Notification {
                id: 3,
                user_id: 4,
                complaint_id: Some(8),
                title: "Complaint Status Updated".into(),
                message: "m".into(),
                kind: NotificationKind::StatusUpdate,
                is_read: false,
                created_at: Utc::now(),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "new_notification");
        assert_eq!(json["data"]["id"], 3);
    }

    #[test]
    fn test_catch_up_and_error_frames() {
        let json = serde_json::to_value(ServerMessage::Notifications { data: vec![] }).unwrap();
        assert_eq!(json["type"], "notifications");
        assert!(json["data"].as_array().unwrap().is_empty());

        let json = serde_json::to_value(ServerMessage::Error {
            message: "Authentication failed".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn test_client_auth_frame() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"auth","userId":12,"token":"abc"}"#).unwrap();
        match msg {
            ClientMessage::Auth { user_id, token } => {
                assert_eq!(user_id, 12);
                assert_eq!(token.as_deref(), Some("abc"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"auth","userId":12}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Auth { token: None, .. }));

        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        ));
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
