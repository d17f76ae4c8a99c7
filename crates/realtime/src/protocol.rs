//! The socket event catalog.
//!
//! Events are JSON objects tagged by a camelCase `type` field, with camelCase
//! payload fields. [`ClientEvent`] is everything a connection may send us,
//! [`ServerEvent`] everything we push back. Unknown client types fail to
//! parse and are answered with an `error` event rather than dropping the
//! connection.

use serde::{Deserialize, Serialize};

use crate::wire::{CommentPayload, MessagePayload, NotificationPayload};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Binds the connection to a user and registers a presence device.
    UserConnected { user_id: String },
    /// Asks for a fresh snapshot of everyone currently online.
    RequestOnlineUsers,
    JoinChat { chat_id: String },
    LeaveChat { chat_id: String },
    SendMessage {
        chat_id: String,
        sender_id: String,
        text: String,
        #[serde(default)]
        kind: Option<String>,
    },
    /// Marks every unseen message addressed to `receiver_id` in the chat.
    MessageSeen {
        chat_id: String,
        receiver_id: String,
    },
    Typing {
        chat_id: String,
        sender_id: String,
    },
    StopTyping {
        chat_id: String,
        sender_id: String,
    },
    JoinPost { post_id: String },
    LeavePost { post_id: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    ReceiveMessage {
        chat_id: String,
        message: MessagePayload,
    },
    MessageSeen {
        chat_id: String,
        seen_by: String,
    },
    UserTyping {
        chat_id: String,
        sender_id: String,
    },
    UserStoppedTyping {
        chat_id: String,
        sender_id: String,
    },
    UserOnline { user_id: String },
    UserOffline {
        user_id: String,
        last_active: String,
    },
    OnlineUsers {
        user_ids: Vec<String>,
    },
    Notification {
        notification: NotificationPayload,
    },
    NewComment {
        post_id: String,
        comment: CommentPayload,
    },
    NewReply {
        post_id: String,
        comment: CommentPayload,
    },
    CommentSoftDeleted {
        post_id: String,
        comment_id: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
