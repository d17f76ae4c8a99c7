//! Message entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub public_id: String,
    pub chat_id: i64,
    pub chat_public_id: String,
    pub sender_id: i64,
    pub sender_public_id: String,
    pub body: String,
    pub kind: MessageKind,
    pub is_seen: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRecord {
    pub chat_id: i64,
    pub chat_public_id: String,
    pub sender_id: i64,
    pub sender_public_id: String,
    pub body: String,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Audio,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Audio => "audio",
        }
    }
}

impl From<&str> for MessageKind {
    fn from(s: &str) -> Self {
        match s {
            "audio" => MessageKind::Audio,
            _ => MessageKind::Text,
        }
    }
}

impl ToString for MessageKind {
    fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}
