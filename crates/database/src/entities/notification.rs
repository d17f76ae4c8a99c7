//! Notification entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub public_id: String,
    pub recipient_id: i64,
    pub actor_id: i64,
    pub actor_public_id: String,
    pub actor_username: String,
    pub actor_avatar_url: Option<String>,
    pub kind: NotificationKind,
    pub post_id: Option<String>,
    pub body: String,
    pub preview_image_url: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRecord {
    pub recipient_id: i64,
    pub actor_id: i64,
    pub kind: NotificationKind,
    pub post_id: Option<String>,
    pub body: String,
    pub preview_image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Follow => "follow",
        }
    }
}

impl From<&str> for NotificationKind {
    fn from(s: &str) -> Self {
        match s {
            "comment" => NotificationKind::Comment,
            "follow" => NotificationKind::Follow,
            _ => NotificationKind::Like,
        }
    }
}

impl ToString for NotificationKind {
    fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}
