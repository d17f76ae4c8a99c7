//! Wire payloads shared by the socket protocol and the REST surface.
//!
//! Everything here serializes with camelCase field names; entity ids are the
//! public identifiers, never database rowids. Enum-typed columns cross the
//! wire as plain strings so both surfaces stay schema-friendly.

use grapevine_database::{ChatOverview, Comment, Message};
use grapevine_notifications::EnrichedNotification;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    pub kind: String,
    pub is_seen: bool,
    pub created_at: String,
}

impl From<Message> for MessagePayload {
    fn from(message: Message) -> Self {
        Self {
            id: message.public_id,
            chat_id: message.chat_public_id,
            sender_id: message.sender_public_id,
            text: message.body,
            kind: message.kind.as_str().to_string(),
            is_seen: message.is_seen,
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub id: String,
    pub members: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One entry of a user's conversation list
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatOverviewPayload {
    pub chat_id: String,
    pub peer_id: String,
    pub peer_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_avatar_url: Option<String>,
    pub peer_is_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<String>,
    pub unread_count: i64,
    pub updated_at: String,
}

impl From<ChatOverview> for ChatOverviewPayload {
    fn from(overview: ChatOverview) -> Self {
        Self {
            chat_id: overview.chat_public_id,
            peer_id: overview.peer_public_id,
            peer_username: overview.peer_username,
            peer_avatar_url: overview.peer_avatar_url,
            peer_is_online: overview.peer_is_online,
            last_message_text: overview.last_message_body,
            last_message_kind: overview.last_message_kind,
            last_message_at: overview.last_message_at,
            unread_count: overview.unread_count,
            updated_at: overview.updated_at,
        }
    }
}

/// A notification as delivered to its recipient. The two follow flags are
/// present together on follow notifications and absent otherwise; they
/// reflect the follow graph at the moment the payload was built.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: String,
    pub recipient_id: String,
    pub actor_id: String,
    pub actor_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_avatar_url: Option<String>,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_post_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_preview_image: Option<String>,
    pub is_read: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_actor_following_recipient: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_recipient_following_actor: Option<bool>,
}

impl From<EnrichedNotification> for NotificationPayload {
    fn from(enriched: EnrichedNotification) -> Self {
        let notification = enriched.notification;
        Self {
            id: notification.public_id,
            recipient_id: enriched.recipient_public_id,
            actor_id: notification.actor_public_id,
            actor_username: notification.actor_username,
            actor_avatar_url: notification.actor_avatar_url,
            kind: notification.kind.as_str().to_string(),
            target_post_id: notification.post_id,
            message: notification.body,
            target_preview_image: notification.preview_image_url,
            is_read: notification.is_read,
            created_at: notification.created_at,
            is_actor_following_recipient: enriched.follow_status.map(|s| s.is_followed),
            is_recipient_following_actor: enriched.follow_status.map(|s| s.is_following),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub text: String,
    pub is_deleted: bool,
    pub created_at: String,
}

impl From<Comment> for CommentPayload {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.public_id,
            post_id: comment.post_id,
            author_id: comment.author_public_id,
            author_username: comment.author_username,
            author_avatar_url: comment.author_avatar_url,
            parent_id: comment.parent_public_id,
            text: comment.body,
            is_deleted: comment.is_deleted,
            created_at: comment.created_at,
        }
    }
}
