//! Service-level notification types

use grapevine_database::{Notification, NotificationKind};

use crate::follow_graph::MutualFollowStatus;

/// Input for creating a notification
#[derive(Debug, Clone)]
pub struct NotifyRequest {
    pub kind: NotificationKind,
    /// Post the event happened on, when there is one.
    pub post_id: Option<String>,
    pub message: String,
    pub preview_image_url: Option<String>,
}

/// A stored notification together with the view-time data the wire payload
/// needs: the recipient's public id and, for follow notifications, the
/// current relationship between recipient and actor.
#[derive(Debug, Clone)]
pub struct EnrichedNotification {
    pub notification: Notification,
    pub recipient_public_id: String,
    /// Present only for follow notifications. `is_following` is
    /// recipient-to-actor, `is_followed` is actor-to-recipient.
    pub follow_status: Option<MutualFollowStatus>,
}
