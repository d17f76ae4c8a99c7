//! Notification fan-out: persist first, then push to connected devices.
//!
//! Domain events arrive here from whatever surface observed them (a like, a
//! comment, a follow). Each one is stored through the notification service
//! and then, if the recipient has live connections, pushed to every one of
//! them. An offline recipient is not an error; the record waits in their
//! notification list.

use std::sync::Arc;

use tracing::{debug, info};

use grapevine_notifications::{
    EnrichedNotification, NotificationKind, NotificationResult, NotificationService, NotifyRequest,
};
use grapevine_presence::PresenceRegistry;

use crate::hub::Hub;
use crate::protocol::ServerEvent;
use crate::wire::NotificationPayload;

/// Something that happened in the application that may notify a user.
/// All ids are public ids.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    PostLiked {
        post_id: String,
        post_owner_id: String,
        actor_id: String,
        preview_image_url: Option<String>,
    },
    CommentCreated {
        post_id: String,
        post_owner_id: String,
        actor_id: String,
        preview_image_url: Option<String>,
    },
    UserFollowed {
        followee_id: String,
        follower_id: String,
    },
}

impl DomainEvent {
    /// (recipient, actor, what to store) for this event.
    fn into_parts(self) -> (String, String, NotifyRequest) {
        match self {
            DomainEvent::PostLiked {
                post_id,
                post_owner_id,
                actor_id,
                preview_image_url,
            } => (
                post_owner_id,
                actor_id,
                NotifyRequest {
                    kind: NotificationKind::Like,
                    post_id: Some(post_id),
                    message: "liked your post".to_string(),
                    preview_image_url,
                },
            ),
            DomainEvent::CommentCreated {
                post_id,
                post_owner_id,
                actor_id,
                preview_image_url,
            } => (
                post_owner_id,
                actor_id,
                NotifyRequest {
                    kind: NotificationKind::Comment,
                    post_id: Some(post_id),
                    message: "commented on your post".to_string(),
                    preview_image_url,
                },
            ),
            DomainEvent::UserFollowed {
                followee_id,
                follower_id,
            } => (
                followee_id,
                follower_id,
                NotifyRequest {
                    kind: NotificationKind::Follow,
                    post_id: None,
                    message: "started following you".to_string(),
                    preview_image_url: None,
                },
            ),
        }
    }
}

pub struct NotificationFanout {
    notifications: Arc<NotificationService>,
    presence: Arc<PresenceRegistry>,
    hub: Arc<Hub>,
}

impl NotificationFanout {
    pub fn new(
        notifications: Arc<NotificationService>,
        presence: Arc<PresenceRegistry>,
        hub: Arc<Hub>,
    ) -> Self {
        Self {
            notifications,
            presence,
            hub,
        }
    }

    /// Runs one event through the pipeline. Returns the stored notification,
    /// or `None` when the event notifies its own actor and is suppressed.
    pub async fn handle(&self, event: DomainEvent) -> NotificationResult<Option<EnrichedNotification>> {
        let (recipient_id, actor_id, request) = event.into_parts();

        if recipient_id == actor_id {
            debug!(user_id = %recipient_id, "suppressing self notification");
            return Ok(None);
        }

        let enriched = self
            .notifications
            .notify(&recipient_id, &actor_id, request)
            .await?;

        let connections = self.presence.connections_for(&recipient_id).await;
        if connections.is_empty() {
            debug!(recipient_id = %recipient_id, "recipient offline, stored only");
            return Ok(Some(enriched));
        }

        let payload = NotificationPayload::from(enriched.clone());
        self.hub
            .send_to_connections(
                &connections,
                ServerEvent::Notification {
                    notification: payload,
                },
            )
            .await;
        info!(
            recipient_id = %recipient_id,
            devices = connections.len(),
            "delivered notification"
        );

        Ok(Some(enriched))
    }
}
