//! Notification persistence and enrichment.

use std::sync::Arc;

use grapevine_database::{
    CreateNotificationRecord, Notification, NotificationError, NotificationKind,
    NotificationRepository, NotificationResult, User, UserError, UserRepository,
};
use sqlx::SqlitePool;
use tracing::debug;

use crate::follow_graph::FollowGraph;
use crate::types::{EnrichedNotification, NotifyRequest};

/// Largest accepted notification page.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Creates durable notification records and prepares them for delivery.
///
/// Persistence is unconditional: a notification is written whether or not
/// the recipient is connected. Deciding who is online and pushing the event
/// over a socket is the gateway's job, layered on top of this service.
///
/// Callers must suppress notifications where actor and recipient are the
/// same user (liking your own post); the service does not check for it.
pub struct NotificationService {
    users: UserRepository,
    notifications: NotificationRepository,
    follow_graph: Arc<dyn FollowGraph>,
}

impl NotificationService {
    pub fn new(pool: SqlitePool, follow_graph: Arc<dyn FollowGraph>) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            notifications: NotificationRepository::new(pool),
            follow_graph,
        }
    }

    /// Persist a notification and return it with its delivery enrichment.
    ///
    /// Follow notifications carry the relationship between recipient and
    /// actor as it stands right now, looked up after the write.
    pub async fn notify(
        &self,
        recipient_id: &str,
        actor_id: &str,
        request: NotifyRequest,
    ) -> NotificationResult<EnrichedNotification> {
        let recipient = self.require_user(recipient_id).await?;
        let actor = self.require_user(actor_id).await?;

        let notification = self
            .notifications
            .create(&CreateNotificationRecord {
                recipient_id: recipient.id,
                actor_id: actor.id,
                kind: request.kind,
                post_id: request.post_id,
                body: request.message,
                preview_image_url: request.preview_image_url,
            })
            .await?;

        self.enrich(notification, &recipient).await
    }

    /// A page of the recipient's notifications, newest first. `page` is
    /// 1-based. Follow rows are enriched against the follow graph as it
    /// stands at read time, not as it stood when the row was written.
    pub async fn notifications_for(
        &self,
        recipient_id: &str,
        page: u32,
        page_size: u32,
    ) -> NotificationResult<Vec<EnrichedNotification>> {
        let recipient = self.require_user(recipient_id).await?;

        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let rows = self
            .notifications
            .list_for_recipient(recipient.id, i64::from(page_size), offset)
            .await?;

        let mut enriched = Vec::with_capacity(rows.len());
        for notification in rows {
            enriched.push(self.enrich(notification, &recipient).await?);
        }
        Ok(enriched)
    }

    /// Mark all of the recipient's notifications read. Returns how many
    /// rows flipped; repeated calls return zero.
    pub async fn mark_all_read(&self, recipient_id: &str) -> NotificationResult<u64> {
        let recipient = self.require_user(recipient_id).await?;
        self.notifications.mark_all_read(recipient.id).await
    }

    /// Unread notification count for a recipient
    pub async fn unread_count(&self, recipient_id: &str) -> NotificationResult<i64> {
        let recipient = self.require_user(recipient_id).await?;
        self.notifications.unread_count(recipient.id).await
    }

    async fn enrich(
        &self,
        notification: Notification,
        recipient: &User,
    ) -> NotificationResult<EnrichedNotification> {
        let follow_status = if notification.kind == NotificationKind::Follow {
            let status = self
                .follow_graph
                .mutual_follow_status(recipient.id, notification.actor_id)
                .await?;
            debug!(
                notification_id = notification.id,
                is_following = status.is_following,
                is_followed = status.is_followed,
                "enriched follow notification"
            );
            Some(status)
        } else {
            None
        };

        Ok(EnrichedNotification {
            notification,
            recipient_public_id: recipient.public_id.clone(),
            follow_status,
        })
    }

    async fn require_user(&self, public_id: &str) -> NotificationResult<User> {
        match self.users.find_by_public_id(public_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(NotificationError::UserNotFound),
            Err(UserError::DatabaseError(e)) => Err(NotificationError::DatabaseError(e)),
            Err(e) => Err(NotificationError::DatabaseError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::follow_graph::{MutualFollowStatus, SqlFollowGraph};
    use async_trait::async_trait;
    use grapevine_config::DatabaseConfig;
    use grapevine_database::{initialize_database, CreateUserRequest, FollowRepository};
    use tempfile::TempDir;

    /// Follow graph that answers the same status for every pair.
    struct FixedFollowGraph {
        status: MutualFollowStatus,
    }

    #[async_trait]
    impl FollowGraph for FixedFollowGraph {
        async fn mutual_follow_status(
            &self,
            _user_a: i64,
            _user_b: i64,
        ) -> NotificationResult<MutualFollowStatus> {
            Ok(self.status)
        }
    }

    struct Fixture {
        pool: SqlitePool,
        ada: User,
        brian: User,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_notification_service.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };
        let pool = initialize_database(&config).await.unwrap();

        let users = UserRepository::new(pool.clone());
        let ada = users
            .create(&CreateUserRequest {
                username: "ada".to_string(),
                avatar_url: None,
            })
            .await
            .unwrap();
        let brian = users
            .create(&CreateUserRequest {
                username: "brian".to_string(),
                avatar_url: Some("https://cdn.example/brian.png".to_string()),
            })
            .await
            .unwrap();

        Fixture {
            pool,
            ada,
            brian,
            _temp_dir: temp_dir,
        }
    }

    fn sql_service(pool: &SqlitePool) -> NotificationService {
        NotificationService::new(pool.clone(), Arc::new(SqlFollowGraph::new(pool.clone())))
    }

    fn like_request() -> NotifyRequest {
        NotifyRequest {
            kind: NotificationKind::Like,
            post_id: Some("post-1".to_string()),
            message: "liked your post".to_string(),
            preview_image_url: Some("https://cdn.example/post-1.jpg".to_string()),
        }
    }

    fn follow_request() -> NotifyRequest {
        NotifyRequest {
            kind: NotificationKind::Follow,
            post_id: None,
            message: "started following you".to_string(),
            preview_image_url: None,
        }
    }

    #[tokio::test]
    async fn notify_persists_and_skips_enrichment_for_likes() {
        let f = fixture().await;
        let service = sql_service(&f.pool);

        let delivered = service
            .notify(&f.ada.public_id, &f.brian.public_id, like_request())
            .await
            .unwrap();

        assert_eq!(delivered.notification.actor_username, "brian");
        assert_eq!(delivered.recipient_public_id, f.ada.public_id);
        assert!(delivered.follow_status.is_none());
        assert_eq!(service.unread_count(&f.ada.public_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn follow_notification_reads_graph_at_emit_time() {
        let f = fixture().await;
        let service = sql_service(&f.pool);

        FollowRepository::new(f.pool.clone())
            .follow(f.brian.id, f.ada.id)
            .await
            .unwrap();

        let delivered = service
            .notify(&f.ada.public_id, &f.brian.public_id, follow_request())
            .await
            .unwrap();

        let status = delivered.follow_status.unwrap();
        assert!(!status.is_following, "recipient does not follow actor yet");
        assert!(status.is_followed, "actor follows recipient");
    }

    #[tokio::test]
    async fn read_side_enrichment_tracks_graph_changes() {
        let f = fixture().await;
        let service = sql_service(&f.pool);
        let follows = FollowRepository::new(f.pool.clone());

        follows.follow(f.brian.id, f.ada.id).await.unwrap();
        service
            .notify(&f.ada.public_id, &f.brian.public_id, follow_request())
            .await
            .unwrap();

        // Ada follows back after the notification was written.
        follows.follow(f.ada.id, f.brian.id).await.unwrap();

        let listed = service
            .notifications_for(&f.ada.public_id, 1, 10)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        let status = listed[0].follow_status.unwrap();
        assert!(status.is_following, "view reflects the follow-back");
        assert!(status.is_followed);
    }

    #[tokio::test]
    async fn enrichment_goes_through_the_graph_seam() {
        let f = fixture().await;
        let service = NotificationService::new(
            f.pool.clone(),
            Arc::new(FixedFollowGraph {
                status: MutualFollowStatus {
                    is_following: true,
                    is_followed: true,
                },
            }),
        );

        let delivered = service
            .notify(&f.ada.public_id, &f.brian.public_id, follow_request())
            .await
            .unwrap();
        assert_eq!(
            delivered.follow_status,
            Some(MutualFollowStatus {
                is_following: true,
                is_followed: true,
            })
        );

        // Non-follow kinds never consult the graph, fixed answer or not.
        let like = service
            .notify(&f.ada.public_id, &f.brian.public_id, like_request())
            .await
            .unwrap();
        assert!(like.follow_status.is_none());
    }

    #[tokio::test]
    async fn pages_are_newest_first() {
        let f = fixture().await;
        let service = sql_service(&f.pool);

        for i in 0..5 {
            let mut request = like_request();
            request.message = format!("liked your post {i}");
            service
                .notify(&f.ada.public_id, &f.brian.public_id, request)
                .await
                .unwrap();
        }

        let first = service
            .notifications_for(&f.ada.public_id, 1, 3)
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].notification.body, "liked your post 4");

        let second = service
            .notifications_for(&f.ada.public_id, 2, 3)
            .await
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].notification.body, "liked your post 0");
    }

    #[tokio::test]
    async fn mark_all_read_flips_once() {
        let f = fixture().await;
        let service = sql_service(&f.pool);

        service
            .notify(&f.ada.public_id, &f.brian.public_id, like_request())
            .await
            .unwrap();
        service
            .notify(&f.ada.public_id, &f.brian.public_id, like_request())
            .await
            .unwrap();

        assert_eq!(service.mark_all_read(&f.ada.public_id).await.unwrap(), 2);
        assert_eq!(service.mark_all_read(&f.ada.public_id).await.unwrap(), 0);
        assert_eq!(service.unread_count(&f.ada.public_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_users_are_rejected() {
        let f = fixture().await;
        let service = sql_service(&f.pool);

        let err = service
            .notify("nobody", &f.brian.public_id, like_request())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::UserNotFound));

        let err = service
            .notify(&f.ada.public_id, "nobody", like_request())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::UserNotFound));
    }
}
