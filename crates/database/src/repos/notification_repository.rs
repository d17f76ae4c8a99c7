//! Repository for notification data access operations.

use crate::entities::{CreateNotificationRecord, Notification, NotificationKind};
use crate::types::{NotificationError, NotificationResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

const NOTIFICATION_SELECT: &str = r#"
    SELECT n.id, n.public_id, n.recipient_id, n.actor_id,
           u.public_id as actor_public_id, u.username as actor_username,
           u.avatar_url as actor_avatar_url,
           n.kind, n.post_id, n.body, n.preview_image_url, n.is_read, n.created_at
    FROM notifications n
    JOIN users u ON u.id = n.actor_id
"#;

/// Repository for notification database operations
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    /// Create a new notification repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a notification. Always written, whether or not the recipient
    /// is currently connected.
    pub async fn create(&self, record: &CreateNotificationRecord) -> NotificationResult<Notification> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO notifications
                 (public_id, recipient_id, actor_id, kind, post_id, body, preview_image_url, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&public_id)
        .bind(record.recipient_id)
        .bind(record.actor_id)
        .bind(record.kind.as_str())
        .bind(&record.post_id)
        .bind(&record.body)
        .bind(&record.preview_image_url)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        let notification_id = result.last_insert_rowid();

        info!(
            notification_id,
            public_id = %public_id,
            recipient_id = record.recipient_id,
            actor_id = record.actor_id,
            kind = record.kind.as_str(),
            "created notification"
        );

        self.find_by_id(notification_id)
            .await?
            .ok_or(NotificationError::NotificationNotFound)
    }

    /// Page of a recipient's notifications, newest first
    pub async fn list_for_recipient(
        &self,
        recipient_id: i64,
        limit: i64,
        offset: i64,
    ) -> NotificationResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "{NOTIFICATION_SELECT}
             WHERE n.recipient_id = ?
             ORDER BY n.created_at DESC, n.id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(recipient_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::map_notification).collect()
    }

    /// Mark every unread notification for the recipient as read.
    /// Idempotent; returns how many rows flipped.
    pub async fn mark_all_read(&self, recipient_id: i64) -> NotificationResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1 WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        let updated = result.rows_affected();
        if updated > 0 {
            info!(recipient_id, updated, "marked notifications read");
        }

        Ok(updated)
    }

    /// Count of unread notifications for a recipient
    pub async fn unread_count(&self, recipient_id: i64) -> NotificationResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ? AND is_read = 0",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    async fn find_by_id(&self, id: i64) -> NotificationResult<Option<Notification>> {
        let row = sqlx::query(&format!("{NOTIFICATION_SELECT} WHERE n.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::map_notification).transpose()
    }

    fn map_notification(row: &SqliteRow) -> NotificationResult<Notification> {
        let kind_str: String = row
            .try_get("kind")
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(Notification {
            id: row
                .try_get("id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            public_id: row
                .try_get("public_id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            recipient_id: row
                .try_get("recipient_id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            actor_id: row
                .try_get("actor_id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            actor_public_id: row
                .try_get("actor_public_id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            actor_username: row
                .try_get("actor_username")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            actor_avatar_url: row
                .try_get("actor_avatar_url")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            kind: NotificationKind::from(kind_str.as_str()),
            post_id: row
                .try_get("post_id")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            body: row
                .try_get("body")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            preview_image_url: row
                .try_get("preview_image_url")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            is_read: row
                .try_get("is_read")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| NotificationError::DatabaseError(e.to_string()))?,
        })
    }
}
