//! Repository for chat data access operations.

use crate::entities::{Chat, ChatOverview};
use crate::types::{ChatError, ChatResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

const CHAT_COLUMNS: &str = "id, public_id, member_low, member_high, created_at, updated_at";

/// Repository for chat database operations
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    /// Create a new chat repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find chat by public ID
    pub async fn find_by_public_id(&self, public_id: &str) -> ChatResult<Option<Chat>> {
        let row = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::map_chat(&row)).transpose()
    }

    /// Find the chat for a normalized member pair
    pub async fn find_by_members(&self, member_low: i64, member_high: i64) -> ChatResult<Option<Chat>> {
        let row = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE member_low = ? AND member_high = ?"
        ))
        .bind(member_low)
        .bind(member_high)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::map_chat(&row)).transpose()
    }

    /// Fetch the chat for a member pair, creating it when absent.
    ///
    /// The pair must already be normalized (member_low < member_high). Two
    /// callers racing on first contact both land on the same row: the insert
    /// is a no-op for the loser and the follow-up select returns the winner's
    /// chat.
    pub async fn get_or_create(&self, member_low: i64, member_high: i64) -> ChatResult<Chat> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO chats (public_id, member_low, member_high, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (member_low, member_high) DO NOTHING",
        )
        .bind(&public_id)
        .bind(member_low)
        .bind(member_high)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 1 {
            info!(
                chat_id = result.last_insert_rowid(),
                public_id = %public_id,
                member_low,
                member_high,
                "created chat"
            );
        }

        self.find_by_members(member_low, member_high)
            .await?
            .ok_or(ChatError::ChatNotFound)
    }

    /// Conversation list for a user, newest activity first. Each row carries
    /// the peer's summary, a preview of the latest message, and how many
    /// unseen messages are waiting for the requesting user.
    pub async fn chats_for_user(&self, user_id: i64) -> ChatResult<Vec<ChatOverview>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id as chat_id, c.public_id as chat_public_id, c.updated_at,
                   u.public_id as peer_public_id, u.username as peer_username,
                   u.avatar_url as peer_avatar_url, u.is_online as peer_is_online,
                   (SELECT body FROM messages WHERE chat_id = c.id
                        ORDER BY created_at DESC, id DESC LIMIT 1) as last_message_body,
                   (SELECT kind FROM messages WHERE chat_id = c.id
                        ORDER BY created_at DESC, id DESC LIMIT 1) as last_message_kind,
                   (SELECT created_at FROM messages WHERE chat_id = c.id
                        ORDER BY created_at DESC, id DESC LIMIT 1) as last_message_at,
                   (SELECT COUNT(*) FROM messages WHERE chat_id = c.id
                        AND sender_id != ? AND is_seen = 0) as unread_count
            FROM chats c
            JOIN users u
              ON u.id = CASE WHEN c.member_low = ? THEN c.member_high ELSE c.member_low END
            WHERE c.member_low = ? OR c.member_high = ?
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::map_overview).collect()
    }

    fn map_chat(row: &SqliteRow) -> ChatResult<Chat> {
        Ok(Chat {
            id: row
                .try_get("id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            public_id: row
                .try_get("public_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            member_low: row
                .try_get("member_low")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            member_high: row
                .try_get("member_high")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
        })
    }

    fn map_overview(row: &SqliteRow) -> ChatResult<ChatOverview> {
        Ok(ChatOverview {
            chat_id: row
                .try_get("chat_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            chat_public_id: row
                .try_get("chat_public_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            peer_public_id: row
                .try_get("peer_public_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            peer_username: row
                .try_get("peer_username")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            peer_avatar_url: row
                .try_get("peer_avatar_url")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            peer_is_online: row
                .try_get("peer_is_online")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            last_message_body: row
                .try_get("last_message_body")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            last_message_kind: row
                .try_get("last_message_kind")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            last_message_at: row
                .try_get("last_message_at")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            unread_count: row
                .try_get("unread_count")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
        })
    }
}
