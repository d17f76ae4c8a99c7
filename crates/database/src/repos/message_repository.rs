//! Repository for message data access operations.

use crate::entities::{CreateMessageRecord, Message, MessageKind};
use crate::types::{ChatError, ChatResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.public_id, m.chat_id, c.public_id as chat_public_id,
           m.sender_id, u.public_id as sender_public_id,
           m.body, m.kind, m.is_seen, m.created_at
    FROM messages m
    JOIN chats c ON c.id = m.chat_id
    JOIN users u ON u.id = m.sender_id
"#;

/// Repository for message database operations
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message and bump the chat's activity timestamp in one
    /// transaction. The stored timestamp is assigned here, never taken
    /// from the client.
    pub async fn create(&self, record: &CreateMessageRecord) -> ChatResult<Message> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO messages (public_id, chat_id, sender_id, body, kind, is_seen, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&public_id)
        .bind(record.chat_id)
        .bind(record.sender_id)
        .bind(&record.body)
        .bind(record.kind.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(record.chat_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        let message_id = result.last_insert_rowid();

        info!(
            message_id,
            public_id = %public_id,
            chat_id = record.chat_id,
            sender_id = record.sender_id,
            kind = record.kind.as_str(),
            "created message"
        );

        Ok(Message {
            id: message_id,
            public_id,
            chat_id: record.chat_id,
            chat_public_id: record.chat_public_id.clone(),
            sender_id: record.sender_id,
            sender_public_id: record.sender_public_id.clone(),
            body: record.body.clone(),
            kind: record.kind,
            is_seen: false,
            created_at: now,
        })
    }

    /// Page of messages for a chat, newest first. Ties on the stored
    /// timestamp break on the insert order.
    pub async fn list_page(&self, chat_id: i64, limit: i64, offset: i64) -> ChatResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "{MESSAGE_SELECT}
             WHERE m.chat_id = ?
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(chat_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::map_message).collect()
    }

    /// Mark every unseen message in the chat that was not written by the
    /// receiver as seen. Idempotent; returns how many rows actually flipped.
    pub async fn mark_seen(&self, chat_id: i64, receiver_id: i64) -> ChatResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_seen = 1
             WHERE chat_id = ? AND sender_id != ? AND is_seen = 0",
        )
        .bind(chat_id)
        .bind(receiver_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        let updated = result.rows_affected();
        if updated > 0 {
            info!(chat_id, receiver_id, updated, "marked messages seen");
        }

        Ok(updated)
    }

    /// Newest message in a chat, if any
    pub async fn last_message(&self, chat_id: i64) -> ChatResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "{MESSAGE_SELECT}
             WHERE m.chat_id = ?
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT 1"
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::map_message).transpose()
    }

    /// Find a message by its public ID
    pub async fn find_by_public_id(&self, public_id: &str) -> ChatResult<Option<Message>> {
        let row = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::map_message).transpose()
    }

    fn map_message(row: &SqliteRow) -> ChatResult<Message> {
        let kind_str: String = row
            .try_get("kind")
            .map_err(|e| ChatError::DatabaseError(e.to_string()))?;

        Ok(Message {
            id: row
                .try_get("id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            public_id: row
                .try_get("public_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            chat_id: row
                .try_get("chat_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            chat_public_id: row
                .try_get("chat_public_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            sender_id: row
                .try_get("sender_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            sender_public_id: row
                .try_get("sender_public_id")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            body: row
                .try_get("body")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            kind: MessageKind::from(kind_str.as_str()),
            is_seen: row
                .try_get("is_seen")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| ChatError::DatabaseError(e.to_string()))?,
        })
    }
}
