//! Repository for comment writes and the durable change feed they produce.
//!
//! Every write appends a `comment_changes` row in the same transaction as
//! the comment row itself. The live update bridge tails that feed; the
//! write path here never talks to the socket layer.

use crate::entities::{ChangeOp, Comment, CommentChange, CreateCommentRecord};
use crate::types::{CommentError, CommentResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.public_id, c.post_id, c.author_id,
           u.public_id as author_public_id, u.username as author_username,
           u.avatar_url as author_avatar_url,
           p.public_id as parent_public_id,
           c.body, c.is_deleted, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
    LEFT JOIN comments p ON p.id = c.parent_id
"#;

/// Repository for comment database operations
pub struct CommentRepository {
    pool: SqlitePool,
}

impl CommentRepository {
    /// Create a new comment repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a comment together with its change-feed entry.
    ///
    /// A reply's parent must exist on the same post.
    pub async fn create(&self, record: &CreateCommentRecord) -> CommentResult<Comment> {
        if record.body.trim().is_empty() {
            return Err(CommentError::EmptyBody);
        }

        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        let parent_id: Option<i64> = match &record.parent_public_id {
            Some(parent_public_id) => {
                let parent: Option<(i64, String)> = sqlx::query_as(
                    "SELECT id, post_id FROM comments WHERE public_id = ? AND is_deleted = 0",
                )
                .bind(parent_public_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

                match parent {
                    Some((id, post_id)) if post_id == record.post_id => Some(id),
                    _ => return Err(CommentError::CommentNotFound),
                }
            }
            None => None,
        };

        let result = sqlx::query(
            "INSERT INTO comments (public_id, post_id, author_id, parent_id, body, is_deleted, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&public_id)
        .bind(&record.post_id)
        .bind(record.author_id)
        .bind(parent_id)
        .bind(&record.body)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        let comment_id = result.last_insert_rowid();

        sqlx::query(
            "INSERT INTO comment_changes (comment_id, post_id, op, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(comment_id)
        .bind(&record.post_id)
        .bind(ChangeOp::Insert.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        info!(
            comment_id,
            public_id = %public_id,
            post_id = %record.post_id,
            author_id = record.author_id,
            reply = parent_id.is_some(),
            "created comment"
        );

        self.find_by_public_id(&public_id)
            .await?
            .ok_or(CommentError::CommentNotFound)
    }

    /// Soft-delete a comment and record the transition on the feed.
    ///
    /// Returns `true` only when the flag actually flipped; deleting an
    /// already-deleted comment is a no-op that appends nothing.
    pub async fn soft_delete(&self, public_id: &str) -> CommentResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        let target: Option<(i64, String, bool)> =
            sqlx::query_as("SELECT id, post_id, is_deleted FROM comments WHERE public_id = ?")
                .bind(public_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        let Some((comment_id, post_id, is_deleted)) = target else {
            return Err(CommentError::CommentNotFound);
        };

        if is_deleted {
            return Ok(false);
        }

        sqlx::query("UPDATE comments SET is_deleted = 1 WHERE id = ?")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO comment_changes (comment_id, post_id, op, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(comment_id)
        .bind(&post_id)
        .bind(ChangeOp::SoftDelete.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        info!(comment_id, public_id, "soft deleted comment");
        Ok(true)
    }

    /// Find a comment by its public ID
    pub async fn find_by_public_id(&self, public_id: &str) -> CommentResult<Option<Comment>> {
        let row = sqlx::query(&format!("{COMMENT_SELECT} WHERE c.public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::map_comment).transpose()
    }

    /// Find a comment by its internal ID. Used by the feed consumer.
    pub async fn find_by_id(&self, id: i64) -> CommentResult<Option<Comment>> {
        let row = sqlx::query(&format!("{COMMENT_SELECT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::map_comment).transpose()
    }

    /// Feed entries strictly after the cursor, oldest first
    pub async fn changes_after(&self, cursor: i64, limit: i64) -> CommentResult<Vec<CommentChange>> {
        let rows = sqlx::query(
            "SELECT id, comment_id, post_id, op, created_at
             FROM comment_changes WHERE id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        rows.iter().map(Self::map_change).collect()
    }

    /// Current head of the change feed. A consumer starting here tails
    /// live writes without replaying history.
    pub async fn latest_change_id(&self) -> CommentResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(id), 0) FROM comment_changes")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        Ok(row.0)
    }

    fn map_comment(row: &SqliteRow) -> CommentResult<Comment> {
        Ok(Comment {
            id: row
                .try_get("id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            public_id: row
                .try_get("public_id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            post_id: row
                .try_get("post_id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            author_id: row
                .try_get("author_id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            author_public_id: row
                .try_get("author_public_id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            author_username: row
                .try_get("author_username")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            author_avatar_url: row
                .try_get("author_avatar_url")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            parent_public_id: row
                .try_get("parent_public_id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            body: row
                .try_get("body")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            is_deleted: row
                .try_get("is_deleted")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
        })
    }

    fn map_change(row: &SqliteRow) -> CommentResult<CommentChange> {
        let op_str: String = row
            .try_get("op")
            .map_err(|e| CommentError::DatabaseError(e.to_string()))?;

        Ok(CommentChange {
            id: row
                .try_get("id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            comment_id: row
                .try_get("comment_id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            post_id: row
                .try_get("post_id")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
            op: ChangeOp::from(op_str.as_str()),
            created_at: row
                .try_get("created_at")
                .map_err(|e| CommentError::DatabaseError(e.to_string()))?,
        })
    }
}
