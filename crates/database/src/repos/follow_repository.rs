//! Repository for the follow graph.
//!
//! The graph is written by the profile CRUD surface; inside this service it
//! is read to enrich follow notifications with the relationship between
//! actor and recipient. The write helpers exist for seeding and tests.

use crate::types::{UserError, UserResult};
use sqlx::SqlitePool;
use tracing::info;

/// Repository for follow graph operations
pub struct FollowRepository {
    pool: SqlitePool,
}

impl FollowRepository {
    /// Create a new follow repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record that `follower_id` follows `followee_id`. Idempotent.
    pub async fn follow(&self, follower_id: i64, followee_id: i64) -> UserResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        info!(follower_id, followee_id, "recorded follow");
        Ok(())
    }

    /// Remove a follow edge. Idempotent.
    pub async fn unfollow(&self, follower_id: i64, followee_id: i64) -> UserResult<()> {
        sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await
            .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Whether `follower_id` follows `followee_id`
    pub async fn is_following(&self, follower_id: i64, followee_id: i64) -> UserResult<bool> {
        let row: (i64,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        Ok(row.0 != 0)
    }

    /// Both directions of the edge between two users in one query:
    /// (a follows b, b follows a).
    pub async fn edge_between(&self, a: i64, b: i64) -> UserResult<(bool, bool)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT
                EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?),
                EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        Ok((row.0 != 0, row.1 != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::prepare_database;
    use crate::migrations::run_migrations;
    use crate::repos::UserRepository;
    use crate::CreateUserRequest;
    use grapevine_config::DatabaseConfig;
    use tempfile::TempDir;

    async fn create_test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_follows.db");

        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    async fn seed_user(pool: &SqlitePool, username: &str) -> i64 {
        UserRepository::new(pool.clone())
            .create(&CreateUserRequest {
                username: username.to_string(),
                avatar_url: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn follow_edges_are_directional() {
        let (pool, _temp_dir) = create_test_pool().await;
        let ada = seed_user(&pool, "ada").await;
        let brian = seed_user(&pool, "brian").await;

        let repo = FollowRepository::new(pool);
        repo.follow(ada, brian).await.unwrap();

        assert!(repo.is_following(ada, brian).await.unwrap());
        assert!(!repo.is_following(brian, ada).await.unwrap());
        assert_eq!(repo.edge_between(ada, brian).await.unwrap(), (true, false));

        repo.follow(brian, ada).await.unwrap();
        assert_eq!(repo.edge_between(ada, brian).await.unwrap(), (true, true));
    }

    #[tokio::test]
    async fn follow_and_unfollow_are_idempotent() {
        let (pool, _temp_dir) = create_test_pool().await;
        let ada = seed_user(&pool, "ada").await;
        let brian = seed_user(&pool, "brian").await;

        let repo = FollowRepository::new(pool);
        repo.follow(ada, brian).await.unwrap();
        repo.follow(ada, brian).await.unwrap();
        assert!(repo.is_following(ada, brian).await.unwrap());

        repo.unfollow(ada, brian).await.unwrap();
        repo.unfollow(ada, brian).await.unwrap();
        assert!(!repo.is_following(ada, brian).await.unwrap());
    }
}
