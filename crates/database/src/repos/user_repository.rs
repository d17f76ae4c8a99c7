//! Repository for user data access operations.

use crate::entities::{CreateUserRequest, User};
use crate::types::{UserError, UserResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

const USER_COLUMNS: &str =
    "id, public_id, username, avatar_url, is_online, last_active, created_at, updated_at";

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, request: &CreateUserRequest) -> UserResult<User> {
        let public_id = cuid2::cuid();
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO users (public_id, username, avatar_url, is_online, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.username)
        .bind(&request.avatar_url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed: users.username") {
                UserError::UsernameAlreadyExists
            } else {
                UserError::DatabaseError(e.to_string())
            }
        })?;

        let user_id = result.last_insert_rowid();

        info!(user_id, public_id = %public_id, username = %request.username, "created user");

        Ok(User {
            id: user_id,
            public_id,
            username: request.username.clone(),
            avatar_url: request.avatar_url.clone(),
            is_online: false,
            last_active: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Find a user by public ID
    pub async fn find_by_public_id(&self, public_id: &str) -> UserResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::map_user(&row)).transpose()
    }

    /// Find a user by username
    pub async fn find_by_username(&self, username: &str) -> UserResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        row.map(|row| Self::map_user(&row)).transpose()
    }

    /// Flag a user as online. Called when their first live connection arrives.
    pub async fn mark_online(&self, public_id: &str) -> UserResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        let result =
            sqlx::query("UPDATE users SET is_online = 1, updated_at = ? WHERE public_id = ?")
                .bind(&now)
                .bind(public_id)
                .execute(&self.pool)
                .await
                .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(UserError::UserNotFound);
        }

        info!(public_id, "user marked online");
        Ok(())
    }

    /// Flag a user as offline and stamp their last activity.
    /// Called when their last live connection goes away.
    pub async fn mark_offline(&self, public_id: &str, last_active: &str) -> UserResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = sqlx::query(
            "UPDATE users SET is_online = 0, last_active = ?, updated_at = ? WHERE public_id = ?",
        )
        .bind(last_active)
        .bind(&now)
        .bind(public_id)
        .execute(&self.pool)
        .await
        .map_err(|e| UserError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(UserError::UserNotFound);
        }

        info!(public_id, last_active, "user marked offline");
        Ok(())
    }

    fn map_user(row: &SqliteRow) -> UserResult<User> {
        Ok(User {
            id: row
                .try_get("id")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
            public_id: row
                .try_get("public_id")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
            username: row
                .try_get("username")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
            avatar_url: row
                .try_get("avatar_url")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
            is_online: row
                .try_get("is_online")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
            last_active: row
                .try_get("last_active")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| UserError::DatabaseError(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::prepare_database;
    use crate::migrations::run_migrations;
    use grapevine_config::DatabaseConfig;
    use tempfile::TempDir;

    async fn create_test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_users.db");

        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    fn user_request(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_user() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let created = repo.create(&user_request("ada")).await.unwrap();
        assert!(created.id > 0);
        assert!(!created.is_online);
        assert!(created.last_active.is_none());

        let found = repo
            .find_by_public_id(&created.public_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, created);

        let by_name = repo.find_by_username("ada").await.unwrap().unwrap();
        assert_eq!(by_name.public_id, created.public_id);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = UserRepository::new(pool);

        repo.create(&user_request("ada")).await.unwrap();
        let err = repo.create(&user_request("ada")).await.unwrap_err();
        assert!(matches!(err, UserError::UsernameAlreadyExists));
    }

    #[tokio::test]
    async fn online_state_round_trip() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let user = repo.create(&user_request("ada")).await.unwrap();

        repo.mark_online(&user.public_id).await.unwrap();
        let online = repo
            .find_by_public_id(&user.public_id)
            .await
            .unwrap()
            .unwrap();
        assert!(online.is_online);

        let last_active = chrono::Utc::now().to_rfc3339();
        repo.mark_offline(&user.public_id, &last_active)
            .await
            .unwrap();
        let offline = repo
            .find_by_public_id(&user.public_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!offline.is_online);
        assert_eq!(offline.last_active.as_deref(), Some(last_active.as_str()));
    }

    #[tokio::test]
    async fn presence_updates_for_unknown_users_fail() {
        let (pool, _temp_dir) = create_test_pool().await;
        let repo = UserRepository::new(pool);

        let err = repo.mark_online("missing").await.unwrap_err();
        assert!(matches!(err, UserError::UserNotFound));
    }
}
