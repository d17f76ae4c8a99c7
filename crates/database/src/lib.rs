//! Grapevine Database Crate
//!
//! This crate provides database functionality for the Grapevine realtime
//! backend, including connection management, migrations, and repository
//! implementations for users, chats, messages, notifications, follows,
//! and the comment change feed.

use grapevine_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

// Re-export repositories
pub use repos::{
    ChatRepository, CommentRepository, FollowRepository, MessageRepository,
    NotificationRepository, UserRepository,
};

// Re-export entities
pub use entities::{
    chat::{Chat, ChatOverview},
    comment::{ChangeOp, Comment, CommentChange, CreateCommentRecord},
    message::{CreateMessageRecord, Message, MessageKind},
    notification::{CreateNotificationRecord, Notification, NotificationKind},
    user::{CreateUserRequest, User},
};

// Re-export types
pub use types::{
    errors::{ChatError, CommentError, DatabaseError, NotificationError, UserError},
    ChatResult, CommentResult, DatabaseResult, NotificationResult, UserResult,
};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}
