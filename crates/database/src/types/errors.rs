//! Error types for the database layer

use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

/// User-specific database errors
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Chat- and message-specific database errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat not found")]
    ChatNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("A chat needs two distinct members")]
    SelfChatForbidden,

    #[error("User is not a member of this chat")]
    NotAMember,

    #[error("Message body must not be empty")]
    EmptyMessage,

    #[error("Message body exceeds the allowed length")]
    MessageTooLong,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Notification-specific database errors
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotificationNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid notification kind: {0}")]
    InvalidKind(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Comment-specific database errors
#[derive(Debug, Error)]
pub enum CommentError {
    #[error("Comment not found")]
    CommentNotFound,

    #[error("Comment body must not be empty")]
    EmptyBody,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
