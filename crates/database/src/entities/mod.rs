//! Domain entities for the database layer
//!
//! Simplified entity definitions for use by the repository layer

pub mod chat;
pub mod comment;
pub mod message;
pub mod notification;
pub mod user;

// Re-export all entity types
pub use chat::{Chat, ChatOverview};
pub use comment::{ChangeOp, Comment, CommentChange, CreateCommentRecord};
pub use message::{CreateMessageRecord, Message, MessageKind};
pub use notification::{CreateNotificationRecord, Notification, NotificationKind};
pub use user::{CreateUserRequest, User};
