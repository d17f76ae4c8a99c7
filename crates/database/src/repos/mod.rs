//! Database repository implementations

pub mod chat_repository;
pub mod comment_repository;
pub mod follow_repository;
pub mod message_repository;
pub mod notification_repository;
pub mod user_repository;

pub use chat_repository::ChatRepository;
pub use comment_repository::CommentRepository;
pub use follow_repository::FollowRepository;
pub use message_repository::MessageRepository;
pub use notification_repository::NotificationRepository;
pub use user_repository::UserRepository;
