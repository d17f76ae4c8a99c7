//! Conversation store for pairwise chats.
//!
//! Owns chat lookup/creation, message append, paginated history reads,
//! and bulk seen-marking. Callers speak public ids; internal row ids
//! never cross this boundary.

pub mod service;
pub mod types;
pub mod validation;

pub use service::ConversationService;
pub use types::MessagePage;
pub use validation::Validator;

// The store surfaces the database layer's chat errors unchanged.
pub use grapevine_database::{ChatError, ChatResult};
