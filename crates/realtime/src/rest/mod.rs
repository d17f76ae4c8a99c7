//! REST surface of the gateway. Callers identify themselves through the
//! `x-user-id` header; everything stateful is delegated to the services.

pub mod chats;
pub mod health;
pub mod notifications;
