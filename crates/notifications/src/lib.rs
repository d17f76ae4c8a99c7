//! Durable notifications for like, comment, and follow events.
//!
//! The service persists every notification regardless of whether the
//! recipient is connected; live delivery is layered on top by the realtime
//! gateway, which asks the presence registry who is online. Follow
//! notifications are additionally enriched with the current state of the
//! follow graph at read or emit time, never at write time, because the
//! relationship can change independently of the notification's lifetime.

pub mod follow_graph;
pub mod service;
pub mod types;

pub use follow_graph::{FollowGraph, MutualFollowStatus, SqlFollowGraph};
pub use service::NotificationService;
pub use types::{EnrichedNotification, NotifyRequest};

pub use grapevine_database::{NotificationError, NotificationKind, NotificationResult};
