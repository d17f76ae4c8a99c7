//! Read-only view of the follow graph.
//!
//! Follow edges are written by the profile CRUD surface, not by this
//! service. The trait keeps the lookup swappable; the default
//! implementation reads the shared database directly.

use async_trait::async_trait;
use grapevine_database::{FollowRepository, NotificationError, NotificationResult};
use sqlx::SqlitePool;

/// Both directions of the follow relationship between two users, from the
/// perspective of the first argument to [`FollowGraph::mutual_follow_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutualFollowStatus {
    /// The first user follows the second.
    pub is_following: bool,
    /// The second user follows the first.
    pub is_followed: bool,
}

/// Lookup for the relationship between a notification's recipient and actor
#[async_trait]
pub trait FollowGraph: Send + Sync {
    async fn mutual_follow_status(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> NotificationResult<MutualFollowStatus>;
}

/// Follow graph backed by the shared database
pub struct SqlFollowGraph {
    follows: FollowRepository,
}

impl SqlFollowGraph {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            follows: FollowRepository::new(pool),
        }
    }
}

#[async_trait]
impl FollowGraph for SqlFollowGraph {
    async fn mutual_follow_status(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> NotificationResult<MutualFollowStatus> {
        let (is_following, is_followed) = self
            .follows
            .edge_between(user_a, user_b)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        Ok(MutualFollowStatus {
            is_following,
            is_followed,
        })
    }
}
