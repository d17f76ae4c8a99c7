//! In-memory presence registry.
//!
//! Tracks which users currently hold at least one live gateway connection.
//! A user with several devices owns a set of connections; only the first
//! connection and the loss of the last one are observable transitions.
//!
//! The registry is the single shared mutable map of the service. All
//! mutation funnels through one internal mutex, it holds no database
//! handle, and it is rebuilt empty on process restart. Reacting to a
//! transition (persisting online state, broadcasting) is the caller's job.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Ephemeral identity of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Observable transition produced by a registry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// The user's first connection arrived.
    CameOnline { user_id: String },
    /// The user's last connection went away.
    WentOffline { user_id: String },
    /// The mutation did not change the user's online/offline state.
    Unchanged,
}

#[derive(Default)]
struct RegistryInner {
    /// User public id to their live connections.
    connections: HashMap<String, HashSet<ConnectionId>>,
    /// Reverse index so disconnects do not need the user id.
    owners: HashMap<ConnectionId, String>,
}

/// Reference-counted user presence, keyed by user public id.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<RegistryInner>,
}

impl PresenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user.
    ///
    /// Returns [`PresenceChange::CameOnline`] only for the user's first
    /// connection. Re-registering the same connection for the same user is
    /// an idempotent no-op. A connection belongs to one user at a time;
    /// re-registering it for a different user without an intervening
    /// [`disconnect`](Self::disconnect) is a caller bug and is rebound
    /// with a warning.
    pub async fn connect(&self, user_id: &str, connection_id: ConnectionId) -> PresenceChange {
        let mut inner = self.inner.lock().await;

        if let Some(previous) = inner.owners.get(&connection_id).cloned() {
            if previous == user_id {
                return PresenceChange::Unchanged;
            }
            warn!(
                connection = %connection_id,
                previous = %previous,
                user = %user_id,
                "connection rebound to a different user without disconnect"
            );
            Self::remove_connection(&mut inner, connection_id);
        }

        inner
            .owners
            .insert(connection_id, user_id.to_string());
        let connections = inner
            .connections
            .entry(user_id.to_string())
            .or_default();
        let first = connections.is_empty();
        connections.insert(connection_id);

        debug!(user = %user_id, connection = %connection_id, first, "presence connect");

        if first {
            PresenceChange::CameOnline {
                user_id: user_id.to_string(),
            }
        } else {
            PresenceChange::Unchanged
        }
    }

    /// Deregister a connection.
    ///
    /// Returns [`PresenceChange::WentOffline`] only when this was the
    /// user's last connection. Unknown connections are a no-op.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> PresenceChange {
        let mut inner = self.inner.lock().await;

        match Self::remove_connection(&mut inner, connection_id) {
            Some(user_id) if !inner.connections.contains_key(&user_id) => {
                debug!(user = %user_id, connection = %connection_id, "presence disconnect, user offline");
                PresenceChange::WentOffline { user_id }
            }
            Some(user_id) => {
                debug!(user = %user_id, connection = %connection_id, "presence disconnect");
                PresenceChange::Unchanged
            }
            None => PresenceChange::Unchanged,
        }
    }

    /// Whether the user holds at least one live connection
    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.lock().await.connections.contains_key(user_id)
    }

    /// Sorted snapshot of every online user's public id
    pub async fn online_user_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<String> = inner.connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Every live connection of a user. Empty when offline; an offline
    /// user is a normal lookup miss, not an error.
    pub async fn connections_for(&self, user_id: &str) -> Vec<ConnectionId> {
        let inner = self.inner.lock().await;
        inner
            .connections
            .get(user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Total number of live connections across all users
    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.owners.len()
    }

    /// Drop the connection from both indexes, pruning an emptied user set.
    /// Returns the owning user id, if the connection was known.
    fn remove_connection(inner: &mut RegistryInner, connection_id: ConnectionId) -> Option<String> {
        let user_id = inner.owners.remove(&connection_id)?;
        if let Some(set) = inner.connections.get_mut(&user_id) {
            set.remove(&connection_id);
            if set.is_empty() {
                inner.connections.remove(&user_id);
            }
        }
        Some(user_id)
    }
}
