//! Connection and room registry for the socket layer.
//!
//! Each websocket connection registers an outbound channel here; rooms are
//! named sets of connections that events can be broadcast to. The hub only
//! routes already-built [`ServerEvent`]s, it never touches storage.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::protocol::ServerEvent;
use grapevine_presence::ConnectionId;

/// A broadcast scope. Chat rooms carry conversation traffic, post rooms
/// carry the live comment feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    Chat(String),
    Post(String),
}

#[derive(Default)]
struct HubInner {
    connections: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<RoomKey>>,
}

#[derive(Default)]
pub struct Hub {
    inner: RwLock<HubInner>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, connection_id: ConnectionId, sender: mpsc::Sender<ServerEvent>) {
        let mut inner = self.inner.write().await;
        inner.connections.insert(connection_id, sender);
    }

    /// Drops the connection and removes it from every room it joined.
    pub async fn unregister(&self, connection_id: ConnectionId) {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&connection_id);
        if let Some(rooms) = inner.joined.remove(&connection_id) {
            for room in rooms {
                if let Some(members) = inner.rooms.get_mut(&room) {
                    members.remove(&connection_id);
                    if members.is_empty() {
                        inner.rooms.remove(&room);
                    }
                }
            }
        }
    }

    pub async fn join(&self, connection_id: ConnectionId, room: RoomKey) {
        let mut inner = self.inner.write().await;
        if !inner.connections.contains_key(&connection_id) {
            return;
        }
        inner
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id);
        inner.joined.entry(connection_id).or_default().insert(room);
    }

    pub async fn leave(&self, connection_id: ConnectionId, room: &RoomKey) {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&connection_id);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
        if let Some(rooms) = inner.joined.get_mut(&connection_id) {
            rooms.remove(room);
        }
    }

    pub async fn send_to_connection(&self, connection_id: ConnectionId, event: ServerEvent) {
        let sender = {
            let inner = self.inner.read().await;
            inner.connections.get(&connection_id).cloned()
        };
        if let Some(sender) = sender {
            deliver(&sender, event);
        }
    }

    pub async fn send_to_connections(&self, connection_ids: &[ConnectionId], event: ServerEvent) {
        let senders = {
            let inner = self.inner.read().await;
            connection_ids
                .iter()
                .filter_map(|id| inner.connections.get(id).cloned())
                .collect::<Vec<_>>()
        };
        for sender in senders {
            deliver(&sender, event.clone());
        }
    }

    /// Sends `event` to every member of `room`, skipping `exclude` when set.
    pub async fn broadcast_room(
        &self,
        room: &RoomKey,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) {
        let senders = {
            let inner = self.inner.read().await;
            let Some(members) = inner.rooms.get(room) else {
                return;
            };
            members
                .iter()
                .filter(|id| Some(**id) != exclude)
                .filter_map(|id| inner.connections.get(id).cloned())
                .collect::<Vec<_>>()
        };
        for sender in senders {
            deliver(&sender, event.clone());
        }
    }

    pub async fn broadcast_all(&self, event: ServerEvent) {
        let senders = {
            let inner = self.inner.read().await;
            inner.connections.values().cloned().collect::<Vec<_>>()
        };
        for sender in senders {
            deliver(&sender, event.clone());
        }
    }

    pub async fn room_size(&self, room: &RoomKey) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.get(room).map_or(0, HashSet::len)
    }

    pub async fn connection_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.connections.len()
    }
}

// Senders are cloned out of the registry before delivery so no lock is held
// while pushing. A full outbound queue means the socket writer has stalled;
// the event is dropped instead of blocking every other consumer.
fn deliver(sender: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    if let Err(error) = sender.try_send(event) {
        warn!(error = %error, "dropping event for slow consumer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_room(id: &str) -> RoomKey {
        RoomKey::Chat(id.to_string())
    }

    async fn connect(hub: &Hub) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let id = ConnectionId::new();
        hub.register(id, tx).await;
        (id, rx)
    }

    fn online(user: &str) -> ServerEvent {
        ServerEvent::UserOnline {
            user_id: user.to_string(),
        }
    }

    #[tokio::test]
    async fn room_broadcast_skips_the_excluded_connection() {
        let hub = Hub::new();
        let (a, mut rx_a) = connect(&hub).await;
        let (b, mut rx_b) = connect(&hub).await;
        let (_, mut rx_c) = connect(&hub).await;

        hub.join(a, chat_room("chat-1")).await;
        hub.join(b, chat_room("chat-1")).await;

        hub.broadcast_room(&chat_room("chat-1"), online("user-1"), Some(a))
            .await;

        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_clears_room_membership() {
        let hub = Hub::new();
        let (a, _rx_a) = connect(&hub).await;
        let (b, mut rx_b) = connect(&hub).await;

        hub.join(a, chat_room("chat-1")).await;
        hub.join(a, RoomKey::Post("post-1".to_string())).await;
        hub.join(b, chat_room("chat-1")).await;
        assert_eq!(hub.room_size(&chat_room("chat-1")).await, 2);

        hub.unregister(a).await;
        assert_eq!(hub.room_size(&chat_room("chat-1")).await, 1);
        assert_eq!(hub.room_size(&RoomKey::Post("post-1".to_string())).await, 0);
        assert_eq!(hub.connection_count().await, 1);

        hub.broadcast_room(&chat_room("chat-1"), online("user-1"), None)
            .await;
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_all_reaches_every_connection() {
        let hub = Hub::new();
        let (_, mut rx_a) = connect(&hub).await;
        let (_, mut rx_b) = connect(&hub).await;

        hub.broadcast_all(online("user-3")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn targeted_send_only_reaches_the_listed_connections() {
        let hub = Hub::new();
        let (a, mut rx_a) = connect(&hub).await;
        let (_, mut rx_b) = connect(&hub).await;

        hub.send_to_connections(&[a], online("user-1")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_requires_a_registered_connection() {
        let hub = Hub::new();
        let ghost = ConnectionId::new();
        hub.join(ghost, chat_room("chat-1")).await;
        assert_eq!(hub.room_size(&chat_room("chat-1")).await, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let hub = Hub::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = ConnectionId::new();
        hub.register(id, tx).await;

        hub.send_to_connection(id, online("user-1")).await;
        hub.send_to_connection(id, online("user-2")).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
