use std::sync::Arc;

use sqlx::SqlitePool;

use grapevine_conversations::ConversationService;
use grapevine_database::UserRepository;
use grapevine_notifications::{NotificationService, SqlFollowGraph};
use grapevine_presence::PresenceRegistry;

use crate::fanout::NotificationFanout;
use crate::hub::Hub;

#[derive(Clone)]
pub struct AppState {
    conversations: Arc<ConversationService>,
    notifications: Arc<NotificationService>,
    presence: Arc<PresenceRegistry>,
    hub: Arc<Hub>,
    users: UserRepository,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        let follow_graph = Arc::new(SqlFollowGraph::new(pool.clone()));
        Self {
            conversations: Arc::new(ConversationService::new(pool.clone())),
            notifications: Arc::new(NotificationService::new(pool.clone(), follow_graph)),
            presence: Arc::new(PresenceRegistry::new()),
            hub: Arc::new(Hub::new()),
            users: UserRepository::new(pool),
        }
    }

    pub fn conversations(&self) -> &ConversationService {
        &self.conversations
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Fan-out pipeline bound to this state's services.
    pub fn fanout(&self) -> NotificationFanout {
        NotificationFanout::new(
            Arc::clone(&self.notifications),
            Arc::clone(&self.presence),
            Arc::clone(&self.hub),
        )
    }
}
