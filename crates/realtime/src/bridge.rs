//! Tails the comment change feed and broadcasts each entry to its post room.
//!
//! Comment writes land in storage together with a feed row; this bridge is
//! the only consumer. It polls from the feed head at startup, so restarts
//! pick up live traffic without replaying history, and it advances its
//! cursor only after a change is broadcast. A poll or lookup failure leaves
//! the cursor alone and the entry is retried after a backoff, which can
//! re-deliver an event; clients treat comment ids as idempotent.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use grapevine_config::BridgeConfig;
use grapevine_database::{ChangeOp, CommentChange, CommentRepository, CommentResult};
use sqlx::SqlitePool;

use crate::hub::{Hub, RoomKey};
use crate::protocol::ServerEvent;
use crate::wire::CommentPayload;

/// Handle for stopping a running bridge.
pub struct BridgeHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl BridgeHandle {
    /// Signal the bridge to stop after the current batch.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

pub struct CommentBridge {
    comments: CommentRepository,
    hub: Arc<Hub>,
    config: BridgeConfig,
}

impl CommentBridge {
    pub fn new(pool: SqlitePool, hub: Arc<Hub>, config: BridgeConfig) -> Self {
        Self {
            comments: CommentRepository::new(pool),
            hub,
            config,
        }
    }

    /// Start polling and return a handle for shutdown.
    pub fn start(self) -> BridgeHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });

        BridgeHandle { shutdown_tx }
    }

    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let retry_backoff = Duration::from_millis(self.config.retry_backoff_ms);

        let mut cursor = loop {
            match self.comments.latest_change_id().await {
                Ok(id) => break id,
                Err(error) => {
                    warn!(error = %error, "could not read change feed head, retrying");
                    tokio::select! {
                        _ = shutdown_rx.recv() => return,
                        _ = sleep(retry_backoff) => {}
                    }
                }
            }
        };
        info!(cursor, "comment bridge started");

        loop {
            let (next_cursor, had_error) = self.drain(cursor).await;
            cursor = next_cursor;

            let delay = if had_error { retry_backoff } else { poll_interval };
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = sleep(delay) => {}
            }
        }
        info!(cursor, "comment bridge stopped");
    }

    /// Applies every pending feed entry. Stops at the first failure and
    /// returns the last cursor that was fully applied, so the failed entry
    /// replays on the next round.
    async fn drain(&self, mut cursor: i64) -> (i64, bool) {
        let batch_size = i64::from(self.config.batch_size);
        loop {
            let batch = match self.comments.changes_after(cursor, batch_size).await {
                Ok(batch) => batch,
                Err(error) => {
                    warn!(cursor, error = %error, "change feed poll failed");
                    return (cursor, true);
                }
            };
            let batch_len = batch.len() as i64;

            for change in batch {
                match self.apply(&change).await {
                    Ok(()) => cursor = change.id,
                    Err(error) => {
                        warn!(
                            change_id = change.id,
                            error = %error,
                            "failed to apply change feed entry"
                        );
                        return (cursor, true);
                    }
                }
            }

            if batch_len < batch_size {
                return (cursor, false);
            }
        }
    }

    async fn apply(&self, change: &CommentChange) -> CommentResult<()> {
        let Some(comment) = self.comments.find_by_id(change.comment_id).await? else {
            warn!(
                comment_id = change.comment_id,
                "change feed entry points at a missing comment, skipping"
            );
            return Ok(());
        };

        let room = RoomKey::Post(change.post_id.clone());
        let event = match change.op {
            ChangeOp::Insert => {
                // Deleted before we got here; the soft-delete entry that
                // follows is all the room needs to hear about.
                if comment.is_deleted {
                    return Ok(());
                }
                let payload = CommentPayload::from(comment);
                if payload.parent_id.is_some() {
                    ServerEvent::NewReply {
                        post_id: change.post_id.clone(),
                        comment: payload,
                    }
                } else {
                    ServerEvent::NewComment {
                        post_id: change.post_id.clone(),
                        comment: payload,
                    }
                }
            }
            ChangeOp::SoftDelete => ServerEvent::CommentSoftDeleted {
                post_id: change.post_id.clone(),
                comment_id: comment.public_id,
            },
        };

        self.hub.broadcast_room(&room, event, None).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grapevine_config::DatabaseConfig;
    use grapevine_database::{
        initialize_database, CreateCommentRecord, CreateUserRequest, User, UserRepository,
    };
    use grapevine_presence::ConnectionId;
    use tempfile::TempDir;
    use tokio::time::timeout;

    struct Fixture {
        pool: SqlitePool,
        hub: Arc<Hub>,
        ada: User,
        _temp_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_bridge.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 2,
        };
        let pool = initialize_database(&config).await.unwrap();

        let ada = UserRepository::new(pool.clone())
            .create(&CreateUserRequest {
                username: "ada".to_string(),
                avatar_url: None,
            })
            .await
            .unwrap();

        Fixture {
            pool,
            hub: Arc::new(Hub::new()),
            ada,
            _temp_dir: temp_dir,
        }
    }

    fn fast_bridge_config() -> BridgeConfig {
        BridgeConfig {
            poll_interval_ms: 10,
            retry_backoff_ms: 10,
            batch_size: 64,
        }
    }

    async fn watch_post(fx: &Fixture, post_id: &str) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(16);
        let connection_id = ConnectionId::new();
        fx.hub.register(connection_id, tx).await;
        fx.hub
            .join(connection_id, RoomKey::Post(post_id.to_string()))
            .await;
        rx
    }

    fn comment_record(author: &User, post_id: &str, body: &str) -> CreateCommentRecord {
        CreateCommentRecord {
            post_id: post_id.to_string(),
            author_id: author.id,
            parent_public_id: None,
            body: body.to_string(),
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for bridge event")
            .expect("hub channel closed")
    }

    #[tokio::test]
    async fn feed_entries_reach_the_post_room() {
        let fx = fixture().await;
        let mut rx = watch_post(&fx, "post-1").await;

        let bridge = CommentBridge::new(fx.pool.clone(), Arc::clone(&fx.hub), fast_bridge_config());
        let handle = bridge.start();

        let comments = CommentRepository::new(fx.pool.clone());
        let root = comments
            .create(&comment_record(&fx.ada, "post-1", "first!"))
            .await
            .unwrap();

        match next_event(&mut rx).await {
            ServerEvent::NewComment { post_id, comment } => {
                assert_eq!(post_id, "post-1");
                assert_eq!(comment.id, root.public_id);
                assert_eq!(comment.text, "first!");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let mut reply = comment_record(&fx.ada, "post-1", "me too");
        reply.parent_public_id = Some(root.public_id.clone());
        comments.create(&reply).await.unwrap();

        match next_event(&mut rx).await {
            ServerEvent::NewReply { comment, .. } => {
                assert_eq!(comment.parent_id.as_deref(), Some(root.public_id.as_str()));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        comments.soft_delete(&root.public_id).await.unwrap();
        match next_event(&mut rx).await {
            ServerEvent::CommentSoftDeleted {
                post_id,
                comment_id,
            } => {
                assert_eq!(post_id, "post-1");
                assert_eq!(comment_id, root.public_id);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn events_stay_inside_their_post_room() {
        let fx = fixture().await;
        let mut watching = watch_post(&fx, "post-1").await;
        let mut elsewhere = watch_post(&fx, "post-2").await;

        let bridge = CommentBridge::new(fx.pool.clone(), Arc::clone(&fx.hub), fast_bridge_config());
        let handle = bridge.start();

        CommentRepository::new(fx.pool.clone())
            .create(&comment_record(&fx.ada, "post-1", "hello"))
            .await
            .unwrap();

        assert!(matches!(
            next_event(&mut watching).await,
            ServerEvent::NewComment { .. }
        ));
        assert!(elsewhere.try_recv().is_err());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn startup_tails_the_feed_instead_of_replaying_it() {
        let fx = fixture().await;

        let comments = CommentRepository::new(fx.pool.clone());
        comments
            .create(&comment_record(&fx.ada, "post-1", "old news"))
            .await
            .unwrap();

        let mut rx = watch_post(&fx, "post-1").await;
        let bridge = CommentBridge::new(fx.pool.clone(), Arc::clone(&fx.hub), fast_bridge_config());
        let handle = bridge.start();

        // Give the bridge a few poll rounds; the pre-start comment must
        // not be rebroadcast.
        sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());

        comments
            .create(&comment_record(&fx.ada, "post-1", "fresh"))
            .await
            .unwrap();
        match next_event(&mut rx).await {
            ServerEvent::NewComment { comment, .. } => assert_eq!(comment.text, "fresh"),
            other => panic!("unexpected event: {other:?}"),
        }

        handle.shutdown().await;
    }
}
