//! The websocket endpoint and its event loop.
//!
//! Each connection gets an outbound queue drained by a writer task, so
//! handlers never hold the socket itself. Events from one connection are
//! handled sequentially in arrival order. Every mutation goes through a
//! service first and is broadcast only after the store accepted it; the
//! socket layer itself owns no application state beyond the session.
//!
//! A connection is anonymous until its `userConnected` event binds it to a
//! user and registers a presence device. Everything else is rejected until
//! that happens.

use std::collections::HashSet;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use grapevine_database::{ChatError, MessageKind};
use grapevine_presence::{ConnectionId, PresenceChange};

use crate::hub::RoomKey;
use crate::protocol::{ClientEvent, ServerEvent};
use crate::state::AppState;
use crate::wire::MessagePayload;

/// Events queued per connection before the writer applies backpressure.
const OUTBOUND_QUEUE: usize = 100;

/// Per-connection state, owned by the reader loop.
struct Session {
    connection_id: ConnectionId,
    /// Bound by a successful `userConnected`.
    user_id: Option<String>,
    /// Chats this connection has an open typing indicator in.
    typing: HashSet<String>,
    outbound: mpsc::Sender<ServerEvent>,
}

impl Session {
    fn new(connection_id: ConnectionId, outbound: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            connection_id,
            user_id: None,
            typing: HashSet::new(),
            outbound,
        }
    }

    /// Queue an event for this connection only.
    async fn reply(&self, event: ServerEvent) {
        if self.outbound.send(event).await.is_err() {
            debug!(connection = %self.connection_id, "reply dropped, writer already gone");
        }
    }
}

#[utoipa::path(
    get,
    path = "/ws",
    tag = "WebSocket",
    responses(
        (status = 101, description = "Switching protocols to the realtime event stream")
    )
)]
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE);

    state.hub().register(connection_id, outbound_tx.clone()).await;
    info!(connection = %connection_id, "socket connected");

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(error) => {
                    error!(error = %error, "failed to serialize server event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session::new(connection_id, outbound_tx);

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    if let Err(error) = handle_client_event(&state, &mut session, event).await {
                        warn!(
                            connection = %connection_id,
                            error = %error,
                            "client event failed"
                        );
                        session
                            .reply(ServerEvent::error("internalError", "event processing failed"))
                            .await;
                    }
                }
                Err(error) => {
                    debug!(connection = %connection_id, error = %error, "unparseable client event");
                    session
                        .reply(ServerEvent::error("invalidEvent", "could not parse event"))
                        .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(connection = %connection_id, error = %error, "socket read failed");
                break;
            }
        }
    }

    disconnect_cleanup(&state, &mut session).await;
    drop(session);
    let _ = writer.await;
    info!(connection = %connection_id, "socket disconnected");
}

async fn handle_client_event(
    state: &AppState,
    session: &mut Session,
    event: ClientEvent,
) -> anyhow::Result<()> {
    if session.user_id.is_none() && !matches!(event, ClientEvent::UserConnected { .. }) {
        session
            .reply(ServerEvent::error(
                "notAuthenticated",
                "send userConnected first",
            ))
            .await;
        return Ok(());
    }

    match event {
        ClientEvent::UserConnected { user_id } => {
            handle_user_connected(state, session, user_id).await
        }
        ClientEvent::RequestOnlineUsers => {
            let user_ids = state.presence().online_user_ids().await;
            session.reply(ServerEvent::OnlineUsers { user_ids }).await;
            Ok(())
        }
        ClientEvent::JoinChat { chat_id } => {
            state
                .hub()
                .join(session.connection_id, RoomKey::Chat(chat_id))
                .await;
            Ok(())
        }
        ClientEvent::LeaveChat { chat_id } => {
            handle_leave_chat(state, session, chat_id).await;
            Ok(())
        }
        ClientEvent::SendMessage {
            chat_id,
            sender_id,
            text,
            kind,
        } => handle_send_message(state, session, chat_id, sender_id, text, kind).await,
        ClientEvent::MessageSeen {
            chat_id,
            receiver_id,
        } => handle_message_seen(state, session, chat_id, receiver_id).await,
        ClientEvent::Typing { chat_id, sender_id } => {
            session.typing.insert(chat_id.clone());
            state
                .hub()
                .broadcast_room(
                    &RoomKey::Chat(chat_id.clone()),
                    ServerEvent::UserTyping { chat_id, sender_id },
                    Some(session.connection_id),
                )
                .await;
            Ok(())
        }
        ClientEvent::StopTyping { chat_id, sender_id } => {
            session.typing.remove(&chat_id);
            state
                .hub()
                .broadcast_room(
                    &RoomKey::Chat(chat_id.clone()),
                    ServerEvent::UserStoppedTyping { chat_id, sender_id },
                    Some(session.connection_id),
                )
                .await;
            Ok(())
        }
        ClientEvent::JoinPost { post_id } => {
            state
                .hub()
                .join(session.connection_id, RoomKey::Post(post_id))
                .await;
            Ok(())
        }
        ClientEvent::LeavePost { post_id } => {
            state
                .hub()
                .leave(session.connection_id, &RoomKey::Post(post_id))
                .await;
            Ok(())
        }
    }
}

/// Binds the connection to a user. The first device of a user persists and
/// broadcasts the online transition; later devices only bump the ref count.
/// Rebinding an already-bound connection releases the previous user first.
async fn handle_user_connected(
    state: &AppState,
    session: &mut Session,
    user_id: String,
) -> anyhow::Result<()> {
    if let Some(current) = &session.user_id {
        if *current != user_id {
            warn!(
                connection = %session.connection_id,
                previous = %current,
                user = %user_id,
                "connection rebinding to a different user"
            );
            release_presence(state, session).await;
        }
    }

    if state.users().find_by_public_id(&user_id).await?.is_none() {
        session
            .reply(ServerEvent::error("userNotFound", "unknown user"))
            .await;
        return Ok(());
    }

    let change = state.presence().connect(&user_id, session.connection_id).await;
    if let PresenceChange::CameOnline { .. } = change {
        if let Err(error) = state.users().mark_online(&user_id).await {
            error!(user = %user_id, error = %error, "failed to persist online state");
            state.presence().disconnect(session.connection_id).await;
            session
                .reply(ServerEvent::error("internalError", "could not register presence"))
                .await;
            return Ok(());
        }
        state
            .hub()
            .broadcast_all(ServerEvent::UserOnline {
                user_id: user_id.clone(),
            })
            .await;
    }

    session.user_id = Some(user_id);
    let user_ids = state.presence().online_user_ids().await;
    session.reply(ServerEvent::OnlineUsers { user_ids }).await;
    Ok(())
}

async fn handle_send_message(
    state: &AppState,
    session: &Session,
    chat_id: String,
    sender_id: String,
    text: String,
    kind: Option<String>,
) -> anyhow::Result<()> {
    let kind = MessageKind::from(kind.as_deref().unwrap_or("text"));

    match state
        .conversations()
        .append_message(&chat_id, &sender_id, &text, kind)
        .await
    {
        Ok(message) => {
            state
                .hub()
                .broadcast_room(
                    &RoomKey::Chat(chat_id.clone()),
                    ServerEvent::ReceiveMessage {
                        chat_id,
                        message: MessagePayload::from(message),
                    },
                    Some(session.connection_id),
                )
                .await;
        }
        Err(error) => session.reply(chat_error_event(&error)).await,
    }
    Ok(())
}

/// Seen receipts go to the whole room, the marker included, so every device
/// of both members converges. A receipt that marked nothing stays silent.
async fn handle_message_seen(
    state: &AppState,
    session: &Session,
    chat_id: String,
    receiver_id: String,
) -> anyhow::Result<()> {
    match state.conversations().mark_seen(&chat_id, &receiver_id).await {
        Ok(0) => {
            debug!(chat = %chat_id, receiver = %receiver_id, "seen receipt marked nothing");
        }
        Ok(_) => {
            state
                .hub()
                .broadcast_room(
                    &RoomKey::Chat(chat_id.clone()),
                    ServerEvent::MessageSeen {
                        chat_id,
                        seen_by: receiver_id,
                    },
                    None,
                )
                .await;
        }
        Err(error) => session.reply(chat_error_event(&error)).await,
    }
    Ok(())
}

/// Leaving a chat room also retracts any open typing indicator there, so
/// the peer never sees a stuck "is typing".
async fn handle_leave_chat(state: &AppState, session: &mut Session, chat_id: String) {
    if session.typing.remove(&chat_id) {
        if let Some(user_id) = &session.user_id {
            state
                .hub()
                .broadcast_room(
                    &RoomKey::Chat(chat_id.clone()),
                    ServerEvent::UserStoppedTyping {
                        chat_id: chat_id.clone(),
                        sender_id: user_id.clone(),
                    },
                    Some(session.connection_id),
                )
                .await;
        }
    }
    state
        .hub()
        .leave(session.connection_id, &RoomKey::Chat(chat_id))
        .await;
}

async fn disconnect_cleanup(state: &AppState, session: &mut Session) {
    if let Some(user_id) = session.user_id.clone() {
        for chat_id in std::mem::take(&mut session.typing) {
            state
                .hub()
                .broadcast_room(
                    &RoomKey::Chat(chat_id.clone()),
                    ServerEvent::UserStoppedTyping {
                        chat_id,
                        sender_id: user_id.clone(),
                    },
                    Some(session.connection_id),
                )
                .await;
        }
    }
    state.hub().unregister(session.connection_id).await;
    release_presence(state, session).await;
}

/// Releases the session's presence device. When it was the user's last one,
/// the offline state is persisted first and broadcast only if that write
/// succeeded.
async fn release_presence(state: &AppState, session: &mut Session) {
    let Some(user_id) = session.user_id.take() else {
        return;
    };

    let change = state.presence().disconnect(session.connection_id).await;
    if let PresenceChange::WentOffline { .. } = change {
        let last_active = chrono::Utc::now().to_rfc3339();
        match state.users().mark_offline(&user_id, &last_active).await {
            Ok(()) => {
                state
                    .hub()
                    .broadcast_all(ServerEvent::UserOffline {
                        user_id,
                        last_active,
                    })
                    .await;
            }
            Err(error) => {
                error!(user = %user_id, error = %error, "failed to persist offline state");
            }
        }
    }
}

fn chat_error_event(error: &ChatError) -> ServerEvent {
    let code = match error {
        ChatError::ChatNotFound => "chatNotFound",
        ChatError::MessageNotFound => "messageNotFound",
        ChatError::UserNotFound => "userNotFound",
        ChatError::SelfChatForbidden => "selfChatForbidden",
        ChatError::NotAMember => "notAMember",
        ChatError::EmptyMessage => "emptyMessage",
        ChatError::MessageTooLong => "messageTooLong",
        ChatError::DatabaseError(detail) => {
            error!(error = %detail, "chat operation failed");
            return ServerEvent::error("internalError", "chat operation failed");
        }
    };
    ServerEvent::error(code, error.to_string())
}
