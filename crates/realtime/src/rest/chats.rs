//! Conversation endpoints: the chat list, opening a chat, and history.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::state::AppState;
use crate::util::require_user_id;
use crate::wire::{ChatOverviewPayload, ChatPayload, MessagePayload};
use crate::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number, newest first
    pub page: Option<u32>,
    /// Page size, capped server side
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenChatRequest {
    /// Public id of the other member
    pub peer_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatsResponse {
    pub chats: Vec<ChatOverviewPayload>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub chat: ChatPayload,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub messages: Vec<MessagePayload>,
    pub has_more: bool,
}

#[utoipa::path(
    get,
    path = "/api/chats",
    tag = "Chats",
    security(("userIdHeader" = [])),
    responses(
        (status = 200, description = "The caller's conversations, most recent first", body = ChatsResponse),
        (status = 401, description = "Missing caller identity", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown caller", body = crate::error::ErrorResponse),
        (status = 500, description = "Failed to list chats", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ChatsResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;

    let overviews = state.conversations().chats_for_user(&user_id).await?;
    let chats = overviews.into_iter().map(ChatOverviewPayload::from).collect();

    Ok(Json(ChatsResponse { chats }))
}

#[utoipa::path(
    post,
    path = "/api/chats",
    tag = "Chats",
    security(("userIdHeader" = [])),
    request_body = OpenChatRequest,
    responses(
        (status = 200, description = "The chat with the peer, created if it did not exist", body = ChatResponse),
        (status = 400, description = "Chat with oneself", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing caller identity", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown user", body = crate::error::ErrorResponse),
        (status = 500, description = "Failed to open chat", body = crate::error::ErrorResponse)
    )
)]
pub async fn open_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OpenChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;

    let chat = state
        .conversations()
        .open_chat(&user_id, &request.peer_id)
        .await?;

    Ok(Json(ChatResponse {
        chat: ChatPayload {
            id: chat.public_id,
            members: vec![user_id, request.peer_id],
            created_at: chat.created_at,
            updated_at: chat.updated_at,
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/chats/{chat_id}/messages",
    tag = "Chats",
    security(("userIdHeader" = [])),
    params(
        ("chat_id" = String, Path, description = "Chat public identifier"),
        PageQuery
    ),
    responses(
        (status = 200, description = "One page of history, newest first", body = MessagesResponse),
        (status = 401, description = "Missing caller identity", body = crate::error::ErrorResponse),
        (status = 403, description = "Caller is not a member", body = crate::error::ErrorResponse),
        (status = 404, description = "Chat not found", body = crate::error::ErrorResponse),
        (status = 500, description = "Failed to fetch messages", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;

    state
        .conversations()
        .chat_for_member(&chat_id, &user_id)
        .await?;

    let page = state
        .conversations()
        .list_messages(
            &chat_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;

    Ok(Json(MessagesResponse {
        messages: page.messages.into_iter().map(MessagePayload::from).collect(),
        has_more: page.has_more,
    }))
}
