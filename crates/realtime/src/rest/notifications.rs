//! Notification endpoints: the paginated list and bulk read-marking.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::rest::chats::PageQuery;
use crate::state::AppState;
use crate::util::require_user_id;
use crate::wire::NotificationPayload;
use crate::ApiError;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    pub notifications: Vec<NotificationPayload>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkReadResponse {
    /// How many notifications were flipped to read
    pub updated: u64,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    security(("userIdHeader" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "One page of the caller's notifications, newest first", body = NotificationsResponse),
        (status = 401, description = "Missing caller identity", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown caller", body = crate::error::ErrorResponse),
        (status = 500, description = "Failed to fetch notifications", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;

    let enriched = state
        .notifications()
        .notifications_for(
            &user_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    let unread_count = state.notifications().unread_count(&user_id).await?;

    Ok(Json(NotificationsResponse {
        notifications: enriched.into_iter().map(NotificationPayload::from).collect(),
        unread_count,
    }))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read",
    tag = "Notifications",
    security(("userIdHeader" = [])),
    responses(
        (status = 200, description = "All of the caller's notifications marked read", body = MarkReadResponse),
        (status = 401, description = "Missing caller identity", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown caller", body = crate::error::ErrorResponse),
        (status = 500, description = "Failed to mark notifications read", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let user_id = require_user_id(&headers)?;

    let updated = state.notifications().mark_all_read(&user_id).await?;

    Ok(Json(MarkReadResponse { updated }))
}
