use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::util::USER_ID_HEADER;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::rest::health::health_check,
        crate::rest::chats::list_chats,
        crate::rest::chats::open_chat,
        crate::rest::chats::list_messages,
        crate::rest::notifications::list_notifications,
        crate::rest::notifications::mark_all_read,
        crate::socket::websocket_handler
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            crate::rest::health::HealthResponse,
            crate::rest::chats::OpenChatRequest,
            crate::rest::chats::ChatsResponse,
            crate::rest::chats::ChatResponse,
            crate::rest::chats::MessagesResponse,
            crate::rest::notifications::NotificationsResponse,
            crate::rest::notifications::MarkReadResponse,
            crate::wire::ChatPayload,
            crate::wire::ChatOverviewPayload,
            crate::wire::MessagePayload,
            crate::wire::NotificationPayload,
            crate::wire::CommentPayload
        )
    ),
    tags(
        (name = "Health", description = "Service health endpoints"),
        (name = "Chats", description = "Pairwise conversations and their history"),
        (name = "Notifications", description = "Durable user notifications"),
        (name = "WebSocket", description = "Realtime event stream")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.security_schemes.insert(
            "userIdHeader".to_string(),
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER))),
        );
    }
}
