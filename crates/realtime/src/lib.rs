//! Realtime gateway for the grapevine backend.
//!
//! Hosts the websocket event stream and the REST surface on top of the
//! conversation, presence, and notification services, plus the live update
//! plumbing: notification fan-out to connected devices and the comment
//! change feed bridge into post rooms.

mod error;
mod state;
mod util;

pub mod bridge;
pub mod docs;
pub mod fanout;
pub mod hub;
pub mod protocol;
pub mod rest;
pub mod socket;
pub mod wire;

pub use bridge::{BridgeHandle, CommentBridge};
pub use error::{ApiError, ErrorResponse};
pub use fanout::{DomainEvent, NotificationFanout};
pub use hub::{Hub, RoomKey};
pub use protocol::{ClientEvent, ServerEvent};
pub use state::AppState;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use docs::ApiDoc;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(rest::health::health_check))
        .route("/api/chats", get(rest::chats::list_chats))
        .route("/api/chats", post(rest::chats::open_chat))
        .route(
            "/api/chats/:chat_id/messages",
            get(rest::chats::list_messages),
        )
        .route(
            "/api/notifications",
            get(rest::notifications::list_notifications),
        )
        .route(
            "/api/notifications/read",
            post(rest::notifications::mark_all_read),
        )
        // WebSocket route
        .route("/ws", get(socket::websocket_handler))
        .merge(SwaggerUi::new("/docs").url("/docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(util::USER_ID_HEADER)])
}
