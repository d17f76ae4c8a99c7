use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use grapevine_database::{ChatError, NotificationError, UserError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(error = ?error, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        let status = match error {
            ChatError::ChatNotFound | ChatError::MessageNotFound | ChatError::UserNotFound => {
                StatusCode::NOT_FOUND
            }
            ChatError::SelfChatForbidden
            | ChatError::EmptyMessage
            | ChatError::MessageTooLong => StatusCode::BAD_REQUEST,
            ChatError::NotAMember => StatusCode::FORBIDDEN,
            ChatError::DatabaseError(_) => {
                error!(error = ?error, "chat store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<NotificationError> for ApiError {
    fn from(error: NotificationError) -> Self {
        let status = match error {
            NotificationError::NotificationNotFound | NotificationError::UserNotFound => {
                StatusCode::NOT_FOUND
            }
            NotificationError::InvalidKind(_) => StatusCode::BAD_REQUEST,
            NotificationError::DatabaseError(_) => {
                error!(error = ?error, "notification store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(error: UserError) -> Self {
        let status = match error {
            UserError::UserNotFound => StatusCode::NOT_FOUND,
            UserError::UsernameAlreadyExists => StatusCode::BAD_REQUEST,
            UserError::DatabaseError(_) => {
                error!(error = ?error, "user store error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.to_string())
    }
}
