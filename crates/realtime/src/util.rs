use axum::http::HeaderMap;

use crate::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Extracts the caller's public user id from the `x-user-id` header.
pub fn require_user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(USER_ID_HEADER)
        .and_then(|header| header.to_str().ok())
        .map(str::trim)
        .ok_or_else(|| ApiError::unauthorized("missing x-user-id header"))?;

    if value.is_empty() {
        return Err(ApiError::unauthorized("empty x-user-id header"));
    }

    Ok(value.to_string())
}
