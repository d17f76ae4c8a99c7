//! User entity definitions

use serde::{Deserialize, Serialize};

/// User entity representing a user in the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_active: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub avatar_url: Option<String>,
}
