//! Chat entity definitions

use serde::{Deserialize, Serialize};

/// A pairwise conversation. Members are stored as the normalized pair
/// (member_low < member_high) of internal user ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub public_id: String,
    pub member_low: i64,
    pub member_high: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Chat {
    pub fn has_member(&self, user_id: i64) -> bool {
        self.member_low == user_id || self.member_high == user_id
    }

    /// The other member of the pair. `None` when `user_id` is not a member.
    pub fn peer_of(&self, user_id: i64) -> Option<i64> {
        if self.member_low == user_id {
            Some(self.member_high)
        } else if self.member_high == user_id {
            Some(self.member_low)
        } else {
            None
        }
    }
}

/// One row of a user's conversation list: the chat, the peer's summary,
/// a preview of the newest message, and the count of unseen messages
/// addressed to the requesting user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOverview {
    pub chat_id: i64,
    pub chat_public_id: String,
    pub peer_public_id: String,
    pub peer_username: String,
    pub peer_avatar_url: Option<String>,
    pub peer_is_online: bool,
    pub last_message_body: Option<String>,
    pub last_message_kind: Option<String>,
    pub last_message_at: Option<String>,
    pub unread_count: i64,
    pub updated_at: String,
}
