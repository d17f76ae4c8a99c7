//! Comment entity definitions and the durable change feed rows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub public_id: String,
    pub post_id: String,
    pub author_id: i64,
    pub author_public_id: String,
    pub author_username: String,
    pub author_avatar_url: Option<String>,
    pub parent_public_id: Option<String>,
    pub body: String,
    pub is_deleted: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRecord {
    pub post_id: String,
    pub author_id: i64,
    pub parent_public_id: Option<String>,
    pub body: String,
}

/// One entry of the comment change feed. `id` is the feed cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentChange {
    pub id: i64,
    pub comment_id: i64,
    pub post_id: String,
    pub op: ChangeOp,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    SoftDelete,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "insert",
            ChangeOp::SoftDelete => "soft_delete",
        }
    }
}

impl From<&str> for ChangeOp {
    fn from(s: &str) -> Self {
        match s {
            "soft_delete" => ChangeOp::SoftDelete,
            _ => ChangeOp::Insert,
        }
    }
}

impl ToString for ChangeOp {
    fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}
