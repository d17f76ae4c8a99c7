//! Service-level output types.

use grapevine_database::Message;
use serde::Serialize;

/// One page of a chat's history, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Whether at least one older message exists beyond this page.
    pub has_more: bool,
}
