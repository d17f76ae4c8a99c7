//! Validation utilities.

use grapevine_database::ChatError;

/// Longest accepted message body, in bytes.
pub const MAX_MESSAGE_LEN: usize = 4_000;

/// Validation utilities
pub struct Validator;

impl Validator {
    /// Validate a message body before it reaches the store.
    pub fn message_body(body: &str) -> Result<(), ChatError> {
        if body.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        if body.len() > MAX_MESSAGE_LEN {
            return Err(ChatError::MessageTooLong);
        }

        Ok(())
    }
}
