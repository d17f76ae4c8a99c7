//! Conversation service for pairwise chat operations.

use grapevine_database::{
    Chat, ChatError, ChatOverview, ChatRepository, ChatResult, CreateMessageRecord, Message,
    MessageKind, MessageRepository, User, UserError, UserRepository,
};
use sqlx::SqlitePool;
use tracing::debug;

use crate::types::MessagePage;
use crate::validation::Validator;

/// Largest accepted history page.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Service owning pairwise chat lookup/creation, message append, history
/// reads, and seen-marking.
pub struct ConversationService {
    users: UserRepository,
    chats: ChatRepository,
    messages: MessageRepository,
}

impl ConversationService {
    /// Create a new conversation service instance
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }

    /// Fetch the chat between two users, creating it on first contact.
    ///
    /// The pair is unordered: both directions land on the same chat, and
    /// two racing first contacts resolve to a single row. A chat with
    /// oneself is rejected before anything is written.
    pub async fn open_chat(&self, user_a: &str, user_b: &str) -> ChatResult<Chat> {
        if user_a == user_b {
            return Err(ChatError::SelfChatForbidden);
        }

        let a = self.require_user(user_a).await?;
        let b = self.require_user(user_b).await?;

        let (low, high) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
        self.chats.get_or_create(low, high).await
    }

    /// Validate and persist a message, returning the stored record with its
    /// server-assigned id and timestamp.
    pub async fn append_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        body: &str,
        kind: MessageKind,
    ) -> ChatResult<Message> {
        Validator::message_body(body)?;

        let chat = self.require_chat(chat_id).await?;
        let sender = self.require_user(sender_id).await?;

        if !chat.has_member(sender.id) {
            return Err(ChatError::NotAMember);
        }

        self.messages
            .create(&CreateMessageRecord {
                chat_id: chat.id,
                chat_public_id: chat.public_id,
                sender_id: sender.id,
                sender_public_id: sender.public_id,
                body: body.to_string(),
                kind,
            })
            .await
    }

    /// One page of a chat's history, newest first. `page` is 1-based; the
    /// store reads one row past the page to learn whether older history
    /// remains.
    pub async fn list_messages(
        &self,
        chat_id: &str,
        page: u32,
        page_size: u32,
    ) -> ChatResult<MessagePage> {
        let chat = self.require_chat(chat_id).await?;

        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let mut messages = self
            .messages
            .list_page(chat.id, i64::from(page_size) + 1, offset)
            .await?;

        let has_more = messages.len() > page_size as usize;
        messages.truncate(page_size as usize);

        debug!(
            chat_id,
            page,
            page_size,
            returned = messages.len(),
            has_more,
            "listed chat history page"
        );

        Ok(MessagePage { messages, has_more })
    }

    /// Mark every message in the chat that the receiver has not sent as
    /// seen. Idempotent; the returned count is how many rows flipped, so
    /// callers can skip downstream work on zero.
    pub async fn mark_seen(&self, chat_id: &str, receiver_id: &str) -> ChatResult<u64> {
        let chat = self.require_chat(chat_id).await?;
        let receiver = self.require_user(receiver_id).await?;

        if !chat.has_member(receiver.id) {
            return Err(ChatError::NotAMember);
        }

        self.messages.mark_seen(chat.id, receiver.id).await
    }

    /// Newest message of a chat, for previews
    pub async fn last_message(&self, chat_id: &str) -> ChatResult<Option<Message>> {
        let chat = self.require_chat(chat_id).await?;
        self.messages.last_message(chat.id).await
    }

    /// Resolve a chat the given user belongs to. Errors with `NotAMember`
    /// when the chat exists but the user is not one of its two members.
    pub async fn chat_for_member(&self, chat_id: &str, user_id: &str) -> ChatResult<Chat> {
        let chat = self.require_chat(chat_id).await?;
        let user = self.require_user(user_id).await?;

        if !chat.has_member(user.id) {
            return Err(ChatError::NotAMember);
        }
        Ok(chat)
    }

    /// The user's conversation list, newest activity first
    pub async fn chats_for_user(&self, user_id: &str) -> ChatResult<Vec<ChatOverview>> {
        let user = self.require_user(user_id).await?;
        self.chats.chats_for_user(user.id).await
    }

    async fn require_user(&self, public_id: &str) -> ChatResult<User> {
        match self.users.find_by_public_id(public_id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ChatError::UserNotFound),
            Err(UserError::DatabaseError(e)) => Err(ChatError::DatabaseError(e)),
            Err(e) => Err(ChatError::DatabaseError(e.to_string())),
        }
    }

    async fn require_chat(&self, public_id: &str) -> ChatResult<Chat> {
        self.chats
            .find_by_public_id(public_id)
            .await?
            .ok_or(ChatError::ChatNotFound)
    }
}
