use async_trait::async_trait;
use std::time::Duration;

use crate::error::TurnError;
use crate::{Conversation, Document, Message};

/// How long an interruption token stays claimable.
pub const INTERRUPT_TTL: Duration = Duration::from_secs(1200);

/// Key under which a conversation's pending interruption token is stored.
#[must_use]
pub fn interrupt_key(conversation_id: &str) -> String {
    format!("interrupt:{conversation_id}")
}

#[async_trait]
pub trait ConversationRepo: Send + Sync {
    async fn find_conversation(&self, conversation_id: &str)
    -> anyhow::Result<Option<Conversation>>;

    async fn insert_conversation(&self, conversation: &Conversation) -> anyhow::Result<()>;
}

#[async_trait]
pub trait MessageRepo: Send + Sync {
    async fn insert_message(&self, message: &Message) -> anyhow::Result<()>;

    /// All messages of a conversation, oldest first.
    async fn list_messages(&self, conversation_id: &str) -> anyhow::Result<Vec<Message>>;
}

#[async_trait]
pub trait DocumentRepo: Send + Sync {
    async fn find_document(&self, document_id: &str) -> anyhow::Result<Option<Document>>;

    async fn insert_document(&self, document: &Document) -> anyhow::Result<()>;

    async fn update_document_content(&self, document_id: &str, content: &str)
    -> anyhow::Result<()>;
}

/// Conversation, message and document persistence behind one handle.
pub trait ChatStore: ConversationRepo + MessageRepo + DocumentRepo {}

impl<T> ChatStore for T where T: ConversationRepo + MessageRepo + DocumentRepo + ?Sized {}

/// Single-use interruption tokens keyed by conversation.
///
/// Implementations must make `take_once` atomic: when several resumes race
/// for the same conversation exactly one of them receives the token.
#[async_trait]
pub trait InterruptStore: Send + Sync {
    /// Store `token`, replacing any token already pending for the conversation.
    async fn put(&self, conversation_id: &str, token: &str, ttl: Duration)
    -> Result<(), TurnError>;

    /// Fetch and invalidate the pending token.
    ///
    /// Fails with [`TurnError::NoPendingInterruption`] when nothing is pending
    /// or the token expired.
    async fn take_once(&self, conversation_id: &str) -> Result<String, TurnError>;
}
