//! Conversation history management.
//!
//! Selects which stored messages travel with the next upstream call and
//! derives titles for new conversations.

use drafter_core::protocol::HistoryEntry;
use drafter_core::util::truncate_chars;
use drafter_core::{ContentType, Message};

/// A sliding window over the most recent messages of a conversation.
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow {
    max_messages: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(10)
    }
}

impl HistoryWindow {
    #[must_use]
    pub const fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    /// The last `max_messages` messages, oldest first, in upstream form.
    ///
    /// `messages` must already be in chronological order.
    #[must_use]
    pub fn select(&self, messages: &[Message]) -> Vec<HistoryEntry> {
        let start = messages.len().saturating_sub(self.max_messages);
        messages[start..]
            .iter()
            .map(|msg| HistoryEntry {
                role: msg.role.as_str().to_string(),
                // The engine only accepts plain text history.
                content_type: ContentType::Text.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

/// Title for a conversation started with `input`.
#[must_use]
pub fn conversation_title(input: &str, max_chars: usize) -> String {
    truncate_chars(input, max_chars, "...")
}
