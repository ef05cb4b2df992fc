//! Small text and identifier helpers.

use uuid::Uuid;

/// Time-ordered identifier for conversations, messages and documents.
#[must_use]
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Cut `text` to at most `max_chars` characters, appending `marker` when
/// anything was removed. Never splits a multi-byte character.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{marker}", &text[..byte_idx]),
        None => text.to_string(),
    }
}
