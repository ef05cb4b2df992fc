#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod backend;
pub mod error;
pub mod event;
pub mod protocol;
pub mod repository;
pub mod util;

pub use backend::{FrameSource, GenerationBackend, ImageUploader, ReferenceReader};
pub use error::TurnError;
pub use event::{EndFrame, ErrorFrame, InterruptFrame, TurnEvent, TurnOutcome};
pub use repository::{
    ChatStore, ConversationRepo, DocumentRepo, INTERRUPT_TTL, InterruptStore, MessageRepo,
    interrupt_key,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => anyhow::bail!("Unknown message role: {other}"),
        }
    }
}

/// What a stored message holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    /// Outline proposed by the engine, or the outline the user confirmed.
    DocumentOutline,
    FinalDocument,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::DocumentOutline => "document_outline",
            Self::FinalDocument => "final_document",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "document_outline" => Ok(Self::DocumentOutline),
            "final_document" => Ok(Self::FinalDocument),
            other => anyhow::bail!("Unknown content type: {other}"),
        }
    }
}

/// A file or other artifact attached to a chat turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub reference_type: String,
    pub reference_id: String,
}

impl Reference {
    #[must_use]
    pub fn file(reference_id: impl Into<String>) -> Self {
        Self {
            reference_type: "file".to_string(),
            reference_id: reference_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub conversation_id: String,
    pub user_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub content_type: ContentType,
    /// JSON-encoded reference list for assistant replies built from attachments.
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn new(
        conversation_id: &str,
        role: Role,
        content: impl Into<String>,
        content_type: ContentType,
    ) -> Self {
        Self {
            message_id: util::new_id(),
            conversation_id: conversation_id.to_string(),
            role,
            content: content.into(),
            content_type,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Option<String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Final long-form artifact; shares its id with the assistant message that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub document_id: String,
    pub conversation_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
