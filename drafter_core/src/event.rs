//! Events delivered to the caller of a turn.
//!
//! Each variant serializes to one independently flushable frame:
//! `{"message": "..."}`, `{"interrupt": {...}}`, `{"end": {...}}` or
//! `{"error": {...}}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptFrame {
    pub conversation_id: String,
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndFrame {
    pub conversation_id: String,
    /// Identifier of the persisted message or document, empty when nothing was stored.
    pub produced_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnEvent {
    Message(String),
    Interrupt(InterruptFrame),
    End(EndFrame),
    Error(ErrorFrame),
}

impl TurnEvent {
    /// Interrupt and end close the turn; nothing may follow them.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Interrupt(_) | Self::End(_))
    }

    /// Event name used when framing as server-sent events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Interrupt(_) => "interrupt",
            Self::End(_) => "end",
            Self::Error(_) => "error",
        }
    }
}

/// How a turn finished from the orchestrator's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed {
        conversation_id: String,
        produced_id: Option<String>,
    },
    Interrupted {
        conversation_id: String,
    },
    /// The caller went away; resources were released and nothing was reported.
    Abandoned {
        conversation_id: String,
    },
}

impl TurnOutcome {
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Completed {
                conversation_id, ..
            }
            | Self::Interrupted { conversation_id }
            | Self::Abandoned { conversation_id } => conversation_id,
        }
    }
}
