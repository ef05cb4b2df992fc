//! Wire format of the upstream generation engine and the frame translator.
//!
//! The engine answers with `data: {json}` lines. Every line is decoded on its
//! own by [`translate`], which never looks at previous frames.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TurnError;

/// Prefix of a data line in the upstream event stream.
pub const DATA_PREFIX: &str = "data:";
pub const EVENT_TYPE_INTERRUPT: &str = "interrupt";
pub const EVENT_TYPE_RESUME: &str = "resume";
pub const FINISH_REASON_STOP: &str = "stop";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatParameters {
    #[serde(rename = "AGENT_USER_INPUT")]
    pub input: String,
    #[serde(rename = "img", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Body of a chat call against the workflow endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub flow_id: String,
    pub uid: String,
    pub parameters: ChatParameters,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

/// Body of a resume call continuing a paused workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub event_id: String,
    pub event_type: String,
    pub content: String,
}

impl ResumeRequest {
    #[must_use]
    pub fn resume(event_id: String, content: String) -> Self {
        Self {
            event_id,
            event_type: EVENT_TYPE_RESUME.to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventValue {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub value: EventValue,
}

/// One decoded upstream frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub event_data: Option<EventData>,
}

/// The workflow paused and is waiting for human confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption {
    pub event_id: String,
    /// `direct` or `option`, as announced by the engine.
    pub kind: String,
    pub content: String,
}

/// What a single frame contributes to the turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translated {
    /// Framing noise or an undecodable line.
    Skip,
    Delta(String),
    Interrupt(Interruption),
    /// Generation finished; `delta` is text carried by the same frame, emitted first.
    Stop { delta: Option<String> },
}

/// Decode one data payload (prefix already stripped).
///
/// # Errors
/// Returns [`TurnError::UpstreamApplicationError`] when the frame carries a
/// non-zero `code`.
pub fn translate(payload: &str) -> Result<Translated, TurnError> {
    let envelope: Envelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Skipping undecodable upstream frame: {e}, payload: {payload}");
            return Ok(Translated::Skip);
        }
    };

    if envelope.code != 0 {
        return Err(TurnError::UpstreamApplicationError {
            code: envelope.code,
            message: envelope.message,
        });
    }

    if let Some(event) = envelope
        .event_data
        .filter(|event| event.event_type == EVENT_TYPE_INTERRUPT)
    {
        return Ok(Translated::Interrupt(Interruption {
            event_id: event.event_id,
            kind: event.value.kind,
            content: event.value.content,
        }));
    }

    let Some(choice) = envelope.choices.into_iter().next() else {
        return Ok(Translated::Skip);
    };

    let delta = Some(choice.delta.content).filter(|text| !text.is_empty());
    if choice.finish_reason.as_deref() == Some(FINISH_REASON_STOP) {
        return Ok(Translated::Stop { delta });
    }

    Ok(delta.map_or(Translated::Skip, Translated::Delta))
}

/// Strip the `data:` marker from a raw line; `None` for blank, comment or
/// other non-data lines.
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim().is_empty() {
        None
    } else {
        Some(payload)
    }
}
