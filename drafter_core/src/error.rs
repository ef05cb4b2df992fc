use thiserror::Error;

/// Everything that can end a turn early.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("User {user_id} is not allowed to access conversation {conversation_id}")]
    ConversationAccessDenied {
        user_id: i64,
        conversation_id: String,
    },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream transport error: {0}")]
    UpstreamTransportError(String),

    #[error("Upstream application error: code={code}, message={message}")]
    UpstreamApplicationError { code: i64, message: String },

    #[error("No pending interruption for conversation {0}, it may have expired")]
    NoPendingInterruption(String),

    #[error("Correlation store unavailable: {0}")]
    CorrelationStoreUnavailable(String),

    #[error("Caller closed the event stream")]
    RelayClosed,

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TurnError {
    /// Caller-side terminations that abandon the turn without surfacing an error.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::RelayClosed | Self::Cancelled)
    }

    /// Numeric code carried by the error-shaped outbound event.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::UpstreamApplicationError { code, .. } => *code,
            Self::ConversationNotFound(_) | Self::DocumentNotFound(_) => 404,
            Self::ConversationAccessDenied { .. } => 403,
            Self::NoPendingInterruption(_) => 410,
            Self::InvalidRequest(_) => 400,
            Self::UpstreamUnavailable(_) | Self::UpstreamTransportError(_) => 502,
            Self::CorrelationStoreUnavailable(_) | Self::Store(_) => 503,
            Self::RelayClosed | Self::Cancelled => 499,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnects_are_not_failures() {
        assert!(TurnError::RelayClosed.is_disconnect());
        assert!(TurnError::Cancelled.is_disconnect());
        assert!(!TurnError::UpstreamTransportError("eof".to_string()).is_disconnect());
    }

    #[test]
    fn upstream_code_is_passed_through() {
        let err = TurnError::UpstreamApplicationError {
            code: 10_013,
            message: "flow offline".to_string(),
        };
        assert_eq!(err.code(), 10_013);
        assert!(err.to_string().contains("flow offline"));
    }
}
