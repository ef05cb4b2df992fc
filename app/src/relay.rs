//! Terminal rendering of turn events.

use async_trait::async_trait;
use drafter_conversation::OutboundRelay;
use drafter_core::{TurnError, TurnEvent};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Reply text as it streams, with short notices for pauses and the end.
    Text,
    /// One JSON object per event.
    Json,
}

/// Writes every event to an output and flushes it before returning.
pub struct StdoutRelay<W = Stdout> {
    out: W,
    format: OutputFormat,
    cancel: CancellationToken,
}

impl StdoutRelay {
    #[must_use]
    pub fn new(parent: &CancellationToken, format: OutputFormat) -> Self {
        Self::with_writer(tokio::io::stdout(), parent, format)
    }
}

impl<W> StdoutRelay<W> {
    #[must_use]
    pub fn with_writer(out: W, parent: &CancellationToken, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            cancel: parent.child_token(),
        }
    }
}

fn render(event: &TurnEvent, format: OutputFormat) -> Result<String, TurnError> {
    if format == OutputFormat::Json {
        let line =
            serde_json::to_string(event).map_err(|e| TurnError::InvalidRequest(e.to_string()))?;
        return Ok(format!("{line}\n"));
    }

    Ok(match event {
        TurnEvent::Message(text) => text.clone(),
        TurnEvent::Interrupt(frame) => format!(
            "\n\n--- proposed outline ({}) ---\n{}\n\nConfirm with: drafter resume -c {} -m \"<outline>\"\n",
            frame.content_type, frame.content, frame.conversation_id
        ),
        TurnEvent::End(frame) if frame.produced_id.is_empty() => {
            format!("\n\n[done] conversation {}\n", frame.conversation_id)
        }
        TurnEvent::End(frame) => format!(
            "\n\n[done] conversation {} produced {}\n",
            frame.conversation_id, frame.produced_id
        ),
        TurnEvent::Error(frame) => format!("\n[error {}] {}\n", frame.code, frame.message),
    })
}

#[async_trait]
impl<W> OutboundRelay for StdoutRelay<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, event: TurnEvent) -> Result<(), TurnError> {
        if self.cancel.is_cancelled() {
            return Err(TurnError::Cancelled);
        }

        let rendered = render(&event, self.format)?;
        let written = async {
            self.out.write_all(rendered.as_bytes()).await?;
            self.out.flush().await
        }
        .await;

        // A closed pipe means nobody is reading any more.
        written.map_err(|_| {
            self.cancel.cancel();
            TurnError::RelayClosed
        })
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
