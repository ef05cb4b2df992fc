//! Seams to the generation engine and to attachment handling.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TurnError;
use crate::protocol::{ChatRequest, ResumeRequest};

/// A lazy, finite stream of data payloads from one upstream call.
///
/// It cannot be restarted; dropping it releases the connection.
#[async_trait]
pub trait FrameSource: Send {
    /// The next data payload with its `data:` marker removed, or `None` once
    /// the body is exhausted.
    ///
    /// Fails with [`TurnError::Cancelled`] once the call's token is cancelled
    /// and with [`TurnError::UpstreamTransportError`] when the body breaks.
    async fn next_frame(&mut self) -> Result<Option<String>, TurnError>;
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn open_chat(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn FrameSource>, TurnError>;

    async fn open_resume(
        &self,
        request: &ResumeRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn FrameSource>, TurnError>;
}

/// Extracts plain text from an uploaded reference file.
#[async_trait]
pub trait ReferenceReader: Send + Sync {
    async fn read_text(&self, reference_id: &str) -> anyhow::Result<String>;
}

/// Hosts an uploaded image where the engine can fetch it.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Returns the URL the engine should use for the image.
    async fn upload_image(&self, reference_id: &str) -> anyhow::Result<String>;
}
