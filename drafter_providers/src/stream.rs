//! Turning a response body into upstream data frames.

use async_trait::async_trait;
use drafter_core::protocol::data_payload;
use drafter_core::{FrameSource, TurnError};
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Splits a byte stream into lines. Chunks may end mid-line or mid-character.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator (`\n` or `\r\n`).
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(
            String::from_utf8_lossy(&line[..pos])
                .trim_end_matches('\r')
                .to_string(),
        )
    }

    /// Whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(
            String::from_utf8_lossy(&rest)
                .trim_end_matches('\r')
                .to_string(),
        )
    }
}

/// Frame source over a streamed HTTP body.
///
/// Every wait on the body races the call's cancellation token, so a caller
/// disconnect is observed within one read.
pub struct HttpFrameSource<S> {
    body: Pin<Box<S>>,
    lines: LineSplitter,
    cancel: CancellationToken,
    finished: bool,
}

impl<S> HttpFrameSource<S> {
    pub fn new(body: S, cancel: CancellationToken) -> Self {
        Self {
            body: Box::pin(body),
            lines: LineSplitter::new(),
            cancel,
            finished: false,
        }
    }
}

#[async_trait]
impl<S, B, E> FrameSource for HttpFrameSource<S>
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    async fn next_frame(&mut self) -> Result<Option<String>, TurnError> {
        loop {
            if let Some(line) = self.lines.next_line() {
                if let Some(payload) = data_payload(&line) {
                    return Ok(Some(payload.to_string()));
                }
                continue;
            }

            if self.finished {
                return Ok(self
                    .lines
                    .finish()
                    .and_then(|line| data_payload(&line).map(str::to_string)));
            }

            let chunk = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("Upstream read cancelled");
                    return Err(TurnError::Cancelled);
                }
                chunk = self.body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => self.lines.push(bytes.as_ref()),
                Some(Err(e)) => return Err(TurnError::UpstreamTransportError(e.to_string())),
                None => self.finished = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn source(
        chunks: Vec<Result<Vec<u8>, io::Error>>,
    ) -> HttpFrameSource<impl Stream<Item = Result<Vec<u8>, io::Error>>> {
        HttpFrameSource::new(stream::iter(chunks), CancellationToken::new())
    }

    #[test]
    fn splitter_handles_partial_lines() {
        let mut lines = LineSplitter::new();
        lines.push(b"data: {\"a\"");
        assert_eq!(lines.next_line(), None);
        lines.push(b":1}\r\n\ndata: x");
        assert_eq!(lines.next_line().as_deref(), Some("data: {\"a\":1}"));
        assert_eq!(lines.next_line().as_deref(), Some(""));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.finish().as_deref(), Some("data: x"));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn splitter_rejoins_split_characters() {
        let text = "data: 通知\n".as_bytes();
        let mut lines = LineSplitter::new();
        lines.push(&text[..8]);
        lines.push(&text[8..]);
        assert_eq!(lines.next_line().as_deref(), Some("data: 通知"));
    }

    #[tokio::test]
    async fn yields_data_payloads_only() {
        let mut frames = source(vec![
            Ok(b": keep-alive\n\ndata: {\"code\":0}\n".to_vec()),
            Ok(b"event: message\ndata: second\n\ndata: tail".to_vec()),
        ]);

        assert_eq!(frames.next_frame().await.unwrap().as_deref(), Some("{\"code\":0}"));
        assert_eq!(frames.next_frame().await.unwrap().as_deref(), Some("second"));
        assert_eq!(frames.next_frame().await.unwrap().as_deref(), Some("tail"));
        assert_eq!(frames.next_frame().await.unwrap(), None);
        assert_eq!(frames.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn broken_body_is_a_transport_error() {
        let mut frames = source(vec![
            Ok(b"data: first\n".to_vec()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        ]);

        assert_eq!(frames.next_frame().await.unwrap().as_deref(), Some("first"));
        let err = frames.next_frame().await.unwrap_err();
        assert!(matches!(err, TurnError::UpstreamTransportError(ref msg) if msg.contains("reset")));
    }

    #[tokio::test]
    async fn cancellation_stops_a_pending_read() {
        let cancel = CancellationToken::new();
        let mut frames = HttpFrameSource::new(
            stream::pending::<Result<Vec<u8>, io::Error>>(),
            cancel.clone(),
        );

        let reader = tokio::spawn(async move { frames.next_frame().await });
        cancel.cancel();

        let result = reader.await.unwrap();
        assert!(matches!(result, Err(TurnError::Cancelled)));
    }
}
