//! Delivery of turn events to whoever started the turn.

use async_trait::async_trait;
use drafter_core::{TurnError, TurnEvent};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Ordered, flushed delivery of one turn's events.
///
/// The relay owns the turn's cancellation token. Whatever the relay learns
/// about the caller going away must be reflected by cancelling that token, so
/// that a pending upstream call is released too.
#[async_trait]
pub trait OutboundRelay: Send {
    /// Deliver one event. Fails with [`TurnError::RelayClosed`] once the caller
    /// is gone.
    async fn send(&mut self, event: TurnEvent) -> Result<(), TurnError>;

    /// Token cancelled when the caller disconnects or the turn is abandoned.
    fn cancellation(&self) -> CancellationToken;
}

/// Relay backed by a bounded channel.
///
/// Dropping the receiver cancels the relay's token even while no event is
/// being sent. Must be created inside a Tokio runtime.
pub struct ChannelRelay {
    tx: mpsc::Sender<TurnEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ChannelRelay {
    /// Create a relay whose token is a child of `parent`.
    #[must_use]
    pub fn new(parent: &CancellationToken, capacity: usize) -> (Self, mpsc::Receiver<TurnEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = parent.child_token();

        let watched = tx.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = watched.closed() => {
                    debug!("Event receiver dropped, cancelling turn");
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        });

        let relay = Self {
            tx,
            _guard: cancel.clone().drop_guard(),
            cancel,
        };
        (relay, rx)
    }
}

#[async_trait]
impl OutboundRelay for ChannelRelay {
    async fn send(&mut self, event: TurnEvent) -> Result<(), TurnError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(TurnError::Cancelled),
            sent = self.tx.send(event) => sent.map_err(|_| {
                self.cancel.cancel();
                TurnError::RelayClosed
            }),
        }
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
