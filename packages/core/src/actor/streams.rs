//! Channel bundles exchanged between producers and the orchestrator
//!
//! Every producer (operation, log tailer, token refresher) owns the sending
//! halves; the orchestrator owns the receiving halves. The only control
//! signal flowing back is cancellation via [`StreamCanceller`].

use super::{AppStateChange, LogMessage};
use crate::error::ActorError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Buffer size for producer channels
pub const STREAM_BUFFER: usize = 64;

/// Consumer side of a cooperative stop
///
/// [`StreamCanceller::cancel`] consumes the canceller, so a stream can be
/// cancelled at most once. It returns after the producer acknowledged (or
/// went away).
#[derive(Debug)]
pub struct StreamCanceller {
    token: CancellationToken,
    stopped: oneshot::Receiver<()>,
}

/// Producer side of a cooperative stop
#[derive(Debug)]
pub struct StopSignal {
    token: CancellationToken,
    ack: oneshot::Sender<()>,
}

/// Create a linked canceller/stop-signal pair
pub fn stop_pair() -> (StreamCanceller, StopSignal) {
    let token = CancellationToken::new();
    let (ack, stopped) = oneshot::channel();
    (
        StreamCanceller {
            token: token.clone(),
            stopped,
        },
        StopSignal { token, ack },
    )
}

impl StreamCanceller {
    /// Signal the producer and wait for it to stop
    pub async fn cancel(self) {
        self.token.cancel();
        // Err means the producer already finished and dropped its signal
        let _ = self.stopped.await;
    }
}

impl StopSignal {
    /// Resolves once the consumer asked the producer to stop
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Tell the consumer the producer has stopped
    pub fn acknowledge(self) {
        let _ = self.ack.send(());
    }
}

/// Progress of a long-running app operation
///
/// All three channels closing without an error means the operation
/// completed.
#[derive(Debug)]
pub struct OperationStreams {
    pub states: mpsc::Receiver<AppStateChange>,
    pub warnings: mpsc::Receiver<String>,
    pub errors: mpsc::Receiver<ActorError>,
}

/// Producer half of [`OperationStreams`]
#[derive(Debug, Clone)]
pub struct OperationSenders {
    pub states: mpsc::Sender<AppStateChange>,
    pub warnings: mpsc::Sender<String>,
    pub errors: mpsc::Sender<ActorError>,
}

impl OperationStreams {
    pub fn channel() -> (OperationSenders, OperationStreams) {
        let (states_tx, states) = mpsc::channel(STREAM_BUFFER);
        let (warnings_tx, warnings) = mpsc::channel(STREAM_BUFFER);
        let (errors_tx, errors) = mpsc::channel(STREAM_BUFFER);
        (
            OperationSenders {
                states: states_tx,
                warnings: warnings_tx,
                errors: errors_tx,
            },
            OperationStreams {
                states,
                warnings,
                errors,
            },
        )
    }
}

/// A running log tail
#[derive(Debug)]
pub struct LogStream {
    pub messages: mpsc::Receiver<LogMessage>,
    pub errors: mpsc::Receiver<ActorError>,
    pub canceller: StreamCanceller,
}

/// Producer half of [`LogStream`]
#[derive(Debug)]
pub struct LogSenders {
    pub messages: mpsc::Sender<LogMessage>,
    pub errors: mpsc::Sender<ActorError>,
    pub stop: StopSignal,
}

impl LogStream {
    pub fn channel() -> (LogSenders, LogStream) {
        let (messages_tx, messages) = mpsc::channel(STREAM_BUFFER);
        let (errors_tx, errors) = mpsc::channel(STREAM_BUFFER);
        let (canceller, stop) = stop_pair();
        (
            LogSenders {
                messages: messages_tx,
                errors: errors_tx,
                stop,
            },
            LogStream {
                messages,
                errors,
                canceller,
            },
        )
    }
}

/// A running background token refresher
#[derive(Debug)]
pub struct TokenRefreshStream {
    pub errors: mpsc::Receiver<ActorError>,
    pub canceller: StreamCanceller,
}

/// Producer half of [`TokenRefreshStream`]
#[derive(Debug)]
pub struct TokenRefreshSenders {
    pub errors: mpsc::Sender<ActorError>,
    pub stop: StopSignal,
}

impl TokenRefreshStream {
    pub fn channel() -> (TokenRefreshSenders, TokenRefreshStream) {
        let (errors_tx, errors) = mpsc::channel(STREAM_BUFFER);
        let (canceller, stop) = stop_pair();
        (
            TokenRefreshSenders {
                errors: errors_tx,
                stop,
            },
            TokenRefreshStream { errors, canceller },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_waits_for_acknowledgment() {
        let (canceller, stop) = stop_pair();
        let (done_tx, mut done_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            stop.cancelled().await;
            done_tx.send("stopped").await.unwrap();
            stop.acknowledge();
        });

        canceller.cancel().await;
        assert_eq!(done_rx.try_recv().unwrap(), "stopped");
    }

    #[tokio::test]
    async fn cancel_returns_when_producer_is_gone() {
        let (canceller, stop) = stop_pair();
        drop(stop);
        canceller.cancel().await;
    }

    #[tokio::test]
    async fn operation_streams_close_with_senders() {
        let (senders, mut streams) = OperationStreams::channel();
        senders.states.send(AppStateChange::Staging).await.unwrap();
        drop(senders);
        assert_eq!(streams.states.recv().await, Some(AppStateChange::Staging));
        assert_eq!(streams.states.recv().await, None);
        assert_eq!(streams.warnings.recv().await, None);
        assert_eq!(streams.errors.recv().await, None);
    }
}
