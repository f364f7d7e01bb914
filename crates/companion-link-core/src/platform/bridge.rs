//! Adapters from callback-style platform APIs to futures and streams.
//!
//! A [`Completer`] is handed to the SDK callback; the matching
//! [`Completion`] is awaited by the coordinator. `complete` consumes the
//! completer, so the waiting task resumes at most once. Dropping the
//! `Completion` detaches the waiter but leaves the SDK call alone: the
//! platform still owns cancellation.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};

use super::{InboundFrames, SendEvent, SendEvents};
use crate::error::PlatformError;

/// Create a single-shot completion pair.
#[must_use]
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx })
}

/// Sending half of a completion. Give this to the SDK callback.
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Completer<T> {
    /// Resume the waiter with `value`.
    ///
    /// Returns `false` if the waiter has already gone away.
    pub fn complete(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }

    /// Returns `true` once nobody is waiting for the result.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a completion.
#[derive(Debug)]
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, PlatformError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.map_err(|_| {
                PlatformError::generic("platform dropped the callback without completing")
            })
        })
    }
}

/// Create a send event channel.
///
/// The sink reports progress any number of times and finishes exactly once.
#[must_use]
pub fn send_events() -> (SendSink, SendEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SendSink { tx }, receiver_stream(rx))
}

/// Producer side of [`send_events`].
#[derive(Debug)]
pub struct SendSink {
    tx: mpsc::UnboundedSender<SendEvent>,
}

impl SendSink {
    /// Report progress. Ignored once the consumer has stopped listening.
    pub fn progress(&self, value: u64) {
        let _ = self.tx.send(SendEvent::Progress(value));
    }

    /// Report the terminal result code and close the stream.
    pub fn finish(self, code: i32) {
        let _ = self.tx.send(SendEvent::Result(code));
    }
}

/// Create an inbound frame channel.
#[must_use]
pub fn inbound_frames() -> (FrameSink, InboundFrames) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FrameSink { tx }, receiver_stream(rx))
}

/// Producer side of [`inbound_frames`]. Dropping it ends the stream.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl FrameSink {
    /// Deliver a frame. Returns `false` if the subscription is gone.
    pub fn deliver(&self, frame: impl Into<Vec<u8>>) -> bool {
        self.tx.send(frame.into()).is_ok()
    }

    /// Returns `true` once the consumer has dropped the stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

fn receiver_stream<T: Send + 'static>(
    rx: mpsc::UnboundedReceiver<T>,
) -> futures::stream::BoxStream<'static, T> {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[tokio::test]
    async fn test_completion_resumes_once() {
        let (completer, completion) = completion();
        tokio::spawn(async move {
            completer.complete(codes::COUNTERPART_RUNNING);
        });
        assert_eq!(completion.await.unwrap(), codes::COUNTERPART_RUNNING);
    }

    #[tokio::test]
    async fn test_dropped_completer_is_a_platform_error() {
        let (completer, completion) = completion::<i32>();
        drop(completer);
        let err = completion.await.unwrap_err();
        assert_eq!(err.code, codes::GENERIC_FAILURE);
    }

    #[test]
    fn test_dropped_completion_detaches() {
        let (completer, completion) = completion::<i32>();
        assert!(!completer.is_detached());
        drop(completion);
        assert!(completer.is_detached());
        assert!(!completer.complete(1));
    }

    #[test]
    fn test_completion_pending_until_completed() {
        let (completer, completion) = completion::<i32>();
        let mut task = tokio_test::task::spawn(completion);
        tokio_test::assert_pending!(task.poll());

        assert!(completer.complete(7));
        assert!(task.is_woken());
        assert_eq!(tokio_test::assert_ready!(task.poll()).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_send_events_end_after_finish() {
        let (sink, mut events) = send_events();
        sink.progress(10);
        sink.progress(100);
        sink.finish(codes::SEND_SUCCESS);

        assert_eq!(events.next().await, Some(SendEvent::Progress(10)));
        assert_eq!(events.next().await, Some(SendEvent::Progress(100)));
        assert_eq!(events.next().await, Some(SendEvent::Result(codes::SEND_SUCCESS)));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_frame_sink_closes_with_stream() {
        let (sink, mut frames) = inbound_frames();
        assert!(sink.deliver(b"hi".to_vec()));
        assert_eq!(frames.next().await, Some(b"hi".to_vec()));

        drop(frames);
        assert!(sink.is_closed());
        assert!(!sink.deliver(b"late".to_vec()));
    }
}
