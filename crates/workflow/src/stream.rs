//! Event Bus / Stream Sink.
//!
//! One bounded, ordered channel per run. Steps publish through the
//! [`Context`](crate::Context); the caller drains an [`EventStream`]
//! concurrently with execution. A full buffer makes publishers wait.

use crate::event::WorkflowEvent;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::sync::mpsc;
use tracing::trace;

/// Default number of buffered events before publishers wait.
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Create a connected sink/stream pair.
pub fn channel<E: WorkflowEvent>(capacity: usize) -> (EventSink<E>, EventStream<E>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSink { tx }, EventStream { rx, finished: false })
}

/// Producer half of a run's event channel.
#[derive(Debug)]
pub struct EventSink<E> {
    tx: mpsc::Sender<E>,
}

impl<E: WorkflowEvent> EventSink<E> {
    /// Append an event, waiting while the buffer is full.
    ///
    /// A no-op once the consumer has gone away.
    pub async fn publish(&self, event: E) {
        let kind = event.kind();
        if self.tx.send(event).await.is_err() {
            trace!(%kind, "No stream consumer, event dropped");
        }
    }

    /// Append an event without waiting. Returns false if it was dropped.
    pub fn try_publish(&self, event: E) -> bool {
        self.tx.try_send(event).is_ok()
    }

    /// Whether the consumer has dropped its stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a run's event channel.
///
/// Yields events in publication order and ends right after the stop marker.
#[derive(Debug)]
pub struct EventStream<E> {
    rx: mpsc::Receiver<E>,
    finished: bool,
}

impl<E: WorkflowEvent> EventStream<E> {
    /// Receive the next event, or `None` once the stop marker has been yielded.
    pub async fn recv(&mut self) -> Option<E> {
        if self.finished {
            return None;
        }
        let event = self.rx.recv().await;
        self.observe(event)
    }

    fn observe(&mut self, event: Option<E>) -> Option<E> {
        match &event {
            Some(e) if e.is_stop() => self.finished = true,
            None => self.finished = true,
            _ => {}
        }
        event
    }
}

impl<E: WorkflowEvent> Stream for EventStream<E> {
    type Item = E;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<E>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(event) => Poll::Ready(this.observe(event)),
            Poll::Pending => Poll::Pending,
        }
    }
}
