use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

use crate::StreamEvent;

/// Creates a bounded event queue.
///
/// The producer side decodes frames and pushes events; the consumer
/// side pulls them in order. The stream ends once every sender has been
/// dropped and the queue is drained.
pub fn event_channel(capacity: usize) -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender(tx), EventStream { rx })
}

/// The producer half of an [`EventStream`].
#[derive(Clone, Debug)]
pub struct EventSender(mpsc::Sender<StreamEvent>);

impl EventSender {
    /// Pushes an event, waiting while the queue is full.
    ///
    /// Returns `false` if the consumer has gone away, in which case the
    /// producer should stop.
    #[inline]
    pub async fn send(&self, event: StreamEvent) -> bool {
        self.0.send(event).await.is_ok()
    }

    /// Waits until the consumer has been dropped.
    ///
    /// Lets a producer that is waiting on its own input notice that
    /// nobody will read what it produces.
    #[inline]
    pub async fn closed(&self) {
        self.0.closed().await
    }
}

/// A finite, ordered, single-pass sequence of stream events.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    /// Waits for the next event.
    ///
    /// Returns `None` once the producer has finished and every queued
    /// event has been consumed.
    #[inline]
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    #[inline]
    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
