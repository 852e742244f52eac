// ── Replay-latest streams ──
//
// `Broadcaster<T>` publishes snapshots to any number of listeners. A
// listener that subscribes late immediately sees the last published
// value. State consumers use `StateStream` (conflating: a slow reader
// skips to the newest value); consumers that need every value, such as
// log tailers, take a broadcast receiver from `events()` instead.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Broadcaster ─────────────────────────────────────────────────────

/// Replay-latest publisher.
#[derive(Debug)]
pub struct Broadcaster<T> {
    latest: watch::Sender<Option<Arc<T>>>,
    events: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Default for Broadcaster<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Broadcaster<T> {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { latest, events }
    }

    /// Publish a new value, replacing the latest one.
    pub fn publish(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.publish_arc(Arc::clone(&value));
        value
    }

    pub fn publish_arc(&self, value: Arc<T>) {
        self.latest.send_replace(Some(Arc::clone(&value)));
        // No receivers is fine: nobody is tailing right now.
        let _ = self.events.send(value);
    }

    /// The last published value, if any.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.latest.borrow().clone()
    }

    /// Conflating listener that starts with the latest value.
    pub fn subscribe(&self) -> StateStream<T> {
        StateStream::new(self.latest.subscribe())
    }

    /// Lossless (bounded, may lag) listener for values published from now on.
    pub fn events(&self) -> broadcast::Receiver<Arc<T>> {
        self.events.subscribe()
    }
}

// ── StateStream ─────────────────────────────────────────────────────

/// A subscription to a replay-latest value.
///
/// Provides point-in-time access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`. If a
/// value was already published, the first `changed()` returns it
/// without waiting.
pub struct StateStream<T> {
    current: Option<Arc<T>>,
    receiver: watch::Receiver<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> StateStream<T> {
    pub(crate) fn new(mut receiver: watch::Receiver<Option<Arc<T>>>) -> Self {
        let current = receiver.borrow_and_update().clone();
        if current.is_some() {
            receiver.mark_changed();
        }
        Self { current, receiver }
    }

    /// The value captured at creation or by the last `changed()`.
    pub fn current(&self) -> Option<&Arc<T>> {
        self.current.as_ref()
    }

    /// The latest published value (may be newer than `current`).
    pub fn latest(&self) -> Option<Arc<T>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next value. Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        loop {
            self.receiver.changed().await.ok()?;
            let value = self.receiver.borrow_and_update().clone();
            if let Some(value) = value {
                self.current = Some(Arc::clone(&value));
                return Some(value);
            }
        }
    }

    /// Convert into a `Stream` yielding the latest value first, then changes.
    pub fn into_stream(self) -> StateWatchStream<T> {
        StateWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`. Skips the unset state.
pub struct StateWatchStream<T> {
    inner: WatchStream<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> Stream for StateWatchStream<T> {
    type Item = Arc<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Some(value))) => return Poll::Ready(Some(value)),
                Poll::Ready(Some(None)) => {}
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
