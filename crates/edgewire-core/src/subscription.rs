// ── Channel subscription multiplexer ──
//
// Many consumers each want some channels of one Edge; the Edge accepts a
// single `subscribeChannels` call that replaces the whole set. The
// multiplexer keeps one registry entry per subscriber and, at most once
// per debounce window, sends the deduplicated union of all entries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::ChannelAddress;
use crate::timing::Debounce;

/// Where the merged channel set is sent.
pub trait SubscribeSink: Send + Sync {
    /// Replace the Edge-side subscription with `channels`.
    fn subscribe_channels(
        &self,
        channels: Vec<ChannelAddress>,
    ) -> BoxFuture<'static, Result<(), CoreError>>;
}

struct Shared {
    registry: Mutex<IndexMap<String, Vec<ChannelAddress>>>,
    last_successful: AtomicBool,
    sink: Arc<dyn SubscribeSink>,
}

impl Shared {
    fn union(&self) -> Vec<ChannelAddress> {
        let registry = self.registry.lock();
        registry
            .values()
            .flatten()
            .cloned()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Send the current union. The registry is read here, not when the
    /// flush was requested.
    async fn flush(&self) {
        let channels = self.union();
        let count = channels.len();
        match self.sink.subscribe_channels(channels).await {
            Ok(()) => {
                debug!(channels = count, "Channel subscription updated");
                self.last_successful.store(true, Ordering::Release);
            }
            Err(e) => {
                warn!(channels = count, error = %e, "Channel subscription failed");
                self.last_successful.store(false, Ordering::Release);
            }
        }
    }
}

/// Registry of channel subscribers with coalesced flushing.
pub struct SubscriptionMultiplexer {
    shared: Arc<Shared>,
    debounce: Debounce,
}

impl SubscriptionMultiplexer {
    pub fn new(sink: Arc<dyn SubscribeSink>, window: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(IndexMap::new()),
                last_successful: AtomicBool::new(false),
                sink,
            }),
            debounce: Debounce::new(window),
        }
    }

    /// Set the channels `subscriber_id` wants, replacing any earlier list.
    pub fn subscribe(&self, subscriber_id: impl Into<String>, channels: Vec<ChannelAddress>) {
        self.shared
            .registry
            .lock()
            .insert(subscriber_id.into(), channels);
        self.request_flush();
    }

    pub fn unsubscribe(&self, subscriber_id: &str) {
        self.shared.registry.lock().shift_remove(subscriber_id);
        self.request_flush();
    }

    /// Drop every subscriber whose channel list equals `channels` as a set.
    pub fn unsubscribe_channels(&self, channels: &[ChannelAddress]) {
        let wanted: IndexSet<&ChannelAddress> = channels.iter().collect();
        self.shared.registry.lock().retain(|_, list| {
            let have: IndexSet<&ChannelAddress> = list.iter().collect();
            have != wanted
        });
        self.request_flush();
    }

    pub fn unsubscribe_all(&self) {
        self.shared.registry.lock().clear();
        self.request_flush();
    }

    /// Schedule a flush unless one is already scheduled.
    pub fn request_flush(&self) {
        let shared = Arc::clone(&self.shared);
        self.debounce.trigger(move || async move { shared.flush().await });
    }

    /// Resend the union right away after a reconnect. Returns `false` and
    /// sends nothing when nobody is subscribed.
    pub fn resubscribe_on_reconnect(&self) -> bool {
        if self.shared.registry.lock().is_empty() {
            return false;
        }
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.flush().await });
        true
    }

    /// Deduplicated union of every subscriber's channels, in first-seen order.
    pub fn wanted_channels(&self) -> Vec<ChannelAddress> {
        self.shared.union()
    }

    pub fn subscriber_ids(&self) -> Vec<String> {
        self.shared.registry.lock().keys().cloned().collect()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.debounce.is_armed()
    }

    /// Outcome of the most recent flush. `false` before the first one.
    pub fn is_last_successful(&self) -> bool {
        self.shared.last_successful.load(Ordering::Acquire)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Vec<String>>>,
        fail: AtomicBool,
    }

    impl SubscribeSink for RecordingSink {
        fn subscribe_channels(
            &self,
            channels: Vec<ChannelAddress>,
        ) -> BoxFuture<'static, Result<(), CoreError>> {
            self.sent
                .lock()
                .push(channels.iter().map(ToString::to_string).collect());
            let result = if self.fail.load(Ordering::SeqCst) {
                Err(CoreError::ConnectionLost)
            } else {
                Ok(())
            };
            futures_util::future::ready(result).boxed()
        }
    }

    fn addr(s: &str) -> ChannelAddress {
        s.parse().unwrap()
    }

    fn addrs(list: &[&str]) -> Vec<ChannelAddress> {
        list.iter().map(|s| addr(s)).collect()
    }

    fn setup() -> (Arc<RecordingSink>, SubscriptionMultiplexer) {
        let sink = Arc::new(RecordingSink::default());
        let mux = SubscriptionMultiplexer::new(
            Arc::clone(&sink) as Arc<dyn SubscribeSink>,
            Duration::from_millis(100),
        );
        (sink, mux)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn subscribes_within_one_window_coalesce() {
        let (sink, mux) = setup();

        mux.subscribe("A", addrs(&["_sum/x", "_sum/y"]));
        advance(50).await;
        mux.subscribe("B", addrs(&["_sum/y", "_sum/z"]));
        assert!(sink.sent.lock().is_empty());

        advance(51).await;
        assert_eq!(
            *sink.sent.lock(),
            vec![vec!["_sum/x".to_owned(), "_sum/y".into(), "_sum/z".into()]]
        );
        assert!(mux.is_last_successful());
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_flushes_remaining_channels() {
        let (sink, mux) = setup();
        mux.subscribe("A", addrs(&["_sum/x"]));
        mux.subscribe("B", addrs(&["_sum/z"]));
        advance(101).await;

        mux.unsubscribe("A");
        assert!(mux.is_flush_scheduled());
        advance(101).await;

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], vec!["_sum/z".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribing_same_id_replaces_entry() {
        let (sink, mux) = setup();
        mux.subscribe("A", addrs(&["_sum/x"]));
        mux.subscribe("A", addrs(&["meter0/ActivePower"]));
        advance(101).await;

        assert_eq!(mux.subscriber_ids(), vec!["A".to_owned()]);
        assert_eq!(*sink.sent.lock(), vec![vec!["meter0/ActivePower".to_owned()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_channels_uses_set_equality() {
        let (_sink, mux) = setup();
        mux.subscribe("A", addrs(&["_sum/x", "_sum/y"]));
        mux.subscribe("B", addrs(&["_sum/y", "_sum/x"]));
        mux.subscribe("C", addrs(&["_sum/x"]));

        mux.unsubscribe_channels(&addrs(&["_sum/y", "_sum/x"]));
        assert_eq!(mux.subscriber_ids(), vec!["C".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_channels_flushes_without_removed_channels() {
        let (sink, mux) = setup();
        mux.subscribe("A", addrs(&["_sum/x", "_sum/y"]));
        mux.subscribe("B", addrs(&["meter0/ActivePower"]));
        advance(101).await;
        assert_eq!(sink.sent.lock().len(), 1);

        mux.unsubscribe_channels(&addrs(&["_sum/y", "_sum/x"]));
        assert!(mux.is_flush_scheduled());
        advance(101).await;

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], vec!["meter0/ActivePower".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_all_sends_empty_set() {
        let (sink, mux) = setup();
        mux.subscribe("A", addrs(&["_sum/x"]));
        advance(101).await;

        mux.unsubscribe_all();
        advance(101).await;
        assert_eq!(sink.sent.lock().last().unwrap(), &Vec::<String>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_recorded_and_not_retried() {
        let (sink, mux) = setup();
        sink.fail.store(true, Ordering::SeqCst);
        mux.subscribe("A", addrs(&["_sum/x"]));
        advance(101).await;
        assert!(!mux.is_last_successful());

        advance(1000).await;
        assert_eq!(sink.sent.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_resends_immediately_when_registry_non_empty() {
        let (sink, mux) = setup();
        assert!(!mux.resubscribe_on_reconnect());
        tokio::task::yield_now().await;
        assert!(sink.sent.lock().is_empty());

        mux.subscribe("A", addrs(&["_sum/x"]));
        advance(101).await;
        assert!(mux.resubscribe_on_reconnect());
        tokio::task::yield_now().await;

        assert_eq!(sink.sent.lock().len(), 2);
        assert!(!mux.is_flush_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn wanted_channels_deduplicates_in_first_seen_order() {
        let (_sink, mux) = setup();
        mux.subscribe("A", addrs(&["a/1", "a/2"]));
        mux.subscribe("B", addrs(&["a/2", "b/1", "a/1"]));
        assert_eq!(mux.wanted_channels(), addrs(&["a/1", "a/2", "b/1"]));
    }
}
