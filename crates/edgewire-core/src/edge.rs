// ── Edge abstraction ──
//
// One remote Edge reached through a shared connection. Owns the config
// cache, the channel subscription registry and the push streams for
// telemetry and log lines. Requests are wrapped in the `edgeRpc`
// envelope, correlated on the shared connection, and unwrapped again.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use edgewire_api::{
    Correlator, JsonrpcNotification, JsonrpcRequest, JsonrpcResponseSuccess, Transport, envelope,
};

use crate::config::Timing;
use crate::error::CoreError;
use crate::graph::EdgeConfig;
use crate::model::{
    ChannelAddress, CurrentData, EdgeMetadata, Factory, FactoryProperty, Role, SystemLog,
};
use crate::requests::{
    self, ChannelInfo, GetChannelResult, GetChannelsOfComponentResult,
    GetPropertiesOfFactoryResult, PropertyUpdate, SystemLogParams, method,
};
use crate::stream::{Broadcaster, StateStream};
use crate::subscription::{SubscribeSink, SubscriptionMultiplexer};
use crate::timing::Cooldown;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state of the link an Edge is reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

// ── Request path ─────────────────────────────────────────────────────

/// Wraps, correlates and unwraps requests for one Edge.
#[derive(Clone)]
pub(crate) struct EdgeRpc {
    target_id: String,
    correlator: Arc<Correlator>,
    transport: Arc<dyn Transport>,
}

impl EdgeRpc {
    /// The request is on the wire (or refused) when this returns.
    fn call(&self, request: JsonrpcRequest) -> BoxFuture<'static, Result<Value, CoreError>> {
        let wrapped = match envelope::wrap(&self.target_id, &request) {
            Ok(wrapped) => wrapped,
            Err(e) => return future::ready(Err(e.into())).boxed(),
        };
        debug!(edge_id = %self.target_id, method = %request.method, "Sending edge request");
        let response = self.correlator.send(wrapped, self.transport.as_ref());

        async move {
            let outer: JsonrpcResponseSuccess = response.await?;
            let inner = envelope::unwrap(&outer)?.into_result()?;
            Ok(inner.result)
        }
        .boxed()
    }
}

impl SubscribeSink for EdgeRpc {
    fn subscribe_channels(
        &self,
        channels: Vec<ChannelAddress>,
    ) -> BoxFuture<'static, Result<(), CoreError>> {
        match requests::subscribe_channels(channels) {
            Ok(request) => self.call(request).map(|r| r.map(|_| ())).boxed(),
            Err(e) => future::ready(Err(e.into())).boxed(),
        }
    }
}

// ── Edge ─────────────────────────────────────────────────────────────

/// Handle to one remote Edge.
///
/// Cheaply cloneable. All clones share the config cache, the
/// subscription registry and the push streams.
#[derive(Clone)]
pub struct Edge {
    inner: Arc<EdgeInner>,
}

struct EdgeInner {
    rpc: EdgeRpc,
    metadata: ArcSwap<EdgeMetadata>,
    connection_state: watch::Sender<ConnectionState>,
    /// Current snapshot. Starts out empty (invalid).
    config: ArcSwap<EdgeConfig>,
    config_updates: Broadcaster<EdgeConfig>,
    refresh_cooldown: Cooldown,
    /// Bound for [`Edge::valid_config`]. `None` waits indefinitely.
    config_timeout: Option<Duration>,
    current_data: Broadcaster<CurrentData>,
    system_log: Broadcaster<SystemLog>,
    subscriptions: SubscriptionMultiplexer,
}

impl EdgeInner {
    fn replace_config(&self, config: EdgeConfig) {
        let config = Arc::new(config);
        self.config.store(Arc::clone(&config));
        self.config_updates.publish_arc(config);
    }
}

impl Edge {
    /// Create a handle for the Edge described by `metadata`, reached by
    /// sending through `transport` and settling responses in `correlator`.
    pub fn new(
        metadata: EdgeMetadata,
        correlator: Arc<Correlator>,
        transport: Arc<dyn Transport>,
        timing: &Timing,
    ) -> Self {
        let rpc = EdgeRpc {
            target_id: metadata.id.clone(),
            correlator,
            transport,
        };
        let subscriptions =
            SubscriptionMultiplexer::new(Arc::new(rpc.clone()), timing.subscribe_window);
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(EdgeInner {
                rpc,
                metadata: ArcSwap::from_pointee(metadata),
                connection_state,
                config: ArcSwap::from_pointee(EdgeConfig::empty()),
                config_updates: Broadcaster::new(),
                refresh_cooldown: Cooldown::new(timing.refresh_cooldown),
                config_timeout: timing.request_timeout,
                current_data: Broadcaster::new(),
                system_log: Broadcaster::new(),
                subscriptions,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.rpc.target_id
    }

    pub fn metadata(&self) -> Arc<EdgeMetadata> {
        self.inner.metadata.load_full()
    }

    /// Replace the metadata, e.g. after re-authentication. The id is fixed.
    pub fn update_metadata(&self, mut metadata: EdgeMetadata) {
        metadata.id.clone_from(&self.inner.rpc.target_id);
        self.inner.metadata.store(Arc::new(metadata));
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection_state.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// The link is up again: restore channel subscriptions and fetch the
    /// config if none is cached.
    pub fn on_reconnect(&self) {
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connected);
        if self.inner.subscriptions.resubscribe_on_reconnect() {
            debug!(edge_id = %self.id(), "Restoring channel subscriptions");
        }
        if !self.inner.config.load().is_valid() {
            self.refresh_config();
        }
    }

    pub fn on_disconnect(&self) {
        self.inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
    }

    pub fn set_online(&self, is_online: bool) {
        let mut metadata = EdgeMetadata::clone(&self.inner.metadata.load());
        metadata.is_online = is_online;
        self.inner.metadata.store(Arc::new(metadata));
    }

    pub fn is_online(&self) -> bool {
        self.inner.metadata.load().is_online
    }

    // ── Config cache ─────────────────────────────────────────────────

    /// The cached snapshot. If it is not valid, a refresh is started (at
    /// most one per cooldown period) and the invalid snapshot is returned.
    pub fn config(&self) -> Arc<EdgeConfig> {
        let current = self.inner.config.load_full();
        if !current.is_valid() {
            self.refresh_config();
        }
        current
    }

    /// Fetch the config from the Edge unless a refresh was started within
    /// the cooldown period. Returns `true` if a request was sent.
    ///
    /// On failure the cache is replaced by an empty snapshot, so the next
    /// `config()` after the cooldown tries again.
    pub fn refresh_config(&self) -> bool {
        if !self.inner.refresh_cooldown.try_acquire() {
            debug!(edge_id = %self.id(), "Config refresh suppressed by cooldown");
            return false;
        }

        let response = self.inner.rpc.call(requests::get_edge_config());
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let config = match response.await.and_then(EdgeConfig::from_value) {
                Ok(config) => {
                    debug!(
                        edge_id = %inner.rpc.target_id,
                        components = config.components().len(),
                        factories = config.factories().len(),
                        "Config refreshed"
                    );
                    config
                }
                Err(e) => {
                    warn!(edge_id = %inner.rpc.target_id, error = %e, "Unable to refresh config");
                    EdgeConfig::empty()
                }
            };
            inner.replace_config(config);
        });
        true
    }

    /// Wait for the first valid snapshot.
    ///
    /// While no valid snapshot is available, a refresh is retried once
    /// per cooldown period. Callers bound the wait with a timeout.
    pub async fn first_valid_config(&self) -> Arc<EdgeConfig> {
        let mut updates = self.inner.config_updates.subscribe();
        loop {
            let current = self.config();
            if current.is_valid() {
                return current;
            }
            tokio::select! {
                Some(config) = updates.changed() => {
                    if config.is_valid() {
                        return config;
                    }
                }
                () = tokio::time::sleep(self.inner.refresh_cooldown.period()) => {}
            }
        }
    }

    /// [`first_valid_config`](Self::first_valid_config) bounded by the
    /// request timeout.
    pub async fn valid_config(&self) -> Result<Arc<EdgeConfig>, CoreError> {
        let Some(limit) = self.inner.config_timeout else {
            return Ok(self.first_valid_config().await);
        };
        tokio::time::timeout(limit, self.first_valid_config())
            .await
            .map_err(|_| {
                warn!(edge_id = %self.id(), "No valid config within the request timeout");
                CoreError::Timeout {
                    method: method::GET_EDGE_CONFIG.into(),
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })
    }

    /// Replay-latest stream of config snapshots.
    pub fn config_stream(&self) -> StateStream<EdgeConfig> {
        self.inner.config_updates.subscribe()
    }

    // ── Push streams ─────────────────────────────────────────────────

    pub fn current_data(&self) -> StateStream<CurrentData> {
        self.inner.current_data.subscribe()
    }

    pub fn system_log(&self) -> StateStream<SystemLog> {
        self.inner.system_log.subscribe()
    }

    /// Every log line from now on, without conflation.
    pub fn system_log_events(&self) -> tokio::sync::broadcast::Receiver<Arc<SystemLog>> {
        self.inner.system_log.events()
    }

    // ── Notifications ────────────────────────────────────────────────

    /// Route an unwrapped notification addressed to this Edge.
    pub fn handle_notification(&self, notification: JsonrpcNotification) {
        match notification.method.as_str() {
            method::CURRENT_DATA => self.handle_current_data_notification(notification.params),
            method::EDGE_CONFIG => self.handle_edge_config_notification(notification.params),
            method::SYSTEM_LOG => self.handle_system_log_notification(notification.params),
            other => debug!(edge_id = %self.id(), method = %other, "Ignoring notification"),
        }
    }

    /// The Edge pushed a changed config.
    pub fn handle_edge_config_notification(&self, params: Value) {
        match EdgeConfig::from_value(params) {
            Ok(config) => self.inner.replace_config(config),
            Err(e) => warn!(edge_id = %self.id(), error = %e, "Discarding pushed config"),
        }
    }

    pub fn handle_current_data_notification(&self, params: Value) {
        match serde_json::from_value::<CurrentData>(params) {
            Ok(data) => {
                self.inner.current_data.publish(data);
            }
            Err(e) => warn!(edge_id = %self.id(), error = %e, "Discarding malformed current data"),
        }
    }

    pub fn handle_system_log_notification(&self, params: Value) {
        match serde_json::from_value::<SystemLogParams>(params) {
            Ok(params) => {
                self.inner.system_log.publish(params.line);
            }
            Err(e) => warn!(edge_id = %self.id(), error = %e, "Discarding malformed log line"),
        }
    }

    // ── Channel subscriptions ────────────────────────────────────────

    pub fn subscriptions(&self) -> &SubscriptionMultiplexer {
        &self.inner.subscriptions
    }

    /// Register the channels `subscriber_id` wants. Coalesced with other
    /// subscribers into one request per subscribe window.
    pub fn subscribe_channels(&self, subscriber_id: impl Into<String>, channels: Vec<ChannelAddress>) {
        self.inner.subscriptions.subscribe(subscriber_id, channels);
    }

    /// Drop the channels registered by `subscriber_id`.
    pub fn unsubscribe(&self, subscriber_id: &str) {
        self.inner.subscriptions.unsubscribe(subscriber_id);
    }

    /// Drop every subscriber whose channel list equals `channels` as a set.
    pub fn unsubscribe_channels(&self, channels: &[ChannelAddress]) {
        self.inner.subscriptions.unsubscribe_channels(channels);
    }

    pub fn unsubscribe_all(&self) {
        self.inner.subscriptions.unsubscribe_all();
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send `request` to this Edge and return the inner result.
    pub async fn send_request(&self, request: JsonrpcRequest) -> Result<Value, CoreError> {
        self.inner.rpc.call(request).await
    }

    /// Like [`send_request`](Self::send_request), deserializing the result.
    pub async fn request<T: DeserializeOwned>(&self, request: JsonrpcRequest) -> Result<T, CoreError> {
        let method = request.method.clone();
        let result = self.send_request(request).await?;
        serde_json::from_value(result).map_err(|e| CoreError::MalformedResponse {
            message: format!("{method}: {e}"),
        })
    }

    pub async fn subscribe_system_log(&self) -> Result<(), CoreError> {
        self.send_request(requests::subscribe_system_log(true)?).await?;
        Ok(())
    }

    pub async fn unsubscribe_system_log(&self) -> Result<(), CoreError> {
        self.send_request(requests::subscribe_system_log(false)?).await?;
        Ok(())
    }

    pub async fn create_component_config(
        &self,
        factory_pid: &str,
        properties: Vec<PropertyUpdate>,
    ) -> Result<Value, CoreError> {
        self.send_request(requests::create_component_config(factory_pid, properties)?)
            .await
    }

    pub async fn update_component_config(
        &self,
        component_id: &str,
        properties: Vec<PropertyUpdate>,
    ) -> Result<Value, CoreError> {
        self.send_request(requests::update_component_config(component_id, properties)?)
            .await
    }

    pub async fn delete_component_config(&self, component_id: &str) -> Result<Value, CoreError> {
        self.send_request(requests::delete_component_config(component_id)?)
            .await
    }

    pub async fn set_channel_value(
        &self,
        address: &ChannelAddress,
        value: Value,
    ) -> Result<Value, CoreError> {
        self.send_request(requests::set_channel_value(address, value)?)
            .await
    }

    /// Send `payload` to the JSON API of `component_id`.
    pub async fn component_json_api(
        &self,
        component_id: &str,
        payload: JsonrpcRequest,
    ) -> Result<Value, CoreError> {
        self.send_request(requests::component_json_api(component_id, payload)?)
            .await
    }

    /// Metadata of one channel. Answered from the config when it carries
    /// channel metadata for the component, otherwise asked from the Edge.
    pub async fn channel(&self, address: &ChannelAddress) -> Result<ChannelInfo, CoreError> {
        let config = self.valid_config().await?;
        if let Some(component) = config.component(address.component_id()) {
            if component.channels.is_some() {
                return config
                    .channel(address)
                    .map(|channel| ChannelInfo {
                        id: address.channel_id().to_owned(),
                        channel: channel.clone(),
                    })
                    .ok_or_else(|| CoreError::ChannelNotFound {
                        address: address.to_string(),
                    });
            }
        }

        let result: GetChannelResult = self.request(requests::get_channel(address)?).await?;
        Ok(result.channel)
    }

    /// Metadata of every channel of `component_id`, from the config when
    /// it carries them, otherwise from the Edge.
    pub async fn channels(&self, component_id: &str) -> Result<Vec<ChannelInfo>, CoreError> {
        let config = self.valid_config().await?;
        if let Some(channels) = config
            .component(component_id)
            .and_then(|c| c.channels.as_ref())
        {
            return Ok(channels
                .iter()
                .map(|(id, channel)| ChannelInfo {
                    id: id.clone(),
                    channel: channel.clone(),
                })
                .collect());
        }

        let result: GetChannelsOfComponentResult = self
            .request(requests::get_channels_of_component(component_id)?)
            .await?;
        Ok(result.channels)
    }

    /// A factory and its properties. Edges that strip properties from the
    /// config are asked directly.
    pub async fn factory_properties(
        &self,
        factory_id: &str,
    ) -> Result<(Factory, Vec<FactoryProperty>), CoreError> {
        let config = self.valid_config().await?;
        if let Some(factory) = config.factory(factory_id) {
            if !factory.properties.is_empty() {
                return Ok((factory.clone(), factory.properties.clone()));
            }
        }

        let mut result: GetPropertiesOfFactoryResult = self
            .request(requests::get_properties_of_factory(factory_id)?)
            .await?;
        result.factory.id = factory_id.to_owned();
        Ok((result.factory, result.properties))
    }

    // ── Metadata helpers ─────────────────────────────────────────────

    /// `true` if the Edge runs `version` or newer (suffix ignored).
    pub fn is_version_at_least(&self, version: &str) -> bool {
        self.inner.metadata.load().is_version_at_least(version)
    }

    pub fn is_snapshot(&self) -> bool {
        self.inner.metadata.load().is_snapshot()
    }

    pub fn role_is_at_least(&self, role: Role) -> bool {
        self.inner.metadata.load().role.is_at_least(role)
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.id())
            .field("connection_state", &self.connection_state())
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
