// ── Session ──
//
// One WebSocket connection to an Edge or a backend, shared by any number
// of Edges. A single dispatch task consumes transport events: responses
// settle pending calls, `edgeRpc` notifications are routed to the Edge
// they name, and connection changes fan out to every Edge.
//
// The dispatch task never awaits a response itself, since responses are
// delivered by that same task. Anything that needs one is spawned.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use edgewire_api::{
    Correlator, JsonrpcMessage, JsonrpcNotification, JsonrpcRequest, Transport, TransportEvent,
    WebSocketHandle, envelope,
};

use crate::config::{AuthCredentials, SessionConfig};
use crate::edge::Edge;
use crate::error::CoreError;
use crate::model::EdgeMetadata;
use crate::requests::{self, AuthenticateResult};

// ── SessionState ─────────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the (re)connection.
    Connecting,
    /// Connected and, if credentials are configured, authenticated.
    Connected,
    /// The link dropped; a reconnect attempt follows.
    Disconnected,
    /// Authentication was rejected, or the transport gave up.
    Failed { reason: String },
}

// ── Session ──────────────────────────────────────────────────────────

/// Entry point for consumers.
///
/// Cheaply cloneable. Dropping every clone does not stop the background
/// tasks; call [`shutdown()`](Self::shutdown).
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    edges: DashMap<String, Edge>,
    state: watch::Sender<SessionState>,
    /// Session token from the last successful authentication.
    token: Mutex<Option<String>>,
    cancel: CancellationToken,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Open the WebSocket described by `config` and start dispatching.
    ///
    /// Returns once the background tasks run; use
    /// [`wait_connected()`](Self::wait_connected) or
    /// [`connect()`](Self::connect) to wait for the link.
    pub fn start(config: SessionConfig) -> Result<Self, CoreError> {
        let cancel = CancellationToken::new();
        let (handle, events) = WebSocketHandle::connect(
            config.url.clone(),
            &config.transport(),
            config.reconnect.clone(),
            cancel.child_token(),
        )
        .map_err(|e| CoreError::ConnectionFailed {
            url: config.url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::with_transport_and_cancel(
            config,
            Arc::new(handle),
            events,
            cancel,
        ))
    }

    /// Start the session and wait until it is connected (and
    /// authenticated) or `connect_timeout` elapses.
    pub async fn connect(config: SessionConfig) -> Result<Self, CoreError> {
        let timeout = config.connect_timeout;
        let session = Self::start(config)?;
        match session.wait_connected(timeout).await {
            Ok(()) => Ok(session),
            Err(e) => {
                session.shutdown();
                Err(e)
            }
        }
    }

    /// Run a session over any transport. `events` must report what
    /// happens on the link that `transport` writes to.
    pub fn with_transport(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self::with_transport_and_cancel(config, transport, events, CancellationToken::new())
    }

    fn with_transport_and_cancel(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let correlator = Arc::new(Correlator::new(config.timing.request_timeout));
        let (state, _) = watch::channel(SessionState::Connecting);

        let inner = Arc::new(SessionInner {
            config,
            transport,
            correlator,
            edges: DashMap::new(),
            state,
            token: Mutex::new(None),
            cancel: cancel.clone(),
            dispatch: Mutex::new(None),
        });

        let task = tokio::spawn(dispatch_loop(Arc::clone(&inner), events, cancel));
        *inner.dispatch.lock() = Some(task);

        Self { inner }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait for [`SessionState::Connected`].
    pub async fn wait_connected(&self, timeout: std::time::Duration) -> Result<(), CoreError> {
        let mut state = self.inner.state.subscribe();
        let reached = tokio::time::timeout(
            timeout,
            state.wait_for(|s| matches!(s, SessionState::Connected | SessionState::Failed { .. })),
        )
        .await;

        let url = self.inner.config.url.to_string();
        match reached {
            Ok(Ok(s)) => match &*s {
                SessionState::Failed { reason } if self.has_credentials() => {
                    Err(CoreError::AuthenticationFailed {
                        message: reason.clone(),
                    })
                }
                SessionState::Failed { reason } => Err(CoreError::ConnectionFailed {
                    url,
                    reason: reason.clone(),
                }),
                _ => Ok(()),
            },
            Ok(Err(_)) => Err(CoreError::ConnectionFailed {
                url,
                reason: "session stopped".into(),
            }),
            Err(_) => Err(CoreError::ConnectionFailed {
                url,
                reason: format!("not connected within {}s", timeout.as_secs()),
            }),
        }
    }

    fn has_credentials(&self) -> bool {
        matches!(self.inner.config.auth, AuthCredentials::Password { .. })
    }

    /// Session token handed out by the last successful authentication.
    pub fn token(&self) -> Option<String> {
        self.inner.token.lock().clone()
    }

    // ── Edges ────────────────────────────────────────────────────────

    /// The Edge with `edge_id`, created on first use.
    pub fn edge(&self, edge_id: &str) -> Edge {
        self.inner.edge(EdgeMetadata::new(edge_id), false)
    }

    /// The Edge with `edge_id` if it is already known.
    pub fn find_edge(&self, edge_id: &str) -> Option<Edge> {
        self.inner.edges.get(edge_id).map(|e| e.value().clone())
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self.inner.edges.iter().map(|e| e.value().clone()).collect();
        edges.sort_by(|a, b| a.id().cmp(b.id()));
        edges
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send a request to the endpoint itself, without an envelope.
    pub async fn send_request(&self, request: JsonrpcRequest) -> Result<Value, CoreError> {
        let response = self
            .inner
            .correlator
            .send(request, self.inner.transport.as_ref());
        Ok(response.await?.result)
    }

    // ── Shutdown ─────────────────────────────────────────────────────

    /// Stop the dispatch task and close the connection.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.correlator.on_transport_closed();
        if let Some(task) = self.inner.dispatch.lock().take() {
            task.abort();
        }
        for edge in self.edges() {
            edge.on_disconnect();
        }
        debug!("session shut down");
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

async fn dispatch_loop(
    inner: Arc<SessionInner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Some(TransportEvent::Connected) => inner.on_connected(),
            Some(TransportEvent::Message(message)) => inner.on_message(message),
            Some(TransportEvent::Disconnected) => inner.on_disconnected(),
            None => {
                inner.on_disconnected();
                inner.state.send_replace(SessionState::Failed {
                    reason: "transport stopped".into(),
                });
                break;
            }
        }
    }
    debug!("dispatch loop exited");
}

impl SessionInner {
    fn edge(self: &Arc<Self>, metadata: EdgeMetadata, replace_metadata: bool) -> Edge {
        if let Some(existing) = self.edges.get(&metadata.id) {
            if replace_metadata {
                existing.update_metadata(metadata);
            }
            return existing.value().clone();
        }

        let edge_id = metadata.id.clone();
        let edge = self
            .edges
            .entry(edge_id.clone())
            .or_insert_with(|| {
                Edge::new(
                    metadata,
                    Arc::clone(&self.correlator),
                    Arc::clone(&self.transport),
                    &self.config.timing,
                )
            })
            .value()
            .clone();
        debug!(edge_id = %edge_id, "edge registered");

        if *self.state.borrow() == SessionState::Connected {
            edge.on_reconnect();
        }
        edge
    }

    fn on_connected(self: &Arc<Self>) {
        info!(url = %self.config.url, "connected");
        match &self.config.auth {
            AuthCredentials::None => self.on_ready(),
            AuthCredentials::Password { username, password } => {
                let request = match requests::authenticate_with_password(
                    username.clone(),
                    password.expose_secret().to_owned(),
                ) {
                    Ok(request) => request,
                    Err(e) => {
                        self.on_authentication_failed(&e.to_string());
                        return;
                    }
                };
                let response = self.correlator.send(request, self.transport.as_ref());
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    let result = response.await.map_err(CoreError::from).and_then(|r| {
                        r.parse_result::<AuthenticateResult>()
                            .map_err(CoreError::from)
                    });
                    match result {
                        Ok(auth) => {
                            debug!(edges = auth.edges.len(), "authenticated");
                            *inner.token.lock() = auth.token;
                            for metadata in auth.edges {
                                inner.edge(metadata, true);
                            }
                            inner.on_ready();
                        }
                        Err(e) => inner.on_authentication_failed(&e.to_string()),
                    }
                });
            }
        }
    }

    fn on_ready(&self) {
        self.state.send_replace(SessionState::Connected);
        for edge in &self.edges {
            edge.on_reconnect();
        }
    }

    fn on_authentication_failed(&self, reason: &str) {
        warn!(reason = %reason, "authentication failed");
        self.state.send_replace(SessionState::Failed {
            reason: reason.to_owned(),
        });
    }

    fn on_message(&self, message: JsonrpcMessage) {
        match message {
            JsonrpcMessage::Response(response) => {
                // Unmatched responses are logged by the correlator.
                let _ = self.correlator.on_response_received(response);
            }
            JsonrpcMessage::Notification(notification) => self.on_notification(&notification),
            JsonrpcMessage::Request(request) => {
                debug!(method = %request.method, "ignoring request from server");
            }
        }
    }

    fn on_notification(&self, notification: &JsonrpcNotification) {
        if notification.method != envelope::EDGE_RPC {
            debug!(method = %notification.method, "ignoring notification");
            return;
        }

        match envelope::unwrap_notification(notification) {
            Ok((edge_id, inner)) => match self.edges.get(&edge_id) {
                Some(edge) => edge.handle_notification(inner),
                None => debug!(edge_id = %edge_id, method = %inner.method, "notification for unknown edge"),
            },
            Err(e) => warn!(error = %e, "discarding malformed edgeRpc notification"),
        }
    }

    fn on_disconnected(&self) {
        if *self.state.borrow() != SessionState::Disconnected {
            info!(url = %self.config.url, "disconnected");
        }
        self.correlator.on_transport_closed();
        for edge in &self.edges {
            edge.on_disconnect();
        }
        self.state.send_replace(SessionState::Disconnected);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;

    use edgewire_api::{JsonrpcResponse, JsonrpcResponseError, JsonrpcResponseSuccess};

    use super::*;
    use crate::edge::ConnectionState;

    #[derive(Default)]
    struct Wire {
        sent: Mutex<Vec<JsonrpcRequest>>,
    }

    impl Transport for Wire {
        fn send(&self, text: String) -> Result<(), edgewire_api::Error> {
            self.sent.lock().push(serde_json::from_str(&text).unwrap());
            Ok(())
        }
    }

    struct Harness {
        wire: Arc<Wire>,
        events: mpsc::UnboundedSender<TransportEvent>,
        session: Session,
    }

    impl Harness {
        fn new(auth: AuthCredentials) -> Self {
            let wire = Arc::new(Wire::default());
            let (events, rx) = mpsc::unbounded_channel();
            let mut config = SessionConfig::new(Url::parse("ws://edge.local:8085/websocket").unwrap());
            config.auth = auth;
            let session =
                Session::with_transport(config, Arc::clone(&wire) as Arc<dyn Transport>, rx);
            Self {
                wire,
                events,
                session,
            }
        }

        fn push(&self, value: Value) {
            let message = JsonrpcMessage::from_value(value).unwrap();
            self.events.send(TransportEvent::Message(message)).unwrap();
        }

        fn sent(&self, index: usize) -> JsonrpcRequest {
            self.wire.sent.lock()[index].clone()
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn password() -> AuthCredentials {
        AuthCredentials::Password {
            username: None,
            password: SecretString::from("user"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connects_without_credentials() {
        let h = Harness::new(AuthCredentials::None);
        assert_eq!(h.session.state(), SessionState::Connecting);

        h.events.send(TransportEvent::Connected).unwrap();
        h.session.wait_connected(Duration::from_secs(1)).await.unwrap();
        assert!(h.wire.sent.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn authenticates_and_registers_edges() {
        let h = Harness::new(password());
        h.events.send(TransportEvent::Connected).unwrap();
        settle().await;

        let auth = h.sent(0);
        assert_eq!(auth.method, "authenticateWithPassword");
        assert_eq!(auth.params, json!({"password": "user"}));
        assert_eq!(h.session.state(), SessionState::Connecting);

        h.push(json!({
            "jsonrpc": "2.0",
            "id": auth.id,
            "result": {"token": "t0", "edges": [{"id": "0", "version": "2024.1.0", "role": "owner", "isOnline": true}]}
        }));
        h.session.wait_connected(Duration::from_secs(1)).await.unwrap();

        assert_eq!(h.session.token().as_deref(), Some("t0"));
        let edge = h.session.find_edge("0").unwrap();
        assert!(edge.is_online());
        assert_eq!(edge.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credentials_fail_the_session() {
        let h = Harness::new(password());
        h.events.send(TransportEvent::Connected).unwrap();
        settle().await;

        let auth = h.sent(0);
        let error = JsonrpcResponseError::new(auth.id, 1003, "Authentication failed");
        h.events
            .send(TransportEvent::Message(JsonrpcMessage::Response(
                JsonrpcResponse::Error(error),
            )))
            .unwrap();

        let err = h
            .session
            .wait_connected(Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn routes_edge_notifications_by_id() {
        let h = Harness::new(AuthCredentials::None);
        let edge0 = h.session.edge("0");
        let edge1 = h.session.edge("1");

        h.push(json!({
            "jsonrpc": "2.0",
            "method": "edgeRpc",
            "params": {"edgeId": "1", "payload": {
                "jsonrpc": "2.0", "method": "currentData", "params": {"_sum/EssSoc": 77}
            }}
        }));
        // Unknown edges and methods are ignored.
        h.push(json!({
            "method": "edgeRpc",
            "params": {"edgeId": "9", "payload": {"method": "currentData", "params": {}}}
        }));
        h.push(json!({"method": "somethingElse", "params": {}}));
        settle().await;

        assert!(edge0.current_data().current().is_none());
        let data = edge1.current_data().current().cloned().unwrap();
        assert_eq!(data.get(&"_sum/EssSoc".parse().unwrap()), Some(&json!(77)));
    }

    #[tokio::test(start_paused = true)]
    async fn edge_requests_settle_through_dispatch() {
        let h = Harness::new(AuthCredentials::None);
        h.events.send(TransportEvent::Connected).unwrap();
        h.session.wait_connected(Duration::from_secs(1)).await.unwrap();

        let edge = h.session.edge("0");
        settle().await;
        // Registering while connected fetches the config.
        let outer = h.sent(0);
        let inner: JsonrpcRequest =
            serde_json::from_value(outer.params["payload"].clone()).unwrap();
        assert_eq!(inner.method, "getEdgeConfig");

        let reply = JsonrpcResponseSuccess::new(
            outer.id,
            json!({"payload": {"id": inner.id, "result": {
                "components": {"c1": {"factoryId": "F1"}},
                "factories": {"F1": {"natureIds": ["N1"]}}
            }}}),
        );
        h.push(serde_json::to_value(reply).unwrap());

        let config = tokio::time::timeout(Duration::from_secs(1), edge.first_valid_config())
            .await
            .unwrap();
        assert_eq!(config.natures()["N1"].factory_ids, vec!["F1".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_fails_pending_and_reconnect_resubscribes() {
        let h = Harness::new(AuthCredentials::None);
        h.events.send(TransportEvent::Connected).unwrap();
        h.session.wait_connected(Duration::from_secs(1)).await.unwrap();
        let edge = h.session.edge("0");

        let pending = tokio::spawn({
            let session = h.session.clone();
            async move { session.send_request(requests::get_edge_config()).await }
        });
        settle().await;

        h.events.send(TransportEvent::Disconnected).unwrap();
        settle().await;
        assert!(matches!(pending.await.unwrap(), Err(CoreError::ConnectionLost)));
        assert_eq!(edge.connection_state(), ConnectionState::Disconnected);
        assert_eq!(h.session.state(), SessionState::Disconnected);

        edge.subscribe_channels("w", vec!["_sum/EssSoc".parse().unwrap()]);
        tokio::time::sleep(Duration::from_millis(150)).await;
        let before = h.wire.sent.lock().len();

        h.events.send(TransportEvent::Connected).unwrap();
        h.session.wait_connected(Duration::from_secs(1)).await.unwrap();
        settle().await;

        let methods: Vec<String> = h.wire.sent.lock()[before..]
            .iter()
            .filter_map(|r| r.params["payload"]["method"].as_str().map(str::to_owned))
            .collect();
        assert!(methods.contains(&"subscribeChannels".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_dispatch() {
        let h = Harness::new(AuthCredentials::None);
        let edge = h.session.edge("0");
        h.session.shutdown();
        settle().await;

        // Events after shutdown have no effect.
        let _ = h.events.send(TransportEvent::Connected);
        settle().await;
        assert_eq!(edge.connection_state(), ConnectionState::Disconnected);
        assert_ne!(h.session.state(), SessionState::Connected);
    }
}
