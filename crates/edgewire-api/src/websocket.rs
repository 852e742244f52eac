//! WebSocket JSON-RPC transport with auto-reconnect.
//!
//! Connects to an Edge (or a backend that fronts many Edges), parses every
//! text frame into a [`JsonrpcMessage`], and delivers them in arrival
//! order through a [`TransportEvent`] channel together with connection
//! lifecycle changes. Outbound frames go through the [`Transport`]
//! implementation on [`WebSocketHandle`]. Reconnection uses exponential
//! backoff with jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use edgewire_api::websocket::{ReconnectConfig, TransportEvent, WebSocketHandle};
//! use edgewire_api::transport::TransportConfig;
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("ws://192.168.1.10:8085/websocket")?;
//! let (handle, mut events) = WebSocketHandle::connect(
//!     url,
//!     &TransportConfig::default(),
//!     ReconnectConfig::default(),
//!     CancellationToken::new(),
//! )?;
//!
//! while let Some(event) = events.recv().await {
//!     if let TransportEvent::Message(msg) = event {
//!         println!("{msg:?}");
//!     }
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustls::ClientConfig;
use tokio::sync::mpsc;
use tokio_tungstenite::Connector;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::jsonrpc::JsonrpcMessage;
use crate::transport::{Transport, TransportConfig};

// ── TransportEvent ───────────────────────────────────────────────────

/// What the transport reports to its single consumer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A connection (or reconnection) was established.
    Connected,
    /// A parsed inbound message.
    Message(JsonrpcMessage),
    /// The connection dropped. A reconnect attempt follows unless shut down.
    Disconnected,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running WebSocket connection.
///
/// Implements [`Transport`]: sends are queued to the writer and refused
/// while no connection is up.
pub struct WebSocketHandle {
    outbound: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the reconnection loop for `ws_url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background and is announced with [`TransportEvent::Connected`].
    /// Must be called from within a Tokio runtime.
    pub fn connect(
        ws_url: Url,
        transport: &TransportConfig,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TransportEvent>), Error> {
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme '{}', expected ws or wss",
                ws_url.scheme()
            )));
        }

        let tls = transport.build_tls()?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let link = Link {
            url: ws_url,
            tls,
            connect_timeout: transport.connect_timeout,
            outbound: outbound_rx,
            events: event_tx,
            connected: Arc::clone(&connected),
        };
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(link, reconnect, task_cancel).await;
        });

        Ok((
            Self {
                outbound: outbound_tx,
                connected,
                cancel,
            },
            event_rx,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Transport for WebSocketHandle {
    fn send(&self, text: String) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::Transport("not connected".into()));
        }
        self.outbound
            .send(text)
            .map_err(|_| Error::Transport("writer task stopped".into()))
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Everything one connection attempt needs, reused across reconnects.
struct Link {
    url: Url,
    tls: Option<Arc<ClientConfig>>,
    connect_timeout: Duration,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
}

/// Main loop: connect → pump frames → on error, backoff → reconnect.
///
/// Cancellation is observed inside `connect_and_pump` so a live session
/// always gets to report `Disconnected`.
async fn ws_loop(mut link: Link, reconnect: ReconnectConfig, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    while !cancel.is_cancelled() {
        match connect_and_pump(&mut link, &cancel).await {
            // Clean disconnect: reset the counter and reconnect immediately.
            Ok(()) => {
                if cancel.is_cancelled() {
                    break;
                }
                tracing::info!("WebSocket disconnected cleanly, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "WebSocket error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "WebSocket reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "Waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and pump frames both ways until it drops.
///
/// Emits `Connected` once the handshake completes and `Disconnected`
/// when a connected session ends, whatever the reason.
async fn connect_and_pump(link: &mut Link, cancel: &CancellationToken) -> Result<(), Error> {
    tracing::info!(url = %link.url, "Connecting to WebSocket");

    let connector = link.tls.clone().map(Connector::Rustls);
    let handshake =
        tokio_tungstenite::connect_async_tls_with_config(link.url.as_str(), None, false, connector);
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = tokio::time::timeout(link.connect_timeout, handshake) => result
            .map_err(|_| Error::WebSocketConnect("handshake timed out".into()))?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?,
    };

    // Anything queued against the previous connection is stale.
    while link.outbound.try_recv().is_ok() {}

    tracing::info!("WebSocket connected");
    link.connected.store(true, Ordering::Release);
    let _ = link.events.send(TransportEvent::Connected);

    let result = pump(ws_stream, link, cancel).await;

    link.connected.store(false, Ordering::Release);
    let _ = link.events.send(TransportEvent::Disconnected);
    result
}

async fn pump<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    link: &mut Link,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(());
            }
            Some(text) = link.outbound.recv() => {
                tracing::trace!(len = text.len(), "WebSocket send");
                write
                    .send(Message::text(text))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_forward(text.as_str(), &link.events);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite queues the pong automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text frame and forward it. Unparseable frames are dropped.
fn parse_and_forward(text: &str, events: &mpsc::UnboundedSender<TransportEvent>) {
    match JsonrpcMessage::parse(text) {
        Ok(message) => {
            // No receiver means the session is shutting down.
            let _ = events.send(TransportEvent::Message(message));
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse WebSocket frame");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
        // Very large attempt counts must not overflow.
        assert!(calculate_backoff(u32::MAX, &config) <= Duration::from_secs(13));
    }

    #[test]
    fn forwards_parsed_frames_and_drops_garbage() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        parse_and_forward("{not json", &tx);
        parse_and_forward(r#"{"jsonrpc":"2.0","method":"edgeRpc","params":{}}"#, &tx);

        match rx.try_recv().unwrap() {
            TransportEvent::Message(JsonrpcMessage::Notification(n)) => {
                assert_eq!(n.method, "edgeRpc");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejects_non_websocket_scheme() {
        let url = Url::parse("http://localhost:8085/").unwrap();
        let result = WebSocketHandle::connect(
            url,
            &TransportConfig::default(),
            ReconnectConfig::default(),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }

    #[tokio::test]
    async fn send_is_refused_while_disconnected() {
        let cancel = CancellationToken::new();
        // Port 9 (discard) on localhost: nothing will accept the handshake.
        let url = Url::parse("ws://127.0.0.1:9/").unwrap();
        let (handle, _events) = WebSocketHandle::connect(
            url,
            &TransportConfig::default(),
            ReconnectConfig::default(),
            cancel.clone(),
        )
        .unwrap();

        assert!(!handle.is_connected());
        assert!(matches!(handle.send("{}".into()), Err(Error::Transport(_))));
        handle.shutdown();
    }
}
