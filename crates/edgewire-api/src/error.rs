use thiserror::Error;

/// Top-level error type for the `edgewire-api` crate.
///
/// Covers every failure mode of the wire layer: envelope decoding,
/// request correlation, remote JSON-RPC errors, and the WebSocket
/// transport. `edgewire-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Protocol ────────────────────────────────────────────────────
    /// An `edgeRpc` envelope lacked its `payload`, or the payload was
    /// not a JSON-RPC message of the expected kind.
    #[error("Malformed edgeRpc envelope: {0}")]
    MalformedEnvelope(String),

    /// A response arrived whose id matches no pending call.
    #[error("Unmatched response id {id}")]
    UnmatchedResponse { id: String },

    /// The remote side answered with a JSON-RPC error object.
    #[error("Remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Pending call was dropped because the transport closed.
    #[error("Connection lost before a response arrived")]
    ConnectionLost,

    /// No response within the configured request timeout.
    #[error("Request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    // ── Transport ───────────────────────────────────────────────────
    /// The transport refused an outbound message (not connected, writer gone).
    #[error("Transport error: {0}")]
    Transport(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed unexpectedly.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Outbound message could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost
                | Self::Timeout { .. }
                | Self::Transport(_)
                | Self::WebSocketConnect(_)
                | Self::WebSocketClosed { .. }
        )
    }

    /// The JSON-RPC error code, if the remote side produced one.
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}
