// ── Core error types ──
//
// User-facing errors from edgewire-core. Consumers never see raw
// deserialization failures or envelope internals; the
// `From<edgewire_api::Error>` impl translates wire-layer errors into
// domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to edge at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Connection lost before a response arrived")]
    ConnectionLost,

    #[error("Request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    // ── Remote errors ────────────────────────────────────────────────
    /// The Edge answered with a JSON-RPC error.
    #[error("Edge rejected request ({code}): {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A response arrived but did not have the expected shape.
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Component not found: {id}")]
    ComponentNotFound { id: String },

    #[error("Factory not found: {id}")]
    FactoryNotFound { id: String },

    #[error("Channel not found: {address}")]
    ChannelNotFound { address: String },

    #[error("Edge not found: {id}")]
    EdgeNotFound { id: String },

    /// Config snapshot references something that does not exist.
    #[error("Inconsistent edge config: {message}")]
    ConfigInconsistent { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if retrying after a reconnect might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionLost | Self::Timeout { .. } | Self::ConnectionFailed { .. }
        )
    }
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<edgewire_api::Error> for CoreError {
    fn from(err: edgewire_api::Error) -> Self {
        match err {
            edgewire_api::Error::MalformedEnvelope(message) => {
                CoreError::MalformedResponse { message }
            }
            edgewire_api::Error::UnmatchedResponse { id } => CoreError::MalformedResponse {
                message: format!("unmatched response id {id}"),
            },
            edgewire_api::Error::Remote {
                code,
                message,
                data,
            } => CoreError::Remote {
                code,
                message,
                data,
            },
            edgewire_api::Error::ConnectionLost | edgewire_api::Error::Transport(_) => {
                CoreError::ConnectionLost
            }
            edgewire_api::Error::Timeout { method, timeout_ms } => {
                CoreError::Timeout { method, timeout_ms }
            }
            edgewire_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            edgewire_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            edgewire_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            edgewire_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            edgewire_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedResponse { message }
            }
            edgewire_api::Error::Serialization(e) => {
                CoreError::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_keep_code_and_message() {
        let err: CoreError = edgewire_api::Error::Remote {
            code: 1,
            message: "Access denied".into(),
            data: None,
        }
        .into();
        assert!(matches!(err, CoreError::Remote { code: 1, ref message, .. } if message == "Access denied"));
    }

    #[test]
    fn refused_send_is_connection_lost() {
        let err: CoreError = edgewire_api::Error::Transport("not connected".into()).into();
        assert!(matches!(err, CoreError::ConnectionLost));
        assert!(err.is_transient());
    }

    #[test]
    fn malformed_envelope_is_malformed_response() {
        let err: CoreError = edgewire_api::Error::MalformedEnvelope("no payload".into()).into();
        assert!(matches!(err, CoreError::MalformedResponse { .. }));
        assert!(!err.is_transient());
    }
}
