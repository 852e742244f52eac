// ── Runtime connection configuration ──
//
// These types describe *how* to talk to an Edge: where it lives, how to
// authenticate, and the timing knobs of the protocol layer. They never
// touch disk. The CLI constructs a `SessionConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use edgewire_api::ReconnectConfig;

/// How to authenticate once the WebSocket is up.
#[derive(Debug, Clone, Default)]
pub enum AuthCredentials {
    /// The endpoint needs no login (direct Edge connection on a LAN).
    #[default]
    None,
    /// `authenticateWithPassword` with an optional username.
    Password {
        username: Option<String>,
        password: SecretString,
    },
}

/// TLS verification strategy for `wss://` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled webpki roots (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Protocol timing. Defaults match the values the Edge UI has always used.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Trailing debounce window for coalescing `subscribeChannels`.
    pub subscribe_window: Duration,
    /// Leading cooldown between two `getEdgeConfig` refreshes.
    pub refresh_cooldown: Duration,
    /// Upper bound on a single request. `None` waits for the connection.
    pub request_timeout: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            subscribe_window: Duration::from_millis(100),
            refresh_cooldown: Duration::from_millis(1000),
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Configuration for one session (one WebSocket, any number of edges).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint, e.g. `ws://192.168.1.10:8085/websocket`.
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Handshake timeout.
    pub connect_timeout: Duration,
    pub reconnect: ReconnectConfig,
    pub timing: Timing,
}

impl SessionConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            auth: AuthCredentials::None,
            tls: TlsVerification::default(),
            connect_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            timing: Timing::default(),
        }
    }

    pub(crate) fn transport(&self) -> edgewire_api::TransportConfig {
        edgewire_api::TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => edgewire_api::TlsMode::System,
                TlsVerification::CustomCa(path) => edgewire_api::TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => edgewire_api::TlsMode::DangerAcceptInvalid,
            },
            connect_timeout: self.connect_timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_timing() {
        let timing = Timing::default();
        assert_eq!(timing.subscribe_window, Duration::from_millis(100));
        assert_eq!(timing.refresh_cooldown, Duration::from_millis(1000));
    }

    #[test]
    fn tls_maps_to_transport_mode() {
        let mut config = SessionConfig::new(Url::parse("wss://edge.local/websocket").unwrap());
        config.tls = TlsVerification::DangerAcceptInvalid;
        assert!(matches!(
            config.transport().tls,
            edgewire_api::TlsMode::DangerAcceptInvalid
        ));
    }
}
