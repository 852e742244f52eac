// edgewire-api: JSON-RPC wire layer for remote energy-management edges

pub mod correlator;
pub mod envelope;
pub mod error;
pub mod jsonrpc;
pub mod transport;
pub mod websocket;

pub use correlator::Correlator;
pub use error::Error;
pub use jsonrpc::{
    JsonrpcError, JsonrpcMessage, JsonrpcNotification, JsonrpcRequest, JsonrpcResponse,
    JsonrpcResponseError, JsonrpcResponseSuccess,
};
pub use transport::{TlsMode, Transport, TransportConfig};
pub use websocket::{ReconnectConfig, TransportEvent, WebSocketHandle};
