//! Protocol layer between `edgewire-api` and consumers (CLI, dashboards).
//!
//! - **[`Session`]** owns one WebSocket connection, authenticates, and
//!   dispatches inbound messages: responses settle pending calls,
//!   `edgeRpc` notifications are routed to the [`Edge`] they name.
//!
//! - **[`Edge`]** is the facade for one remote Edge: a cached
//!   [`EdgeConfig`] refreshed at most once per cooldown, a coalescing
//!   [`SubscriptionMultiplexer`] for channel subscriptions, and
//!   replay-latest streams for current data and system log lines.
//!
//! - **[`EdgeConfig`]** is an immutable snapshot of the Edge's components,
//!   factories and the nature index derived from them, with the query
//!   helpers consumers need (by factory, by nature, categorized listings).
//!
//! - **[`StateStream<T>`]** is the subscription handle vended by
//!   [`Broadcaster<T>`]: `current()` / `latest()` / `changed()`, or a
//!   `Stream` via `into_stream()`.

pub mod config;
pub mod edge;
pub mod error;
pub mod graph;
pub mod model;
pub mod requests;
pub mod session;
pub mod stream;
pub mod subscription;
pub mod timing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AuthCredentials, SessionConfig, Timing, TlsVerification};
pub use edge::{ConnectionState, Edge};
pub use error::CoreError;
pub use graph::EdgeConfig;
pub use graph::categories::{CategorizedComponents, CategorizedFactories, Category};
pub use requests::{ChannelInfo, PropertyUpdate};
pub use session::{Session, SessionState};
pub use stream::{Broadcaster, StateStream};
pub use subscription::{SubscribeSink, SubscriptionMultiplexer};
pub use timing::{Cooldown, Debounce};

pub use model::{
    AccessMode, ChannelAddress, ChannelCategory, ChannelType, Component, ComponentChannel,
    CurrentData, EdgeMetadata, EdgeVersion, Factory, FactoryProperty, Level, LogLevel, Nature,
    PersistencePriority, Role, SystemLog,
};

pub use edgewire_api::ReconnectConfig;
