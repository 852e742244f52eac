// ── Domain model ──

pub mod channel_address;
pub mod component;
pub mod edge_meta;
mod lenient;
pub mod telemetry;

pub use channel_address::{ChannelAddress, ParseChannelAddressError};
pub use component::{
    AccessMode, ChannelCategory, ChannelType, Component, ComponentChannel, Factory,
    FactoryProperty, Level, Nature, PersistencePriority,
};
pub use edge_meta::{EdgeMetadata, EdgeVersion, Role};
pub use telemetry::{CurrentData, LogLevel, SystemLog};
