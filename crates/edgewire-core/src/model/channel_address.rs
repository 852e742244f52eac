// ── ChannelAddress ──
//
// Identifies one data point on the Edge: `componentId/channelId`.
// Serialized in that string form everywhere on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Address of a channel: `(component_id, channel_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelAddress {
    component_id: String,
    channel_id: String,
}

impl ChannelAddress {
    pub fn new(component_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            channel_id: channel_id.into(),
        }
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

/// Returned when a string is not of the form `component/channel`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid channel address '{0}', expected 'componentId/channelId'")]
pub struct ParseChannelAddressError(pub String);

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component_id, self.channel_id)
    }
}

impl FromStr for ChannelAddress {
    type Err = ParseChannelAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((component, channel)) if !component.is_empty() && !channel.is_empty() => {
                Ok(Self::new(component, channel))
            }
            _ => Err(ParseChannelAddressError(s.to_owned())),
        }
    }
}

impl Serialize for ChannelAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
