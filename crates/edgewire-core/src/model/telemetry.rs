// ── Telemetry payloads ──
//
// `currentData` snapshots (replaced wholesale per notification) and
// `systemLog` lines pushed by the Edge.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::channel_address::ChannelAddress;

/// Latest values of all subscribed channels, keyed by `component/channel`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrentData {
    pub channels: IndexMap<String, Value>,
}

impl CurrentData {
    pub fn get(&self, address: &ChannelAddress) -> Option<&Value> {
        self.channels.get(&address.to_string())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Entries whose key parses as a channel address.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelAddress, &Value)> {
        self.channels
            .iter()
            .filter_map(|(k, v)| k.parse().ok().map(|addr| (addr, v)))
    }
}

/// Severity of a system log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// One line of the Edge's system log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemLog {
    /// RFC 3339 timestamp as sent by the Edge.
    pub time: String,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

impl SystemLog {
    /// Timestamp parsed into UTC, if it is valid RFC 3339.
    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.time)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    }
}
