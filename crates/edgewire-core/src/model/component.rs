// ── Component / Factory / Nature ──
//
// Domain types of an Edge configuration. Components and factories are
// deserialized straight from the `getEdgeConfig` payload; the fields
// marked `skip_deserializing` are derived by the graph builder and
// never read from the wire. Natures exist only as a derived index.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use super::lenient::{null_as_default, unknown_as_none};

// ── Channel metadata ────────────────────────────────────────────────

/// Data type of a channel value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelType {
    Boolean,
    Short,
    Integer,
    Long,
    Float,
    Double,
    String,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Read/write access of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum AccessMode {
    #[serde(rename = "RO")]
    #[strum(serialize = "RO")]
    ReadOnly,
    #[serde(rename = "RW")]
    #[strum(serialize = "RW")]
    ReadWrite,
    #[serde(rename = "WO")]
    #[strum(serialize = "WO")]
    WriteOnly,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelCategory {
    OpenemsType,
    Enum,
    State,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Severity of a state channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Info,
    Ok,
    Warning,
    Fault,
    #[default]
    #[serde(other)]
    Unknown,
}

/// How eagerly a channel is persisted. Ordered from lowest to highest.
///
/// Values this client does not know decode to `None` where a channel
/// carries a priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PersistencePriority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl PersistencePriority {
    pub const DEFAULT_CHANNEL: Self = Self::VeryLow;
    pub const DEFAULT_GLOBAL: Self = Self::High;
}

/// Metadata of one channel, as shipped inside a component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComponentChannel {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub channel_type: ChannelType,
    #[serde(deserialize_with = "null_as_default")]
    pub access_mode: AccessMode,
    #[serde(deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(deserialize_with = "null_as_default")]
    pub category: ChannelCategory,
    #[serde(deserialize_with = "null_as_default")]
    pub level: Level,
    #[serde(
        deserialize_with = "unknown_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub persistence_priority: Option<PersistencePriority>,
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    /// Enum options: label → numeric value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<IndexMap<String, i64>>,
}

// ── Component ───────────────────────────────────────────────────────

/// A configured component instance on the Edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Assigned from the map key when the graph is built.
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub alias: String,
    /// Empty for singleton components, which have no factory.
    #[serde(default, deserialize_with = "null_as_default")]
    pub factory_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<IndexMap<String, ComponentChannel>>,
    /// `properties.enabled` when it is a boolean, otherwise `true`.
    #[serde(skip_deserializing)]
    pub is_enabled: bool,
}

impl Component {
    pub fn is_singleton(&self) -> bool {
        self.factory_id.is_empty()
    }

    /// Alias if set, otherwise the id.
    pub fn display_name(&self) -> &str {
        if self.alias.is_empty() { &self.id } else { &self.alias }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn channel(&self, channel_id: &str) -> Option<&ComponentChannel> {
        self.channels.as_ref()?.get(channel_id)
    }
}

// ── Factory ─────────────────────────────────────────────────────────

/// Schema descriptor of one configurable factory property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactoryProperty {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub property_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_required: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_password: bool,
    pub default_value: Value,
    pub schema: Value,
}

/// A component type definition, identified by its factory PID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Factory {
    /// Assigned from the map key when the graph is built.
    #[serde(skip_deserializing)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nature_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Vec<FactoryProperty>,
    /// Recomputed on every build; never taken from input.
    #[serde(skip_deserializing)]
    pub component_ids: Vec<String>,
}

impl Factory {
    pub fn property(&self, property_id: &str) -> Option<&FactoryProperty> {
        self.properties.iter().find(|p| p.id == property_id)
    }
}

// ── Nature ──────────────────────────────────────────────────────────

/// An interface implemented by factories, e.g. `io.openems.edge.ess.api.SymmetricEss`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Nature {
    pub id: String,
    /// Last `.`-separated segment of the id.
    pub name: String,
    pub factory_ids: Vec<String>,
}

impl Nature {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: id.rsplit('.').next().unwrap_or(id).to_owned(),
            factory_ids: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn component_ignores_id_in_payload() {
        let c: Component = serde_json::from_value(json!({
            "id": "bogus",
            "alias": "Battery",
            "factoryId": "Ess.Generic",
            "properties": {"enabled": false},
            "isEnabled": true
        }))
        .unwrap();
        assert_eq!(c.id, "");
        assert!(!c.is_enabled);
        assert_eq!(c.alias, "Battery");
    }

    #[test]
    fn channel_metadata_tolerates_unknown_values() {
        let ch: ComponentChannel = serde_json::from_value(json!({
            "type": "INTEGER",
            "accessMode": "RW",
            "unit": "W",
            "category": "ENUM",
            "level": "SOMETHING_NEW",
            "text": "",
            "options": {"ON": 1, "OFF": 0},
            "extra": "ignored"
        }))
        .unwrap();
        assert_eq!(ch.channel_type, ChannelType::Integer);
        assert_eq!(ch.access_mode, AccessMode::ReadWrite);
        assert_eq!(ch.level, Level::Unknown);
        assert_eq!(ch.options.unwrap()["ON"], 1);
    }

    #[test]
    fn factory_property_lookup() {
        let f: Factory = serde_json::from_value(json!({
            "name": "Modbus TCP",
            "natureIds": ["io.openems.edge.bridge.modbus.api.BridgeModbus"],
            "properties": [
                {"id": "ip", "name": "IP-Address", "type": "string", "isRequired": true},
                {"id": "port", "name": "Port", "defaultValue": 502}
            ],
            "componentIds": ["should-not-be-read"]
        }))
        .unwrap();
        assert!(f.component_ids.is_empty());
        assert!(f.property("ip").unwrap().is_required);
        assert_eq!(f.property("port").unwrap().default_value, json!(502));
        assert!(f.property("missing").is_none());
    }

    #[test]
    fn null_strings_decode_as_empty() {
        let f: Factory = serde_json::from_value(json!({
            "name": "Meter",
            "description": null,
            "natureIds": null,
            "properties": [
                {"id": "alias", "name": null, "description": null, "type": null,
                 "isRequired": null, "defaultValue": null}
            ]
        }))
        .unwrap();
        assert_eq!(f.description, "");
        assert!(f.nature_ids.is_empty());
        let alias = f.property("alias").unwrap();
        assert_eq!(alias.name, "");
        assert_eq!(alias.property_type, "");
        assert!(!alias.is_required);

        let c: Component = serde_json::from_value(json!({
            "alias": null,
            "factoryId": "Meter",
            "properties": null
        }))
        .unwrap();
        assert_eq!(c.alias, "");
        assert!(c.properties.is_empty());
    }

    #[test]
    fn unknown_persistence_priority_is_dropped() {
        let ch: ComponentChannel = serde_json::from_value(json!({
            "type": "INTEGER",
            "unit": null,
            "text": null,
            "level": null,
            "persistencePriority": "SOMETHING"
        }))
        .unwrap();
        assert_eq!(ch.persistence_priority, None);
        assert_eq!(ch.unit, "");
        assert_eq!(ch.level, Level::Unknown);

        let ch: ComponentChannel =
            serde_json::from_value(json!({"persistencePriority": "HIGH"})).unwrap();
        assert_eq!(ch.persistence_priority, Some(PersistencePriority::High));
    }

    #[test]
    fn nature_name_is_last_segment() {
        assert_eq!(Nature::new("io.openems.edge.ess.api.SymmetricEss").name, "SymmetricEss");
        assert_eq!(Nature::new("Plain").name, "Plain");
    }

    #[test]
    fn persistence_priority_ordering() {
        assert!(PersistencePriority::VeryLow < PersistencePriority::High);
        assert_eq!(
            "VERY_HIGH".parse::<PersistencePriority>().unwrap(),
            PersistencePriority::VeryHigh
        );
    }
}
