// ── Edge config graph ──
//
// Turns the flat `{components, factories}` snapshot of an Edge into
// cross-referenced lookup maps: factory → component ids, nature →
// factory ids. A built `EdgeConfig` is immutable; a new snapshot means a
// new build. Cross references are ids resolved at query time.

pub mod categories;
pub mod natures;

use std::collections::HashSet;

use indexmap::IndexMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::CoreError;
use crate::model::{ChannelAddress, Component, ComponentChannel, Factory, Nature};

pub use categories::{Category, CategorizedComponents, CategorizedFactories};

/// Wire shape of `getEdgeConfig` results and `edgeConfig` notifications.
///
/// Entries that fail to decode are logged and dropped; the rest of the
/// snapshot survives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEdgeConfig {
    #[serde(deserialize_with = "component_entries")]
    pub components: IndexMap<String, Component>,
    #[serde(deserialize_with = "factory_entries")]
    pub factories: IndexMap<String, Factory>,
}

fn component_entries<'de, D>(deserializer: D) -> Result<IndexMap<String, Component>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(decode_entries(Option::deserialize(deserializer)?, "component"))
}

fn factory_entries<'de, D>(deserializer: D) -> Result<IndexMap<String, Factory>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(decode_entries(Option::deserialize(deserializer)?, "factory"))
}

fn decode_entries<T: DeserializeOwned>(
    raw: Option<IndexMap<String, Value>>,
    kind: &str,
) -> IndexMap<String, T> {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|(id, value)| match serde_json::from_value(value) {
            Ok(entry) => Some((id, entry)),
            Err(e) => {
                warn!(%id, kind, error = %e, "Skipping undecodable config entry");
                None
            }
        })
        .collect()
}

/// An immutable, cross-referenced configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeConfig {
    components: IndexMap<String, Component>,
    factories: IndexMap<String, Factory>,
    natures: IndexMap<String, Nature>,
}

impl EdgeConfig {
    /// The invalid, empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a raw `{components, factories}` object and build it.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let raw: RawEdgeConfig =
            serde_json::from_value(value).map_err(|e| CoreError::MalformedResponse {
                message: format!("invalid edge config: {e}"),
            })?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_raw(raw: RawEdgeConfig) -> Self {
        Self::build(raw.components, raw.factories)
    }

    /// Build the graph.
    ///
    /// Ids come from the map keys. Factory `component_ids` are recomputed
    /// from scratch. A component whose factory is unknown is skipped with a
    /// warning; if no factory definitions arrived at all, no linking is
    /// attempted.
    pub fn build(
        mut components: IndexMap<String, Component>,
        mut factories: IndexMap<String, Factory>,
    ) -> Self {
        for (id, component) in &mut components {
            component.id.clone_from(id);
            component.is_enabled = component
                .properties
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(true);
        }

        let mut natures: IndexMap<String, Nature> = IndexMap::new();
        for (id, factory) in &mut factories {
            factory.id.clone_from(id);
            factory.component_ids.clear();

            for nature_id in &factory.nature_ids {
                natures
                    .entry(nature_id.clone())
                    .or_insert_with(|| Nature::new(nature_id))
                    .factory_ids
                    .push(id.clone());
            }
        }

        if !components.is_empty() && factories.is_empty() {
            let err = CoreError::ConfigInconsistent {
                message: "factory definitions are missing".into(),
            };
            warn!(components = components.len(), "{err}");
        } else {
            for (id, component) in &components {
                if component.is_singleton() {
                    continue;
                }
                match factories.get_mut(&component.factory_id) {
                    Some(factory) => factory.component_ids.push(id.clone()),
                    None => {
                        warn!(
                            component = %id,
                            factory = %component.factory_id,
                            "Factory definition is missing, component left unlinked"
                        );
                    }
                }
            }
        }

        Self {
            components,
            factories,
            natures,
        }
    }

    /// Valid once both components and factories are present.
    pub fn is_valid(&self) -> bool {
        !self.components.is_empty() && !self.factories.is_empty()
    }

    pub fn components(&self) -> &IndexMap<String, Component> {
        &self.components
    }

    pub fn factories(&self) -> &IndexMap<String, Factory> {
        &self.factories
    }

    pub fn natures(&self) -> &IndexMap<String, Nature> {
        &self.natures
    }

    // ── Component lookups ───────────────────────────────────────────

    pub fn component(&self, component_id: &str) -> Option<&Component> {
        self.components.get(component_id)
    }

    pub fn factory(&self, factory_id: &str) -> Option<&Factory> {
        self.factories.get(factory_id)
    }

    pub fn component_properties(&self, component_id: &str) -> Option<&IndexMap<String, Value>> {
        self.component(component_id).map(|c| &c.properties)
    }

    /// Typed read of one component property. `None` if the component or
    /// property is missing or has a different type.
    pub fn property_of_component<T: DeserializeOwned>(
        &self,
        component_id: &str,
        property: &str,
    ) -> Option<T> {
        let value = self.component(component_id)?.property(property)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Follow a property that holds another component's id, e.g. a
    /// controller's `ess.id`.
    pub fn component_from_other_component_property(
        &self,
        component_id: &str,
        property: &str,
    ) -> Option<&Component> {
        let target = self.component(component_id)?.property(property)?.as_str()?;
        self.component(target)
    }

    pub fn channel(&self, address: &ChannelAddress) -> Option<&ComponentChannel> {
        self.component(address.component_id())?
            .channel(address.channel_id())
    }

    // ── Factory → components ────────────────────────────────────────

    pub fn component_ids_by_factory(&self, factory_id: &str) -> &[String] {
        self.factories
            .get(factory_id)
            .map(|f| f.component_ids.as_slice())
            .unwrap_or_default()
    }

    pub fn components_by_factory(&self, factory_id: &str) -> Vec<&Component> {
        self.component_ids_by_factory(factory_id)
            .iter()
            .filter_map(|id| self.components.get(id))
            .collect()
    }

    pub fn component_ids_by_factories(&self, factory_ids: &[&str]) -> Vec<&str> {
        factory_ids
            .iter()
            .flat_map(|f| self.component_ids_by_factory(f))
            .map(String::as_str)
            .collect()
    }

    // ── Natures ─────────────────────────────────────────────────────

    /// Components whose factory implements `nature_id`, or a legacy nature
    /// it supersedes (see [`natures::NATURE_ALIASES`]).
    pub fn component_ids_implementing_nature(&self, nature_id: &str) -> Vec<&str> {
        let mut result = Vec::new();
        for id in natures::with_aliases(nature_id) {
            if let Some(nature) = self.natures.get(id) {
                for factory_id in &nature.factory_ids {
                    result.extend(
                        self.component_ids_by_factory(factory_id)
                            .iter()
                            .map(String::as_str),
                    );
                }
            }
        }
        result
    }

    pub fn components_implementing_nature(&self, nature_id: &str) -> Vec<&Component> {
        self.component_ids_implementing_nature(nature_id)
            .into_iter()
            .filter_map(|id| self.components.get(id))
            .collect()
    }

    pub fn is_component_implementing_nature(&self, component_id: &str, nature_id: &str) -> bool {
        self.component_ids_implementing_nature(nature_id)
            .contains(&component_id)
    }

    pub fn nature_ids_by_factory_id(&self, factory_id: &str) -> &[String] {
        self.factories
            .get(factory_id)
            .map(|f| f.nature_ids.as_slice())
            .unwrap_or_default()
    }

    pub fn nature_ids_by_component_id(&self, component_id: &str) -> &[String] {
        self.component(component_id)
            .map(|c| self.nature_ids_by_factory_id(&c.factory_id))
            .unwrap_or_default()
    }

    /// Exact nature match on the component's factory. No aliasing.
    pub fn has_component_nature(&self, nature_id: &str, component_id: &str) -> bool {
        self.nature_ids_by_component_id(component_id)
            .iter()
            .any(|n| n == nature_id)
    }

    // ── Factory selection ───────────────────────────────────────────

    /// Factories implementing `include`, minus those implementing `exclude`.
    pub fn factories_by_nature(&self, include: &str, exclude: Option<&str>) -> Vec<&Factory> {
        let excluded: HashSet<&str> = exclude
            .and_then(|e| self.natures.get(e))
            .map(|n| n.factory_ids.iter().map(String::as_str).collect())
            .unwrap_or_default();

        self.natures
            .get(include)
            .map(|n| {
                n.factory_ids
                    .iter()
                    .filter(|id| !excluded.contains(id.as_str()))
                    .filter_map(|id| self.factories.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Factories with exactly these ids, in the given order. Unknown ids are skipped.
    pub fn factories_by_ids(&self, factory_ids: &[&str]) -> Vec<&Factory> {
        factory_ids
            .iter()
            .filter_map(|id| self.factories.get(*id))
            .collect()
    }

    /// Factories whose id matches any pattern, grouped by pattern.
    pub fn factories_by_id_pattern(&self, patterns: &[Regex]) -> Vec<&Factory> {
        patterns
            .iter()
            .flat_map(|p| self.factories.values().filter(|f| p.is_match(&f.id)))
            .collect()
    }

    // ── Energy topology ─────────────────────────────────────────────

    pub fn has_storage(&self) -> bool {
        !self
            .component_ids_implementing_nature(natures::SYMMETRIC_ESS)
            .is_empty()
    }

    pub fn has_meter(&self) -> bool {
        !self
            .component_ids_implementing_nature(natures::ELECTRICITY_METER)
            .is_empty()
    }

    /// A DC charger, or any enabled meter that is a producer.
    pub fn has_producer(&self) -> bool {
        if !self
            .component_ids_implementing_nature(natures::ESS_DC_CHARGER)
            .is_empty()
        {
            return true;
        }
        self.components_implementing_nature(natures::ELECTRICITY_METER)
            .into_iter()
            .any(|c| c.is_enabled && self.is_producer(c))
    }

    /// Meter of type `PRODUCTION`, a PV inverter, a DC charger, or one of
    /// the factories known to report production without saying so.
    pub fn is_producer(&self, component: &Component) -> bool {
        const PRODUCTION_FACTORIES: &[&str] = &[
            "Fenecon.Dess.PvMeter",
            "Fenecon.Mini.PvMeter",
            "Fenecon.Pro.PvMeter",
            "Simulator.ProductionMeter.Acting",
        ];

        if meter_type(component) == Some("PRODUCTION") {
            return true;
        }
        let nature_ids = self.nature_ids_by_factory_id(&component.factory_id);
        if nature_ids.iter().any(|n| {
            n == natures::MANAGED_SYMMETRIC_PV_INVERTER || n == natures::ESS_DC_CHARGER
        }) {
            return true;
        }
        PRODUCTION_FACTORIES.contains(&component.factory_id.as_str())
    }

    pub fn is_type_consumption_metered(&self, component: &Component) -> bool {
        if meter_type(component) == Some("CONSUMPTION_METERED") {
            return true;
        }
        if component.factory_id == "GoodWe.EmergencyPowerMeter" {
            return true;
        }
        let nature_ids = self.nature_ids_by_factory_id(&component.factory_id);
        nature_ids.iter().any(|n| n == natures::EVCS)
            && !nature_ids.iter().any(|n| n == natures::META_EVCS)
    }

    pub fn is_type_grid(&self, component: &Component) -> bool {
        const GRID_FACTORIES: &[&str] = &[
            "GoodWe.Grid-Meter",
            "Kaco.BlueplanetHybrid10.GridMeter",
            "Fenecon.Dess.GridMeter",
            "Fenecon.Mini.GridMeter",
            "Kostal.Piko.GridMeter",
            "SolarEdge.Grid-Meter",
            "Simulator.GridMeter.Acting",
            "Simulator.GridMeter.Reacting",
        ];

        meter_type(component) == Some("GRID")
            || GRID_FACTORIES.contains(&component.factory_id.as_str())
    }
}

fn meter_type(component: &Component) -> Option<&str> {
    component.property("type")?.as_str()
}

// ── Tests ────────────────────────────────────────────────────────────
