// ── Factory categories ──
//
// Groups factories and components for display. Categories are checked
// in table order and each factory lands in the first category that
// selects it; "Other" catches the rest.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::EdgeConfig;
use super::natures;
use crate::model::{Component, Factory};

/// Title and icon of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub title: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorizedFactories<'a> {
    pub category: Category,
    pub factories: Vec<&'a Factory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorizedComponents<'a> {
    pub category: Category,
    pub components: Vec<&'a Component>,
}

/// Icon for factories that fall in no category.
pub const DEFAULT_ICON: &str = "stats-chart-outline";

enum Selector {
    IdPrefix(&'static str),
    Nature {
        include: &'static str,
        exclude: Option<&'static str>,
    },
    Ids(&'static [&'static str]),
    /// Index into `PATTERNS`.
    Patterns(usize),
    All,
}

struct Rule {
    category: Category,
    selectors: &'static [Selector],
}

const fn nature(include: &'static str) -> Selector {
    Selector::Nature {
        include,
        exclude: None,
    }
}

static PATTERN_SOURCES: &[&[&str]] = &[
    &[r"Controller\.Asymmetric.*", r"Controller\.Ess.*", r"Controller\.Symmetric.*"],
    &[r"TimeOfUseTariff\.*"],
];

static PATTERNS: LazyLock<Vec<Vec<Regex>>> = LazyLock::new(|| {
    PATTERN_SOURCES
        .iter()
        .map(|group| group.iter().filter_map(|p| Regex::new(p).ok()).collect())
        .collect()
});

static RULES: &[Rule] = &[
    Rule {
        category: Category { title: "Simulators", icon: "flask-outline" },
        selectors: &[Selector::IdPrefix("Simulator.")],
    },
    Rule {
        category: Category { title: "Meters", icon: "speedometer-outline" },
        selectors: &[
            nature(natures::SYMMETRIC_METER),
            Selector::Nature {
                include: natures::ELECTRICITY_METER,
                exclude: Some(natures::EVCS),
            },
            nature(natures::ESS_DC_CHARGER),
        ],
    },
    Rule {
        category: Category { title: "Energy storage systems", icon: "battery-charging-outline" },
        selectors: &[
            nature(natures::SYMMETRIC_ESS),
            nature(natures::BATTERY),
            nature(natures::MANAGED_SYMMETRIC_BATTERY_INVERTER),
        ],
    },
    Rule {
        category: Category { title: "Energy storage control", icon: "options-outline" },
        selectors: &[Selector::Patterns(0)],
    },
    Rule {
        category: Category { title: "EV charging stations", icon: "car-outline" },
        selectors: &[nature(natures::EVCS)],
    },
    Rule {
        category: Category { title: "EV charging control", icon: "options-outline" },
        selectors: &[Selector::Ids(&["Controller.Evcs"])],
    },
    Rule {
        category: Category { title: "I/Os", icon: "log-in-outline" },
        selectors: &[nature(natures::DIGITAL_OUTPUT), nature(natures::DIGITAL_INPUT)],
    },
    Rule {
        category: Category { title: "I/O control", icon: "options-outline" },
        selectors: &[Selector::Ids(&[
            "Controller.IO.ChannelSingleThreshold",
            "Controller.Io.FixDigitalOutput",
            "Controller.IO.HeatingElement",
            "Controller.Io.HeatPump.SgReady",
        ])],
    },
    Rule {
        category: Category { title: "Temperature sensors", icon: "thermometer-outline" },
        selectors: &[nature(natures::THERMOMETER)],
    },
    Rule {
        category: Category { title: "External interfaces", icon: "megaphone-outline" },
        selectors: &[Selector::Ids(&[
            "Controller.Api.Websocket",
            "Controller.Api.ModbusTcp",
            "Controller.Api.ModbusTcp.ReadOnly",
            "Controller.Api.ModbusTcp.ReadWrite",
            "Controller.Api.MQTT",
            "Controller.Api.Rest.ReadOnly",
            "Controller.Api.Rest.ReadWrite",
        ])],
    },
    Rule {
        category: Category { title: "Cloud interfaces", icon: "cloud-outline" },
        selectors: &[Selector::Patterns(1), Selector::Ids(&["Controller.Api.Backend"])],
    },
    Rule {
        category: Category { title: "Device interfaces", icon: "swap-horizontal-outline" },
        selectors: &[Selector::Ids(&[
            "Bridge.Mbus",
            "Bridge.Onewire",
            "Bridge.Modbus.Serial",
            "Bridge.Modbus.Tcp",
            "Kaco.BlueplanetHybrid10.Core",
        ])],
    },
    Rule {
        category: Category { title: "Standard components", icon: "resize-outline" },
        selectors: &[
            Selector::Ids(&["Controller.Debug.Log", "Controller.Debug.DetailedLog"]),
            nature(natures::TIMEDATA),
            nature(natures::PREDICTOR_24_HOURS),
            nature(natures::SCHEDULER),
        ],
    },
    Rule {
        category: Category { title: "Special controllers", icon: "repeat-outline" },
        selectors: &[nature(natures::CONTROLLER)],
    },
    Rule {
        category: Category { title: "Other", icon: "radio-button-off-outline" },
        selectors: &[Selector::All],
    },
];

impl EdgeConfig {
    fn select(&self, selector: &Selector) -> Vec<&Factory> {
        match selector {
            Selector::IdPrefix(prefix) => self
                .factories()
                .values()
                .filter(|f| f.id.starts_with(prefix))
                .collect(),
            Selector::Nature { include, exclude } => self.factories_by_nature(include, *exclude),
            Selector::Ids(ids) => self.factories_by_ids(ids),
            Selector::Patterns(group) => PATTERNS
                .get(*group)
                .map(|patterns| self.factories_by_id_pattern(patterns))
                .unwrap_or_default(),
            Selector::All => self.factories().values().collect(),
        }
    }

    /// All factories grouped by category. Each factory appears once, in
    /// the first category that selects it; categories are sorted by
    /// factory id and empty ones are omitted.
    pub fn list_available_factories(&self) -> Vec<CategorizedFactories<'_>> {
        let mut listed: HashSet<&str> = HashSet::new();
        let mut result = Vec::new();

        for rule in RULES {
            let mut factories: Vec<&Factory> = Vec::new();
            for selector in rule.selectors {
                for factory in self.select(selector) {
                    if !listed.contains(factory.id.as_str())
                        && !factories.iter().any(|f| f.id == factory.id)
                    {
                        factories.push(factory);
                    }
                }
            }
            if factories.is_empty() {
                continue;
            }
            listed.extend(factories.iter().map(|f| f.id.as_str()));
            factories.sort_by(|a, b| a.id.cmp(&b.id));
            result.push(CategorizedFactories {
                category: rule.category,
                factories,
            });
        }
        result
    }

    /// Configured components grouped by their factory's category, minus
    /// `ignore`. Each component appears once; categories are sorted by
    /// component id and empty ones are omitted.
    pub fn list_active_components(&self, ignore: &[&str]) -> Vec<CategorizedComponents<'_>> {
        let mut listed: HashSet<&str> = ignore.iter().copied().collect();
        let mut result = Vec::new();

        for entry in self.list_available_factories() {
            let mut components: Vec<&Component> = Vec::new();
            for factory in entry.factories {
                for component in self.components_by_factory(&factory.id) {
                    if !listed.contains(component.id.as_str())
                        && !components.iter().any(|c| c.id == component.id)
                    {
                        components.push(component);
                    }
                }
            }
            if components.is_empty() {
                continue;
            }
            components.sort_by(|a, b| a.id.cmp(&b.id));
            listed.extend(components.iter().map(|c| c.id.as_str()));
            result.push(CategorizedComponents {
                category: entry.category,
                components,
            });
        }
        result
    }

    /// Icon of the category a factory is listed under.
    pub fn factory_icon(&self, factory_id: &str) -> &'static str {
        self.list_available_factories()
            .into_iter()
            .find(|entry| entry.factories.iter().any(|f| f.id == factory_id))
            .map_or(DEFAULT_ICON, |entry| entry.category.icon)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> EdgeConfig {
        EdgeConfig::from_value(json!({
            "components": {
                "meter1": {"factoryId": "Meter.Socomec"},
                "meter0": {"factoryId": "Simulator.GridMeter.Acting"},
                "ess0": {"factoryId": "Ess.Generic"},
                "ctrlEssLimiter0": {"factoryId": "Controller.Ess.Limiter"},
                "evcs0": {"factoryId": "Evcs.Keba"},
                "misc0": {"factoryId": "Misc.Thing"},
                "_sum": {"factoryId": ""}
            },
            "factories": {
                "Simulator.GridMeter.Acting": {"natureIds": [natures::ELECTRICITY_METER]},
                "Meter.Socomec": {"natureIds": [natures::ELECTRICITY_METER]},
                "Ess.Generic": {"natureIds": [natures::SYMMETRIC_ESS]},
                "Controller.Ess.Limiter": {"natureIds": [natures::CONTROLLER]},
                "Evcs.Keba": {"natureIds": [natures::EVCS, natures::ELECTRICITY_METER]},
                "Misc.Thing": {"natureIds": []},
                "Unused.Factory": {"natureIds": []}
            }
        }))
        .unwrap()
    }

    fn titles<T>(entries: &[T], title: impl Fn(&T) -> &'static str) -> Vec<&'static str> {
        entries.iter().map(title).collect()
    }

    #[test]
    fn patterns_compile() {
        let expected: usize = PATTERN_SOURCES.iter().map(|g| g.len()).sum();
        let compiled: usize = PATTERNS.iter().map(Vec::len).sum();
        assert_eq!(compiled, expected);
    }

    #[test]
    fn factories_land_in_first_matching_category() {
        let config = config();
        let listed = config.list_available_factories();

        assert_eq!(
            titles(&listed, |e| e.category.title),
            vec![
                "Simulators",
                "Meters",
                "Energy storage systems",
                "Energy storage control",
                "EV charging stations",
                "Other"
            ]
        );
        // The simulator meter is not repeated under Meters; Evcs is excluded from Meters.
        let meters: Vec<&str> = listed[1].factories.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(meters, vec!["Meter.Socomec"]);
        // Controller.Ess.* is claimed by storage control before Special controllers.
        assert!(!titles(&listed, |e| e.category.title).contains(&"Special controllers"));
        let other: Vec<&str> = listed[5].factories.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(other, vec!["Misc.Thing", "Unused.Factory"]);
    }

    #[test]
    fn every_factory_listed_once() {
        let config = config();
        let all: Vec<&str> = config
            .list_available_factories()
            .iter()
            .flat_map(|e| e.factories.iter().map(|f| f.id.as_str()))
            .collect();
        let unique: HashSet<&str> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(unique.len(), config.factories().len());
    }

    #[test]
    fn active_components_grouped_and_filtered() {
        let config = config();
        let listed = config.list_active_components(&["meter1"]);

        let ids: Vec<Vec<&str>> = listed
            .iter()
            .map(|e| e.components.iter().map(|c| c.id.as_str()).collect())
            .collect();
        assert_eq!(
            ids,
            vec![
                vec!["meter0"],
                vec!["ess0"],
                vec!["ctrlEssLimiter0"],
                vec!["evcs0"],
                vec!["misc0"]
            ]
        );
        assert_eq!(listed[0].category.title, "Simulators");
    }

    #[test]
    fn icons_follow_category() {
        let config = config();
        assert_eq!(config.factory_icon("Evcs.Keba"), "car-outline");
        assert_eq!(config.factory_icon("Misc.Thing"), "radio-button-off-outline");
        assert_eq!(config.factory_icon("Not.There"), DEFAULT_ICON);
    }
}
