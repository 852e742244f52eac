// ── Well-known natures ──
//
// Nature ids the graph queries and the category table refer to, plus the
// backward-compatibility alias table. The alias table is the only place
// a nature id implies another one.

pub const SYMMETRIC_ESS: &str = "io.openems.edge.ess.api.SymmetricEss";
pub const ESS_DC_CHARGER: &str = "io.openems.edge.ess.dccharger.api.EssDcCharger";
pub const BATTERY: &str = "io.openems.edge.battery.api.Battery";
pub const MANAGED_SYMMETRIC_BATTERY_INVERTER: &str =
    "io.openems.edge.batteryinverter.api.ManagedSymmetricBatteryInverter";
pub const ELECTRICITY_METER: &str = "io.openems.edge.meter.api.ElectricityMeter";
pub const SYMMETRIC_METER: &str = "io.openems.edge.meter.api.SymmetricMeter";
pub const MANAGED_SYMMETRIC_PV_INVERTER: &str =
    "io.openems.edge.pvinverter.api.ManagedSymmetricPvInverter";
pub const EVCS: &str = "io.openems.edge.evcs.api.Evcs";
pub const META_EVCS: &str = "io.openems.edge.evcs.api.MetaEvcs";
pub const DIGITAL_OUTPUT: &str = "io.openems.edge.io.api.DigitalOutput";
pub const DIGITAL_INPUT: &str = "io.openems.edge.io.api.DigitalInput";
pub const THERMOMETER: &str = "io.openems.edge.thermometer.api.Thermometer";
pub const TIMEDATA: &str = "io.openems.edge.timedata.api.Timedata";
pub const PREDICTOR_24_HOURS: &str = "io.openems.edge.predictor.api.oneday.Predictor24Hours";
pub const SCHEDULER: &str = "io.openems.edge.scheduler.api.Scheduler";
pub const CONTROLLER: &str = "io.openems.edge.controller.api.Controller";

/// `(modern, legacy)`: asking for components of `modern` also yields
/// those of `legacy`. `ElectricityMeter` superseded `SymmetricMeter`;
/// older Edges still report only the latter.
pub const NATURE_ALIASES: &[(&str, &str)] = &[(ELECTRICITY_METER, SYMMETRIC_METER)];

/// `nature_id` followed by every legacy id it implies, transitively,
/// without repeats.
pub fn with_aliases(nature_id: &str) -> Vec<&str> {
    let mut ids = vec![nature_id];
    let mut i = 0;
    while let Some(&current) = ids.get(i) {
        for &(modern, legacy) in NATURE_ALIASES {
            if modern == current && !ids.contains(&legacy) {
                ids.push(legacy);
            }
        }
        i += 1;
    }
    ids
}
