//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Deserialize;
use thiserror::Error;

use crate::devices::connector::DEFAULT_DELIVERY_NOISE_KWH;
use crate::sim::policy::LinearControl;
use crate::sim::price::{DEFAULT_PEAK_WINDOWS, PeakWindow};
use crate::sim::types::{BusSchedule, DepotConfig};

/// Policy kinds accepted by `policy.kind`.
pub const POLICY_KINDS: &[&str] = &["greedy", "offline", "learned"];

/// Top-level scenario configuration parsed from TOML.
///
/// Defaults describe the `overnight` depot without jitter. Load from TOML
/// with [`ScenarioConfig::from_toml_file`] or pick a built-in preset with
/// [`ScenarioConfig::from_preset`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Horizon, timestep, and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Chargers, connectors, and grid connection.
    #[serde(default)]
    pub depot: DepotSection,
    /// Buses, batteries, and timetable.
    #[serde(default)]
    pub fleet: FleetConfig,
    /// Time-of-use tariff.
    #[serde(default)]
    pub tariff: TariffConfig,
    /// Charging policy selection.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Horizon, timestep, and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// First instant, e.g. `"2024-12-06T19:00:00"`.
    pub start: NaiveDateTime,
    /// Last instant; must be after `start`.
    pub end: NaiveDateTime,
    /// Timestep length in minutes (must be > 0).
    pub timestep_minutes: i64,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: instant(2024, 12, 6, 19),
            end: instant(2024, 12, 7, 7),
            timestep_minutes: 60,
            seed: 42,
        }
    }
}

/// Depot hardware and grid connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DepotSection {
    /// Number of chargers (must be > 0).
    pub num_chargers: usize,
    /// Connectors per charger (must be > 0).
    pub connectors_per_charger: usize,
    /// Minimum connector power (kW).
    pub min_rate_kw: f32,
    /// Maximum connector power (kW).
    pub max_rate_kw: f32,
    /// Soft cap on aggregate draw (kW).
    pub grid_limit_kw: f32,
    /// Standard deviation of per-tick delivery noise (kWh).
    pub delivery_noise_std_kwh: f32,
}

impl Default for DepotSection {
    fn default() -> Self {
        Self {
            num_chargers: 10,
            connectors_per_charger: 2,
            min_rate_kw: 0.0,
            max_rate_kw: 150.0,
            grid_limit_kw: 500.0,
            delivery_noise_std_kwh: DEFAULT_DELIVERY_NOISE_KWH,
        }
    }
}

/// One explicit timetable entry.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusEntry {
    pub arrival: NaiveDateTime,
    pub departure: NaiveDateTime,
}

/// Fleet composition and timetable.
///
/// When `buses` is non-empty it defines the timetable and `count`,
/// `arrival`, `departure` and `stagger_steps` are ignored. Otherwise `count`
/// buses share the `arrival`/`departure` pair, bus `i` shifted by
/// `i * stagger_steps` timesteps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    /// Number of buses generated from the shared timetable.
    pub count: usize,
    /// Scheduled arrival of the first bus.
    pub arrival: NaiveDateTime,
    /// Scheduled departure of the first bus.
    pub departure: NaiveDateTime,
    /// Timesteps between consecutive generated buses.
    pub stagger_steps: u32,
    /// Explicit per-bus timetable.
    pub buses: Vec<BusEntry>,
    /// Battery capacity (kWh).
    pub battery_capacity_kwh: f32,
    /// State of charge on arrival (percent).
    pub initial_soc_pct: f32,
    /// Target state of charge at departure (percent).
    pub desired_soc_pct: f32,
    /// Timetable jitter standard deviation (timesteps).
    pub jitter_std_steps: f32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            count: 20,
            arrival: instant(2024, 12, 6, 19),
            departure: instant(2024, 12, 7, 5),
            stagger_steps: 0,
            buses: Vec::new(),
            battery_capacity_kwh: 588.0,
            initial_soc_pct: 20.0,
            desired_soc_pct: 90.0,
            jitter_std_steps: 0.0,
        }
    }
}

/// Time-of-use tariff.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffConfig {
    /// Off-peak price per kWh.
    pub off_peak_rate: f32,
    /// On-peak price per kWh.
    pub on_peak_rate: f32,
    /// Weekday on-peak windows; an empty list gives a flat tariff.
    pub peak_windows: Vec<PeakWindow>,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            off_peak_rate: 0.08,
            on_peak_rate: 0.20,
            peak_windows: DEFAULT_PEAK_WINDOWS.to_vec(),
        }
    }
}

/// Charging policy selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// One of [`POLICY_KINDS`].
    pub kind: String,
    /// Weights for the `learned` policy's linear control function.
    pub linear: LinearControl,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: "greedy".to_string(),
            linear: LinearControl::default(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"depot.num_chargers"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn instant(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap_or_default()
}

impl ScenarioConfig {
    /// Twenty buses parked overnight at a ten-charger depot, with
    /// timetable jitter of about one timestep.
    pub fn overnight() -> Self {
        Self {
            fleet: FleetConfig {
                jitter_std_steps: 1.0,
                ..FleetConfig::default()
            },
            ..Self::default()
        }
    }

    /// Three buses with staggered twelve-hour windows over a weekday,
    /// scheduled offline under a 300 kW grid limit.
    pub fn day_ahead() -> Self {
        let day = |h| instant(2024, 12, 9, h);
        Self {
            simulation: SimulationConfig {
                start: day(0),
                end: instant(2024, 12, 10, 0),
                ..SimulationConfig::default()
            },
            depot: DepotSection {
                num_chargers: 2,
                grid_limit_kw: 300.0,
                ..DepotSection::default()
            },
            fleet: FleetConfig {
                buses: vec![
                    BusEntry {
                        arrival: day(0),
                        departure: day(12),
                    },
                    BusEntry {
                        arrival: day(12),
                        departure: instant(2024, 12, 10, 0),
                    },
                    BusEntry {
                        arrival: day(6),
                        departure: day(18),
                    },
                ],
                ..FleetConfig::default()
            },
            tariff: TariffConfig::default(),
            policy: PolicyConfig {
                kind: "offline".to_string(),
                ..PolicyConfig::default()
            },
        }
    }

    /// Three simultaneous arrivals competing for one two-connector charger.
    pub fn constrained() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            depot: DepotSection {
                num_chargers: 1,
                connectors_per_charger: 2,
                ..DepotSection::default()
            },
            fleet: FleetConfig {
                count: 3,
                arrival: instant(2024, 12, 6, 20),
                departure: instant(2024, 12, 7, 4),
                ..FleetConfig::default()
            },
            tariff: TariffConfig::default(),
            policy: PolicyConfig::default(),
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["overnight", "day_ahead", "constrained"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "overnight" => Ok(Self::overnight()),
            "day_ahead" => Ok(Self::day_ahead()),
            "constrained" => Ok(Self::constrained()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Expands the fleet section into one schedule per bus.
    pub fn schedules(&self) -> Vec<BusSchedule> {
        let f = &self.fleet;
        if !f.buses.is_empty() {
            return f
                .buses
                .iter()
                .map(|b| BusSchedule::new(b.arrival, b.departure))
                .collect();
        }
        let stagger =
            TimeDelta::minutes(self.simulation.timestep_minutes * i64::from(f.stagger_steps));
        (0..f.count)
            .map(|i| {
                let offset = stagger * i as i32;
                BusSchedule::new(f.arrival + offset, f.departure + offset)
            })
            .collect()
    }

    /// Builds the immutable depot configuration.
    pub fn to_depot_config(&self) -> DepotConfig {
        let s = &self.simulation;
        let d = &self.depot;
        let f = &self.fleet;
        let t = &self.tariff;

        let mut cfg = DepotConfig::new(s.start, s.end, self.schedules());
        cfg.timestep = TimeDelta::minutes(s.timestep_minutes);
        cfg.seed = s.seed;
        cfg.num_chargers = d.num_chargers;
        cfg.connectors_per_charger = d.connectors_per_charger;
        cfg.min_rate_kw = d.min_rate_kw;
        cfg.max_rate_kw = d.max_rate_kw;
        cfg.grid_limit_kw = d.grid_limit_kw;
        cfg.delivery_noise_std_kwh = d.delivery_noise_std_kwh;
        cfg.battery_capacity_kwh = f.battery_capacity_kwh;
        cfg.initial_soc_pct = f.initial_soc_pct;
        cfg.desired_soc_pct = f.desired_soc_pct;
        cfg.jitter_std_steps = f.jitter_std_steps;
        cfg.off_peak_rate = t.off_peak_rate;
        cfg.on_peak_rate = t.on_peak_rate;
        cfg.peak_windows = t.peak_windows.clone();
        cfg
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if !POLICY_KINDS.contains(&self.policy.kind.as_str()) {
            errors.push(ConfigError::new(
                "policy.kind",
                format!(
                    "must be one of {}, got \"{}\"",
                    POLICY_KINDS.join(", "),
                    self.policy.kind
                ),
            ));
        }
        if self.fleet.buses.is_empty() && self.fleet.count == 0 {
            errors.push(ConfigError::new(
                "fleet.count",
                "must be > 0 when fleet.buses is empty",
            ));
        }
        if self.fleet.buses.is_empty() && self.fleet.departure < self.fleet.arrival {
            errors.push(ConfigError::new(
                "fleet.departure",
                "must not precede fleet.arrival",
            ));
        }

        errors.extend(self.to_depot_config().validate());
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overnight_preset_valid() {
        let cfg = ScenarioConfig::overnight();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "overnight should be valid: {errors:?}");
        assert_eq!(cfg.schedules().len(), 20);
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert_eq!(e.field, "preset");
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
start = "2024-12-09T00:00:00"
end = "2024-12-10T00:00:00"
timestep_minutes = 30
seed = 7

[depot]
num_chargers = 2
connectors_per_charger = 1
max_rate_kw = 100.0
grid_limit_kw = 250.0

[fleet]
battery_capacity_kwh = 400.0
desired_soc_pct = 80.0
jitter_std_steps = 0.5

[[fleet.buses]]
arrival = "2024-12-09T01:00:00"
departure = "2024-12-09T09:00:00"

[[fleet.buses]]
arrival = "2024-12-09T13:00:00"
departure = "2024-12-09T21:00:00"

[tariff]
off_peak_rate = 0.1
on_peak_rate = 0.3
peak_windows = [{ start_hour = 16, end_hour = 20 }]

[policy]
kind = "learned"
linear = { soc_gap = 1.5, price = -20.0 }
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.unwrap();
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.simulation.timestep_minutes, 30);
        assert_eq!(cfg.schedules().len(), 2);
        assert_eq!(cfg.tariff.peak_windows, vec![PeakWindow::new(16, 20)]);
        assert_eq!(cfg.policy.linear.soc_gap, 1.5);
        // unspecified weights keep their defaults
        assert_eq!(cfg.policy.linear.target_soc_pct, 90.0);

        let depot = cfg.to_depot_config();
        assert_eq!(depot.timestep, TimeDelta::minutes(30));
        assert_eq!(depot.num_buses(), 2);
        assert_eq!(depot.grid_limit_kw, 250.0);
        assert_eq!(depot.seed, 7);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[depot]
num_chargers = 2
bogus_field = true
"#;
        let result = ScenarioConfig::from_toml_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_datetime_is_rejected() {
        let toml = r#"
[simulation]
start = "yesterday"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok());
        let cfg = cfg.ok();
        // seed overridden
        assert_eq!(cfg.as_ref().map(|c| c.simulation.seed), Some(99));
        // depot kept default
        assert_eq!(cfg.as_ref().map(|c| c.depot.num_chargers), Some(10));
        assert_eq!(cfg.as_ref().map(|c| c.policy.kind.as_str()), Some("greedy"));
    }

    #[test]
    fn stagger_shifts_generated_buses() {
        let mut cfg = ScenarioConfig::constrained();
        cfg.fleet.stagger_steps = 2;
        let schedules = cfg.schedules();
        assert_eq!(schedules[0].arrival, instant(2024, 12, 6, 20));
        assert_eq!(schedules[1].arrival, instant(2024, 12, 6, 22));
        assert_eq!(schedules[2].departure, instant(2024, 12, 7, 8));
    }

    #[test]
    fn validation_catches_bad_policy() {
        let mut cfg = ScenarioConfig::overnight();
        cfg.policy.kind = "random".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "policy.kind"));
    }

    #[test]
    fn validation_catches_empty_fleet() {
        let mut cfg = ScenarioConfig::overnight();
        cfg.fleet.count = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "fleet.count"));
    }

    #[test]
    fn validation_catches_zero_timestep() {
        let mut cfg = ScenarioConfig::overnight();
        cfg.simulation.timestep_minutes = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.timestep_minutes"));
    }

    #[test]
    fn validation_catches_invalid_soc() {
        let mut cfg = ScenarioConfig::overnight();
        cfg.fleet.initial_soc_pct = 150.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "fleet.initial_soc_pct"));
    }

    #[test]
    fn day_ahead_has_tighter_grid() {
        let base = ScenarioConfig::overnight();
        let day = ScenarioConfig::day_ahead();
        assert!(day.depot.grid_limit_kw < base.depot.grid_limit_kw);
        assert_eq!(day.policy.kind, "offline");
        assert_eq!(day.schedules().len(), 3);
    }

    #[test]
    fn config_error_display_names_field() {
        let e = ConfigError::new("depot.num_chargers", "must be > 0");
        assert_eq!(e.to_string(), "config error: depot.num_chargers: must be > 0");
    }
}
