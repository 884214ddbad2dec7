//! Core simulation types: depot configuration, policy observations, and tick records.

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};

use crate::config::ConfigError;
use crate::devices::BusId;
use crate::devices::connector::DEFAULT_DELIVERY_NOISE_KWH;
use crate::sim::price::{DEFAULT_PEAK_WINDOWS, PeakWindow};

/// Timetabled visit of one bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusSchedule {
    pub arrival: NaiveDateTime,
    pub departure: NaiveDateTime,
}

impl BusSchedule {
    pub fn new(arrival: NaiveDateTime, departure: NaiveDateTime) -> Self {
        Self { arrival, departure }
    }
}

/// Immutable depot configuration supplied at construction.
///
/// One bus is created per entry of `schedules`.
#[derive(Debug, Clone)]
pub struct DepotConfig {
    /// First instant of the simulation.
    pub start: NaiveDateTime,
    /// Last instant of the simulation; the run stops when the clock reaches it.
    pub end: NaiveDateTime,
    /// Duration of one timestep.
    pub timestep: TimeDelta,
    /// Number of chargers in the depot.
    pub num_chargers: usize,
    /// Connectors on each charger.
    pub connectors_per_charger: usize,
    /// Minimum connector power (kW).
    pub min_rate_kw: f32,
    /// Maximum connector power (kW).
    pub max_rate_kw: f32,
    /// Soft cap on aggregate depot draw (kW).
    pub grid_limit_kw: f32,
    /// Battery capacity of every bus (kWh).
    pub battery_capacity_kwh: f32,
    /// State of charge on arrival (percent).
    pub initial_soc_pct: f32,
    /// Target state of charge at departure (percent).
    pub desired_soc_pct: f32,
    /// Off-peak price per kWh.
    pub off_peak_rate: f32,
    /// On-peak price per kWh.
    pub on_peak_rate: f32,
    /// Weekday on-peak windows; empty for a flat tariff.
    pub peak_windows: Vec<PeakWindow>,
    /// Standard deviation of timetable jitter, in timesteps.
    pub jitter_std_steps: f32,
    /// Standard deviation of per-tick delivery noise (kWh).
    pub delivery_noise_std_kwh: f32,
    /// Master random seed.
    pub seed: u64,
    /// Timetable of every bus in the fleet.
    pub schedules: Vec<BusSchedule>,
}

impl DepotConfig {
    /// Creates a configuration with default depot parameters.
    ///
    /// Defaults: 10 chargers with 2 connectors of 0-150 kW, 500 kW grid
    /// limit, 588 kWh batteries charged from 20% to 90%, hourly steps,
    /// 0.08/0.20 tariff with weekday peak windows, no jitter, seed 42.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, schedules: Vec<BusSchedule>) -> Self {
        Self {
            start,
            end,
            timestep: TimeDelta::hours(1),
            num_chargers: 10,
            connectors_per_charger: 2,
            min_rate_kw: 0.0,
            max_rate_kw: 150.0,
            grid_limit_kw: 500.0,
            battery_capacity_kwh: 588.0,
            initial_soc_pct: 20.0,
            desired_soc_pct: 90.0,
            off_peak_rate: 0.08,
            on_peak_rate: 0.20,
            peak_windows: DEFAULT_PEAK_WINDOWS.to_vec(),
            jitter_std_steps: 0.0,
            delivery_noise_std_kwh: DEFAULT_DELIVERY_NOISE_KWH,
            seed: 42,
            schedules,
        }
    }

    /// Number of buses in the fleet.
    pub fn num_buses(&self) -> usize {
        self.schedules.len()
    }

    /// Timestep length in hours.
    pub fn step_hours(&self) -> f32 {
        self.timestep.num_seconds() as f32 / 3600.0
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        check(self.end > self.start, "simulation.end", "must be after simulation.start");
        check(
            self.timestep >= TimeDelta::seconds(1) && self.timestep.subsec_nanos() == 0,
            "simulation.timestep_minutes",
            "must be a whole number of seconds, at least 1",
        );
        check(self.num_chargers > 0, "depot.num_chargers", "must be > 0");
        check(self.connectors_per_charger > 0, "depot.connectors_per_charger", "must be > 0");
        check(self.min_rate_kw >= 0.0, "depot.min_rate_kw", "must be >= 0");
        check(
            self.max_rate_kw >= self.min_rate_kw,
            "depot.max_rate_kw",
            "must be >= depot.min_rate_kw",
        );
        check(self.grid_limit_kw >= 0.0, "depot.grid_limit_kw", "must be >= 0");
        check(self.battery_capacity_kwh > 0.0, "fleet.battery_capacity_kwh", "must be > 0");
        check(
            (0.0..=100.0).contains(&self.initial_soc_pct),
            "fleet.initial_soc_pct",
            "must be in [0, 100]",
        );
        check(
            (0.0..=100.0).contains(&self.desired_soc_pct),
            "fleet.desired_soc_pct",
            "must be in [0, 100]",
        );
        check(self.jitter_std_steps >= 0.0, "fleet.jitter_std_steps", "must be >= 0");
        check(
            self.delivery_noise_std_kwh >= 0.0,
            "depot.delivery_noise_std_kwh",
            "must be >= 0",
        );
        check(
            self.peak_windows
                .iter()
                .all(|w| w.start_hour <= w.end_hour && w.end_hour <= 24),
            "tariff.peak_windows",
            "each window needs start_hour <= end_hour <= 24",
        );
        check(
            self.schedules.iter().all(|s| s.departure >= s.arrival),
            "fleet.buses",
            "every departure must not precede its arrival",
        );

        errors
    }
}

/// What a policy sees about one bus.
#[derive(Debug, Clone)]
pub struct BusObservation {
    pub bus_id: BusId,
    /// Current state of charge (percent).
    pub soc_pct: f32,
    /// Target state of charge (percent).
    pub desired_soc_pct: f32,
    /// Battery capacity (kWh).
    pub battery_capacity_kwh: f32,
    /// Hours until the true departure (0 once departed).
    pub hours_to_departure: f32,
    /// Whether the bus is attached to a connector.
    pub connected: bool,
    /// Bounds of the attached connector; `0.0` when not connected.
    pub min_rate_kw: f32,
    pub max_rate_kw: f32,
}

/// Depot snapshot handed to a policy once per tick.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Tick index, starting at 1 for the first tick after the start instant.
    pub timestep: usize,
    /// Clock time of the tick.
    pub time: NaiveDateTime,
    /// Timestep length in hours.
    pub step_hours: f32,
    /// Price per kWh at `time`.
    pub price: f32,
    /// Aggregate draw applied on the previous tick (kW).
    pub grid_draw_kw: f32,
    /// Soft grid limit (kW).
    pub grid_limit_kw: f32,
    /// One entry per bus, indexed by `BusId`.
    pub buses: Vec<BusObservation>,
}

impl Observation {
    /// Flattened feature vector for learned controllers.
    ///
    /// Layout: SOC of every bus, hours to departure of every bus, aggregate
    /// draw, price.
    pub fn features(&self) -> Vec<f32> {
        let mut features = Vec::with_capacity(2 * self.buses.len() + 2);
        features.extend(self.buses.iter().map(|b| b.soc_pct));
        features.extend(self.buses.iter().map(|b| b.hours_to_departure));
        features.push(self.grid_draw_kw);
        features.push(self.price);
        features
    }
}

/// Per-bus telemetry for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BusTelemetry {
    pub bus_id: BusId,
    /// State of charge after delivery (percent).
    pub soc_pct: f32,
    /// Rate applied by the connector (kW); `0.0` when not connected.
    pub applied_rate_kw: f32,
    /// Energy accepted during the tick (kWh).
    pub delivered_kwh: f32,
    /// Whether the bus was attached while energy was delivered.
    pub connected: bool,
}

/// Complete record of one simulation tick.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// Tick index (from 1).
    pub timestep: usize,
    /// Clock time of the tick.
    pub time: NaiveDateTime,
    /// Price per kWh applied to this tick.
    pub price: f32,
    /// Aggregate connector draw (kW).
    pub grid_draw_kw: f32,
    /// Whether `grid_draw_kw` stayed within the soft grid limit.
    pub within_grid_limit: bool,
    /// Energy delivered across the depot (kWh).
    pub energy_delivered_kwh: f32,
    /// Cost of this tick's energy.
    pub tick_cost: f32,
    /// Running cost since the start of the run.
    pub cumulative_cost: f32,
    /// Buses attached after arrivals and departures were processed.
    pub connected_buses: usize,
    /// Present buses still waiting for a connector.
    pub waiting_buses: usize,
    /// One entry per bus, indexed by `BusId`.
    pub buses: Vec<BusTelemetry>,
}

impl fmt::Display for TickResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>3} ({}) | draw={:>7.2} kW  price={:.3} | delivered={:>7.2} kWh  \
             cost={:>8.2} (total {:>9.2}) | connected={} waiting={} ok={}",
            self.timestep,
            self.time.format("%a %H:%M"),
            self.grid_draw_kw,
            self.price,
            self.energy_delivered_kwh,
            self.tick_cost,
            self.cumulative_cost,
            self.connected_buses,
            self.waiting_buses,
            self.within_grid_limit,
        )
    }
}
