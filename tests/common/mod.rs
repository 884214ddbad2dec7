//! Shared test fixtures for integration tests.

use chrono::{NaiveDate, NaiveDateTime};
use depot_sim::sim::types::{BusSchedule, DepotConfig};

/// Instant on a December 2024 day (the 6th is a Friday, the 9th a Monday).
pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 12, day)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid timestamp")
}

/// Single 588 kWh bus parked 19:00-05:00 under a flat 0.08 tariff, no noise.
pub fn overnight_single_bus() -> DepotConfig {
    let mut cfg = DepotConfig::new(
        at(6, 19),
        at(7, 5),
        vec![BusSchedule::new(at(6, 19), at(7, 5))],
    );
    cfg.off_peak_rate = 0.08;
    cfg.on_peak_rate = 0.08;
    cfg.peak_windows = Vec::new();
    cfg.delivery_noise_std_kwh = 0.0;
    cfg
}

/// Three buses with twelve-hour windows over a Monday, 300 kW grid limit.
pub fn day_ahead_three_buses() -> DepotConfig {
    let mut cfg = DepotConfig::new(
        at(9, 0),
        at(10, 0),
        vec![
            BusSchedule::new(at(9, 0), at(9, 12)),
            BusSchedule::new(at(9, 12), at(10, 0)),
            BusSchedule::new(at(9, 6), at(9, 18)),
        ],
    );
    cfg.num_chargers = 2;
    cfg.grid_limit_kw = 300.0;
    cfg
}

/// One charger with two connectors and three simultaneous arrivals.
pub fn constrained_depot() -> DepotConfig {
    let mut cfg = DepotConfig::new(
        at(6, 19),
        at(7, 7),
        vec![
            BusSchedule::new(at(6, 20), at(7, 1)),
            BusSchedule::new(at(6, 20), at(7, 4)),
            BusSchedule::new(at(6, 20), at(7, 6)),
        ],
    );
    cfg.num_chargers = 1;
    cfg.connectors_per_charger = 2;
    cfg
}
