/// Simulation clock over calendar time.
pub mod clock;
pub mod engine;
pub mod kpi;
/// Charging policies.
pub mod policy;
/// Time-of-use tariff.
pub mod price;
/// Offline charging schedules and their scoring.
pub mod schedule;
pub mod types;
