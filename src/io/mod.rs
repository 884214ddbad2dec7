/// CSV export of per-bus telemetry.
pub mod export;
