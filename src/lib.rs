//! Electric-bus depot charging simulator.

pub mod config;
/// Buses, chargers, and connectors.
pub mod devices;
pub mod error;
/// Telemetry export.
pub mod io;
pub mod runner;
/// Depot engine, tariff, policies, and KPIs.
pub mod sim;
