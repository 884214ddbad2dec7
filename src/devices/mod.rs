//! Depot equipment and vehicles.

/// Electric bus with battery and jittered timetable.
pub mod bus;
/// Charger grouping a fixed set of connectors.
pub mod charger;
/// Single bounded-power charging outlet.
pub mod connector;
pub mod types;

// Re-export the main types for convenience
pub use bus::Bus;
pub use charger::Charger;
pub use connector::Connector;
pub use types::BusId;
pub use types::JitterModel;
