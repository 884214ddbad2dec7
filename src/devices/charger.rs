use tracing::debug;

use crate::devices::connector::Connector;
use crate::devices::types::BusId;

/// A charger grouping a fixed set of connectors.
///
/// Connect requests are routed to the first idle connector in order. The
/// aggregate draw counts only connectors with a bus attached.
#[derive(Debug, Clone)]
pub struct Charger {
    id: usize,
    connectors: Vec<Connector>,
}

impl Charger {
    /// Creates a charger with `num_connectors` identical connectors.
    ///
    /// # Panics
    ///
    /// Panics if `num_connectors` is zero or the connector bounds are invalid.
    pub fn new(
        id: usize,
        num_connectors: usize,
        min_rate_kw: f32,
        max_rate_kw: f32,
        tick_seconds: f32,
        noise_std_kwh: f32,
    ) -> Self {
        assert!(num_connectors > 0, "a charger needs at least one connector");
        let connectors = (0..num_connectors)
            .map(|i| Connector::new(i, min_rate_kw, max_rate_kw, tick_seconds, noise_std_kwh))
            .collect();
        Self { id, connectors }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// Attaches `bus` to the first idle connector.
    ///
    /// Returns `false` when every connector is busy; the caller retries later.
    pub fn connect_bus(&mut self, bus: BusId) -> bool {
        match self.connectors.iter_mut().find(|c| !c.is_active()) {
            Some(connector) => connector.connect(bus),
            None => {
                debug!(charger = self.id, bus, "no idle connector");
                false
            }
        }
    }

    /// Detaches `bus` from whichever connector holds it.
    pub fn disconnect_bus(&mut self, bus: BusId) -> bool {
        self.connectors
            .iter_mut()
            .find(|c| c.attached_bus() == Some(bus))
            .is_some_and(Connector::disconnect)
    }

    /// Updates the rate of connector `connector_id`.
    ///
    /// Returns `false` for an unknown id or an idle connector.
    pub fn set_connector_rate(&mut self, connector_id: usize, rate_kw: f32) -> bool {
        self.connectors
            .get_mut(connector_id)
            .and_then(|c| c.set_rate(rate_kw))
            .is_some()
    }

    /// Index of the connector currently holding `bus`.
    pub fn connector_of(&self, bus: BusId) -> Option<usize> {
        self.connectors
            .iter()
            .position(|c| c.attached_bus() == Some(bus))
    }

    /// Number of connectors with no bus attached.
    pub fn idle_count(&self) -> usize {
        self.connectors.iter().filter(|c| !c.is_active()).count()
    }

    /// Sum of the rates of active connectors, in kW.
    pub fn current_draw_kw(&self) -> f32 {
        self.connectors
            .iter()
            .filter(|c| c.is_active())
            .map(Connector::current_rate_kw)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charger(n: usize) -> Charger {
        Charger::new(0, n, 0.0, 150.0, 3600.0, 0.0)
    }

    #[test]
    fn connect_fills_connectors_in_order() {
        let mut ch = charger(2);
        assert!(ch.connect_bus(7));
        assert!(ch.connect_bus(8));
        assert_eq!(ch.connector_of(7), Some(0));
        assert_eq!(ch.connector_of(8), Some(1));
        assert!(!ch.connect_bus(9));
        assert_eq!(ch.idle_count(), 0);
    }

    #[test]
    fn disconnect_twice_returns_true_then_false() {
        let mut ch = charger(2);
        ch.connect_bus(3);
        assert!(ch.disconnect_bus(3));
        assert!(!ch.disconnect_bus(3));
    }

    #[test]
    fn disconnect_unknown_bus_fails() {
        let mut ch = charger(1);
        ch.connect_bus(1);
        assert!(!ch.disconnect_bus(2));
        assert_eq!(ch.connector_of(1), Some(0));
    }

    #[test]
    fn freed_connector_is_reused() {
        let mut ch = charger(2);
        ch.connect_bus(0);
        ch.connect_bus(1);
        ch.disconnect_bus(0);
        assert!(ch.connect_bus(2));
        assert_eq!(ch.connector_of(2), Some(0));
    }

    #[test]
    fn set_connector_rate_validates_id() {
        let mut ch = charger(2);
        ch.connect_bus(0);
        assert!(ch.set_connector_rate(0, 50.0));
        assert!(!ch.set_connector_rate(1, 50.0));
        assert!(!ch.set_connector_rate(5, 50.0));
    }

    #[test]
    fn draw_counts_only_active_connectors() {
        let mut ch = charger(3);
        ch.connect_bus(0);
        ch.connect_bus(1);
        ch.set_connector_rate(0, 40.0);
        ch.set_connector_rate(1, 200.0);
        assert!((ch.current_draw_kw() - 190.0).abs() < 1e-5);

        ch.disconnect_bus(1);
        assert!((ch.current_draw_kw() - 40.0).abs() < 1e-5);
    }

    #[test]
    #[should_panic]
    fn zero_connectors_panics() {
        charger(0);
    }
}
