use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::devices::bus::Bus;
use crate::devices::types::{BusId, gaussian_noise};

/// Default standard deviation of per-tick delivery noise (kWh).
pub const DEFAULT_DELIVERY_NOISE_KWH: f32 = 0.01;

/// A single charging outlet with bounded power.
///
/// A connector is `idle` until a bus is attached and `active` afterwards. It
/// holds the attached bus by id only; the fleet stays owned by the depot.
#[derive(Debug, Clone)]
pub struct Connector {
    id: usize,

    /// Minimum deliverable power in kilowatts.
    pub min_rate_kw: f32,

    /// Maximum deliverable power in kilowatts.
    pub max_rate_kw: f32,

    /// Length of one delivery tick in seconds.
    pub tick_seconds: f32,

    /// Standard deviation of per-tick delivery noise (kWh).
    pub noise_std_kwh: f32,

    current_rate_kw: f32,
    attached_bus: Option<BusId>,
}

impl Connector {
    /// Creates an idle connector with its rate at `min_rate_kw`.
    ///
    /// # Panics
    ///
    /// Panics if `min_rate_kw` is negative, `max_rate_kw < min_rate_kw`, or
    /// `tick_seconds` is not positive.
    pub fn new(
        id: usize,
        min_rate_kw: f32,
        max_rate_kw: f32,
        tick_seconds: f32,
        noise_std_kwh: f32,
    ) -> Self {
        assert!(min_rate_kw >= 0.0);
        assert!(max_rate_kw >= min_rate_kw);
        assert!(tick_seconds > 0.0);
        assert!(noise_std_kwh >= 0.0);

        Self {
            id,
            min_rate_kw,
            max_rate_kw,
            tick_seconds,
            noise_std_kwh,
            current_rate_kw: min_rate_kw,
            attached_bus: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Rate most recently set, in kW.
    pub fn current_rate_kw(&self) -> f32 {
        self.current_rate_kw
    }

    pub fn attached_bus(&self) -> Option<BusId> {
        self.attached_bus
    }

    /// Returns `true` when a bus is attached.
    pub fn is_active(&self) -> bool {
        self.attached_bus.is_some()
    }

    /// Attaches `bus`. Fails without side effects if already active.
    pub fn connect(&mut self, bus: BusId) -> bool {
        if self.is_active() {
            return false;
        }
        self.attached_bus = Some(bus);
        true
    }

    /// Detaches the current bus. Fails if the connector is idle.
    pub fn disconnect(&mut self) -> bool {
        self.attached_bus.take().is_some()
    }

    /// Sets the charging rate, clamped into `[min_rate_kw, max_rate_kw]`.
    ///
    /// Returns the effective rate, or `None` when no bus is attached (the
    /// stored rate is left untouched in that case).
    pub fn set_rate(&mut self, rate_kw: f32) -> Option<f32> {
        if !self.is_active() {
            warn!(
                connector = self.id,
                rate_kw, "rate update rejected on inactive connector"
            );
            return None;
        }

        let effective = if rate_kw.is_nan() {
            self.min_rate_kw
        } else {
            rate_kw.clamp(self.min_rate_kw, self.max_rate_kw)
        };
        if effective != rate_kw {
            debug!(
                connector = self.id,
                requested_kw = rate_kw,
                applied_kw = effective,
                "charge rate clamped to connector bounds"
            );
        }
        self.current_rate_kw = effective;
        Some(effective)
    }

    /// Delivers energy into the attached bus for `ticks` unit ticks.
    ///
    /// Each tick carries `current_rate * tick_seconds / 3600` kWh plus
    /// zero-mean Gaussian noise. Returns the energy the bus actually accepted;
    /// an idle connector or a zero rate delivers nothing.
    pub fn deliver(&self, fleet: &mut [Bus], ticks: u32, rng: &mut StdRng) -> f32 {
        let Some(bus) = self.attached_bus.and_then(|id| fleet.get_mut(id)) else {
            return 0.0;
        };
        if self.current_rate_kw <= 0.0 {
            return 0.0;
        }

        let energy_per_tick = self.current_rate_kw * self.tick_seconds / 3600.0;
        let mut delivered_kwh = 0.0;
        for _ in 0..ticks {
            let energy_for_tick =
                (energy_per_tick + gaussian_noise(rng, self.noise_std_kwh)).max(0.0);
            let before = bus.current_energy_kwh();
            bus.accept_charge(energy_for_tick);
            delivered_kwh += bus.current_energy_kwh() - before;
        }
        delivered_kwh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::types::JitterModel;
    use chrono::{NaiveDate, TimeDelta};
    use rand::SeedableRng;

    fn fleet(capacity_kwh: f32, initial_soc_pct: f32) -> Vec<Bus> {
        let start = NaiveDate::from_ymd_opt(2024, 12, 6)
            .and_then(|d| d.and_hms_opt(19, 0, 0))
            .expect("valid timestamp");
        let jitter = JitterModel::new(0.0, TimeDelta::hours(1));
        let mut rng = StdRng::seed_from_u64(0);
        vec![Bus::new(
            0,
            start,
            start + TimeDelta::hours(10),
            capacity_kwh,
            initial_soc_pct,
            90.0,
            &jitter,
            &mut rng,
        )]
    }

    fn connector() -> Connector {
        Connector::new(0, 20.0, 120.0, 3600.0, 0.0)
    }

    #[test]
    fn connect_only_from_idle() {
        let mut c = connector();
        assert!(c.connect(0));
        assert!(!c.connect(1));
        assert_eq!(c.attached_bus(), Some(0));
    }

    #[test]
    fn disconnect_only_from_active() {
        let mut c = connector();
        assert!(!c.disconnect());
        c.connect(0);
        assert!(c.disconnect());
        assert!(!c.disconnect());
        assert!(!c.is_active());
    }

    #[test]
    fn set_rate_rejected_when_idle() {
        let mut c = connector();
        assert_eq!(c.set_rate(60.0), None);
        assert_eq!(c.current_rate_kw(), 20.0);
    }

    #[test]
    fn set_rate_clamps_into_bounds() {
        let mut c = connector();
        c.connect(0);
        assert_eq!(c.set_rate(60.0), Some(60.0));
        assert_eq!(c.set_rate(500.0), Some(120.0));
        assert_eq!(c.set_rate(-3.0), Some(20.0));
        assert_eq!(c.set_rate(f32::NAN), Some(20.0));
        assert_eq!(c.current_rate_kw(), 20.0);
    }

    #[test]
    fn idle_connector_delivers_nothing() {
        let c = connector();
        let mut buses = fleet(538.0, 10.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(c.deliver(&mut buses, 5, &mut rng), 0.0);
    }

    #[test]
    fn noiseless_delivery_matches_rate() {
        let mut c = connector();
        c.connect(0);
        c.set_rate(60.0);
        let mut buses = fleet(538.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let delivered = c.deliver(&mut buses, 2, &mut rng);
        assert!((delivered - 120.0).abs() < 1e-3);
        assert!((buses[0].current_energy_kwh() - 120.0).abs() < 1e-3);
    }

    #[test]
    fn sub_hour_ticks_scale_energy() {
        let mut c = Connector::new(0, 0.0, 120.0, 1.0, 0.0);
        c.connect(0);
        c.set_rate(36.0);
        let mut buses = fleet(538.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        // 36 kW for 100 one-second ticks = 1 kWh
        let delivered = c.deliver(&mut buses, 100, &mut rng);
        assert!((delivered - 1.0).abs() < 1e-3);
    }

    #[test]
    fn noisy_delivery_stays_close_to_rate() {
        let mut c = Connector::new(0, 0.0, 120.0, 3600.0, DEFAULT_DELIVERY_NOISE_KWH);
        c.connect(0);
        c.set_rate(60.0);
        let mut buses = fleet(538.0, 0.0);
        let mut rng = StdRng::seed_from_u64(9);
        let delivered = c.deliver(&mut buses, 1, &mut rng);
        assert!((delivered - 60.0).abs() < 0.1);
    }

    #[test]
    fn delivery_counts_only_accepted_energy() {
        let mut c = connector();
        c.connect(0);
        c.set_rate(100.0);
        let mut buses = fleet(100.0, 50.0);
        let mut rng = StdRng::seed_from_u64(1);
        let delivered = c.deliver(&mut buses, 1, &mut rng);
        assert!((delivered - 50.0).abs() < 1e-3);
        assert_eq!(buses[0].current_energy_kwh(), 100.0);
    }
}
