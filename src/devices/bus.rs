use chrono::NaiveDateTime;
use rand::rngs::StdRng;

use crate::devices::types::{BusId, JitterModel};

/// SOC shortfall (percentage points) still counted as reaching the target.
const TARGET_TOLERANCE_PCT: f32 = 0.01;

/// An electric bus visiting the depot.
///
/// The bus is created once per run with jitter baked into its true arrival and
/// departure. Whether it is waiting, connected, or gone is decided by the depot
/// comparing the clock against those true instants; the bus itself only
/// tracks its battery and whether it has ever held a connector.
#[derive(Debug, Clone)]
pub struct Bus {
    id: BusId,

    /// Arrival published in the timetable.
    pub scheduled_arrival: NaiveDateTime,

    /// Departure published in the timetable.
    pub scheduled_departure: NaiveDateTime,

    /// Arrival after jitter.
    pub true_arrival: NaiveDateTime,

    /// Departure after jitter, never earlier than `true_arrival`.
    pub true_departure: NaiveDateTime,

    /// Battery capacity in kilowatt-hours.
    pub battery_capacity_kwh: f32,

    /// Target state of charge at departure, in percent.
    pub desired_soc_pct: f32,

    current_energy_kwh: f32,
    ever_connected: bool,
}

impl Bus {
    /// Creates a bus and samples its true arrival and departure.
    ///
    /// # Arguments
    ///
    /// * `id` - Index of the bus within the fleet
    /// * `scheduled_arrival` - Timetabled arrival
    /// * `scheduled_departure` - Timetabled departure
    /// * `battery_capacity_kwh` - Battery capacity in kWh (must be > 0)
    /// * `initial_soc_pct` - State of charge on arrival, in percent
    /// * `desired_soc_pct` - Target state of charge at departure, in percent
    /// * `jitter` - Noise model applied to both timetable instants
    /// * `rng` - Jitter random source
    ///
    /// # Panics
    ///
    /// Panics if capacity is not positive or a SOC is outside `0..=100`.
    #[expect(clippy::too_many_arguments)]
    pub fn new(
        id: BusId,
        scheduled_arrival: NaiveDateTime,
        scheduled_departure: NaiveDateTime,
        battery_capacity_kwh: f32,
        initial_soc_pct: f32,
        desired_soc_pct: f32,
        jitter: &JitterModel,
        rng: &mut StdRng,
    ) -> Self {
        assert!(battery_capacity_kwh > 0.0);
        assert!((0.0..=100.0).contains(&initial_soc_pct));
        assert!((0.0..=100.0).contains(&desired_soc_pct));

        let true_arrival = Self::sample_jitter(scheduled_arrival, jitter, rng);
        let true_departure =
            Self::sample_jitter(scheduled_departure, jitter, rng).max(true_arrival);

        Self {
            id,
            scheduled_arrival,
            scheduled_departure,
            true_arrival,
            true_departure,
            battery_capacity_kwh,
            desired_soc_pct,
            current_energy_kwh: battery_capacity_kwh * initial_soc_pct / 100.0,
            ever_connected: false,
        }
    }

    /// Returns the scheduled instant shifted by a non-negative jitter offset.
    pub fn sample_jitter(
        scheduled: NaiveDateTime,
        jitter: &JitterModel,
        rng: &mut StdRng,
    ) -> NaiveDateTime {
        scheduled + jitter.sample_offset(rng)
    }

    pub fn id(&self) -> BusId {
        self.id
    }

    /// Stored energy in kWh.
    pub fn current_energy_kwh(&self) -> f32 {
        self.current_energy_kwh
    }

    /// State of charge in percent, recomputed from stored energy.
    pub fn soc(&self) -> f32 {
        self.current_energy_kwh / self.battery_capacity_kwh * 100.0
    }

    /// Adds `amount_kwh` to the battery.
    ///
    /// Returns `false` when the battery saturates: the stored energy is then
    /// clamped to capacity. Negative amounts are ignored.
    pub fn accept_charge(&mut self, amount_kwh: f32) -> bool {
        let amount_kwh = amount_kwh.max(0.0);
        if self.current_energy_kwh + amount_kwh <= self.battery_capacity_kwh {
            self.current_energy_kwh += amount_kwh;
            true
        } else {
            self.current_energy_kwh = self.battery_capacity_kwh;
            false
        }
    }

    /// Energy still missing to reach the desired SOC (kWh, >= 0).
    pub fn energy_shortfall_kwh(&self) -> f32 {
        let target_kwh = self.battery_capacity_kwh * self.desired_soc_pct / 100.0;
        (target_kwh - self.current_energy_kwh).max(0.0)
    }

    /// Returns `true` once the desired SOC has been reached, up to
    /// delivery-noise residue.
    pub fn meets_target(&self) -> bool {
        self.soc() + TARGET_TOLERANCE_PCT >= self.desired_soc_pct
    }

    /// Returns `true` when `now` lies in `[true_arrival, true_departure)`.
    pub fn is_present(&self, now: NaiveDateTime) -> bool {
        now >= self.true_arrival && now < self.true_departure
    }

    /// Returns `true` once the bus has been attached to a connector.
    pub fn has_connected(&self) -> bool {
        self.ever_connected
    }

    pub(crate) fn mark_connected(&mut self) {
        self.ever_connected = true;
    }

    /// Hours from `now` until the true departure (0 once departed).
    pub fn hours_until_departure(&self, now: NaiveDateTime) -> f32 {
        ((self.true_departure - now).num_seconds() as f32 / 3600.0).max(0.0)
    }
}
