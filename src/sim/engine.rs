//! Depot state and the time-stepped simulation loop.

use chrono::NaiveDateTime;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use crate::devices::{Bus, BusId, Charger, JitterModel};
use crate::error::{DepotError, Result};

use super::clock::Clock;
use super::policy::Policy;
use super::price::PriceModel;
use super::types::{BusObservation, BusTelemetry, DepotConfig, Observation, TickResult};

/// Seed offset for the delivery-noise RNG to avoid correlation with jitter.
const NOISE_SEED_OFFSET: u64 = 57;

/// Delivery ticks per simulation timestep.
const DELIVERY_TICKS_PER_STEP: u32 = 1;

/// The depot: clock, chargers, fleet, and tariff for one simulation run.
///
/// `DepotState` is the single writer of all simulation state. Each call to
/// [`DepotState::step`] advances the clock one timestep, releases buses that
/// left since the previous tick, asks the policy for rates, applies and
/// delivers them, then processes arrivals and departures.
/// The policy is driven by the loop but not owned by it.
pub struct DepotState {
    config: DepotConfig,
    clock: Clock,
    prices: PriceModel,
    chargers: Vec<Charger>,
    buses: Vec<Bus>,
    noise_rng: StdRng,
    cost: f32,
    grid_draw_kw: f32,
    last_tick_cost: f32,
    done: bool,
}

impl DepotState {
    /// Builds the depot, samples bus jitter, and admits buses already present
    /// at the start instant.
    ///
    /// # Errors
    ///
    /// Returns `DepotError::Config` for the first invalid configuration field.
    pub fn new(config: DepotConfig) -> Result<Self> {
        if let Some(err) = config.validate().into_iter().next() {
            return Err(err.into());
        }

        let clock = Clock::new(config.start, config.end, config.timestep);
        let prices = PriceModel::new(
            config.off_peak_rate,
            config.on_peak_rate,
            config.peak_windows.clone(),
            config.timestep,
            config.start,
            config.end,
        );

        let mut state = Self {
            chargers: Vec::new(),
            buses: Vec::new(),
            noise_rng: StdRng::seed_from_u64(config.seed.wrapping_add(NOISE_SEED_OFFSET)),
            clock,
            prices,
            config,
            cost: 0.0,
            grid_draw_kw: 0.0,
            last_tick_cost: 0.0,
            done: false,
        };
        state.reset();
        Ok(state)
    }

    /// Restores the freshly-initialized state.
    ///
    /// The clock returns to the start, both random sources are reseeded, and
    /// every bus is re-created with the same jitter as the first run.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.chargers = Self::build_chargers(&self.config);
        self.buses = Self::build_fleet(&self.config);
        self.noise_rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(NOISE_SEED_OFFSET));
        self.cost = 0.0;
        self.grid_draw_kw = 0.0;
        self.last_tick_cost = 0.0;
        self.done = false;
        self.admit_arrivals();
    }

    fn build_chargers(config: &DepotConfig) -> Vec<Charger> {
        let tick_seconds =
            config.timestep.num_seconds() as f32 / DELIVERY_TICKS_PER_STEP as f32;
        (0..config.num_chargers)
            .map(|id| {
                Charger::new(
                    id,
                    config.connectors_per_charger,
                    config.min_rate_kw,
                    config.max_rate_kw,
                    tick_seconds,
                    config.delivery_noise_std_kwh,
                )
            })
            .collect()
    }

    fn build_fleet(config: &DepotConfig) -> Vec<Bus> {
        let jitter = JitterModel::new(config.jitter_std_steps, config.timestep);
        let mut rng = StdRng::seed_from_u64(config.seed);
        config
            .schedules
            .iter()
            .enumerate()
            .map(|(id, schedule)| {
                Bus::new(
                    id,
                    schedule.arrival,
                    schedule.departure,
                    config.battery_capacity_kwh,
                    config.initial_soc_pct,
                    config.desired_soc_pct,
                    &jitter,
                    &mut rng,
                )
            })
            .collect()
    }

    /// Locates the `(charger, connector)` pair holding `bus`.
    pub fn connector_of(&self, bus: BusId) -> Option<(usize, usize)> {
        self.chargers
            .iter()
            .enumerate()
            .find_map(|(ci, charger)| charger.connector_of(bus).map(|ki| (ci, ki)))
    }

    /// Snapshot of the depot for the policy.
    pub fn observe(&self) -> Observation {
        let now = self.clock.now();
        let buses = self
            .buses
            .iter()
            .map(|bus| {
                let connector = self
                    .connector_of(bus.id())
                    .map(|(ci, ki)| &self.chargers[ci].connectors()[ki]);
                BusObservation {
                    bus_id: bus.id(),
                    soc_pct: bus.soc(),
                    desired_soc_pct: bus.desired_soc_pct,
                    battery_capacity_kwh: bus.battery_capacity_kwh,
                    hours_to_departure: bus.hours_until_departure(now),
                    connected: connector.is_some(),
                    min_rate_kw: connector.map_or(0.0, |c| c.min_rate_kw),
                    max_rate_kw: connector.map_or(0.0, |c| c.max_rate_kw),
                }
            })
            .collect();

        Observation {
            timestep: self.clock.index(),
            time: now,
            step_hours: self.clock.step_hours(),
            price: self.prices.price_at(now),
            grid_draw_kw: self.grid_draw_kw,
            grid_limit_kw: self.config.grid_limit_kw,
            buses,
        }
    }

    /// Executes one tick driven by `policy`.
    ///
    /// # Returns
    ///
    /// `Ok(None)` once the schedule end has been reached.
    ///
    /// # Errors
    ///
    /// Returns `DepotError::DecisionLength` when the policy's rate vector does
    /// not have one entry per bus.
    pub fn step<P: Policy + ?Sized>(&mut self, policy: &mut P) -> Result<Option<TickResult>> {
        if !self.begin_tick() {
            return Ok(None);
        }
        let observation = self.observe();
        let rates = policy.decide(&observation);
        self.check_decision(policy.name(), &rates)?;
        Ok(Some(self.apply_tick(&rates)))
    }

    /// Executes one tick with externally supplied rates.
    ///
    /// This is the environment contract for trainers that drive the depot
    /// directly. The rate vector is validated before the clock moves.
    ///
    /// # Errors
    ///
    /// Returns `DepotError::DecisionLength` on a length mismatch.
    pub fn step_with_rates(&mut self, rates: &[f32]) -> Result<Option<TickResult>> {
        self.check_decision("external", rates)?;
        if !self.begin_tick() {
            return Ok(None);
        }
        Ok(Some(self.apply_tick(rates)))
    }

    /// Advances the clock and releases buses that left between ticks.
    ///
    /// Returns `false` once the schedule end has been reached.
    fn begin_tick(&mut self) -> bool {
        if self.clock.tick().is_none() {
            self.done = true;
            return false;
        }
        self.release_departures(false);
        true
    }

    /// Runs the remaining ticks and returns their records.
    ///
    /// # Errors
    ///
    /// Aborts on the first policy contract violation.
    pub fn run<P: Policy + ?Sized>(&mut self, policy: &mut P) -> Result<Vec<TickResult>> {
        info!(
            policy = policy.name(),
            buses = self.buses.len(),
            steps = self.clock.total_steps(),
            "simulation started"
        );
        let mut results = Vec::with_capacity(self.clock.total_steps());
        while let Some(result) = self.step(policy)? {
            results.push(result);
        }
        info!(cost = self.cost, "simulation finished");
        Ok(results)
    }

    fn check_decision(&self, policy: &'static str, rates: &[f32]) -> Result<()> {
        if rates.len() != self.buses.len() {
            return Err(DepotError::DecisionLength {
                policy,
                expected: self.buses.len(),
                got: rates.len(),
            });
        }
        Ok(())
    }

    fn apply_tick(&mut self, rates: &[f32]) -> TickResult {
        let now = self.clock.now();
        let price = self.prices.price_at(now);
        let n = self.buses.len();

        // 1. Apply rates to the connectors holding each bus
        let mut applied_kw = vec![0.0_f32; n];
        for (bus, &rate) in rates.iter().enumerate() {
            if let Some((ci, ki)) = self.connector_of(bus) {
                let charger = &mut self.chargers[ci];
                if charger.set_connector_rate(ki, rate) {
                    applied_kw[bus] = charger.connectors()[ki].current_rate_kw();
                }
            }
        }
        self.grid_draw_kw = self.chargers.iter().map(Charger::current_draw_kw).sum();
        let within_grid_limit = self.grid_draw_kw <= self.config.grid_limit_kw;
        if !within_grid_limit {
            info!(
                time = %now,
                draw_kw = self.grid_draw_kw,
                limit_kw = self.config.grid_limit_kw,
                "grid limit exceeded"
            );
        }

        // 2. Deliver energy
        let mut delivered_kwh = vec![0.0_f32; n];
        for charger in &self.chargers {
            for connector in charger.connectors() {
                if let Some(bus) = connector.attached_bus() {
                    delivered_kwh[bus] += connector.deliver(
                        &mut self.buses,
                        DELIVERY_TICKS_PER_STEP,
                        &mut self.noise_rng,
                    );
                }
            }
        }
        let energy_delivered_kwh: f32 = delivered_kwh.iter().sum();
        self.last_tick_cost = price * energy_delivered_kwh;
        self.cost += self.last_tick_cost;

        let buses = self
            .buses
            .iter()
            .map(|bus| BusTelemetry {
                bus_id: bus.id(),
                soc_pct: bus.soc(),
                applied_rate_kw: applied_kw[bus.id()],
                delivered_kwh: delivered_kwh[bus.id()],
                connected: self.connector_of(bus.id()).is_some(),
            })
            .collect();

        // 3. Arrivals, then departures
        self.admit_arrivals();
        self.release_departures(true);
        self.done = self.clock.is_done();

        TickResult {
            timestep: self.clock.index(),
            time: now,
            price,
            grid_draw_kw: self.grid_draw_kw,
            within_grid_limit,
            energy_delivered_kwh,
            tick_cost: self.last_tick_cost,
            cumulative_cost: self.cost,
            connected_buses: self.connected_count(),
            waiting_buses: self.waiting_count(),
            buses,
        }
    }

    /// Connects every present, unattached bus to the first free connector.
    ///
    /// Buses that find no connector stay waiting and are retried next tick.
    fn admit_arrivals(&mut self) {
        let now = self.clock.now();
        for bus in 0..self.buses.len() {
            if !self.buses[bus].is_present(now) || self.connector_of(bus).is_some() {
                continue;
            }
            if self.chargers.iter_mut().any(|c| c.connect_bus(bus)) {
                self.buses[bus].mark_connected();
                debug!(bus, time = %now, "bus connected");
            } else {
                info!(bus, time = %now, "no idle connector, bus waiting");
            }
        }
    }

    /// Disconnects every attached bus whose departure time has come.
    ///
    /// Before delivery only buses that left strictly before `now` go; a bus
    /// departing exactly at `now` still receives this tick's energy.
    fn release_departures(&mut self, after_delivery: bool) {
        let now = self.clock.now();
        for bus in 0..self.buses.len() {
            let departure = self.buses[bus].true_departure;
            if departure > now || (departure == now && !after_delivery) {
                continue;
            }
            if self.chargers.iter_mut().any(|c| c.disconnect_bus(bus)) {
                debug!(bus, time = %now, soc = self.buses[bus].soc(), "bus departed");
            }
        }
    }

    fn connected_count(&self) -> usize {
        (0..self.buses.len())
            .filter(|&bus| self.connector_of(bus).is_some())
            .count()
    }

    fn waiting_count(&self) -> usize {
        let now = self.clock.now();
        self.buses
            .iter()
            .filter(|bus| bus.is_present(now) && self.connector_of(bus.id()).is_none())
            .count()
    }

    /// Training signal: unmet SOC percentage points plus last tick's cost, negated.
    pub fn reward(&self) -> f32 {
        let unmet_soc: f32 = self
            .buses
            .iter()
            .map(|b| (b.desired_soc_pct - b.soc()).max(0.0))
            .sum();
        -(unmet_soc + self.last_tick_cost)
    }

    /// Tick instants at which each planning slot is replayed.
    ///
    /// Slot `j` is delivered on tick `j + 1`, whose clock time is
    /// `start + (j + 1) * timestep` (the last one clamped to the end). The
    /// connectors used in slot `j` are assigned at the previous instant,
    /// `start` for slot 0.
    pub fn slot_instants(&self) -> Vec<NaiveDateTime> {
        let mut clock = Clock::new(self.clock.start(), self.clock.end(), self.clock.step());
        let mut instants = Vec::with_capacity(clock.total_steps());
        clock.run(|_, now| instants.push(now));
        instants
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn chargers(&self) -> &[Charger] {
        &self.chargers
    }

    pub fn prices(&self) -> &PriceModel {
        &self.prices
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn config(&self) -> &DepotConfig {
        &self.config
    }

    pub fn current_time(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Running energy cost since the start.
    pub fn cost(&self) -> f32 {
        self.cost
    }

    /// Aggregate draw applied on the most recent tick (kW).
    pub fn grid_draw_kw(&self) -> f32 {
        self.grid_draw_kw
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
