//! Charging policies driven by the depot loop.

use serde::Deserialize;

use super::engine::DepotState;
use super::schedule::{RateMatrix, SchedulePlanner, ScheduleProblem};
use super::types::Observation;

/// Decision-making contract between the depot loop and a charging strategy.
///
/// `decide` returns one proposed rate (kW) per bus, indexed by `BusId`. Rates
/// for buses that are not connected are ignored, and every applied rate is
/// clamped to its connector's bounds. The grid limit is advisory: a policy may
/// exceed it and the depot only reports the excess.
pub trait Policy {
    fn decide(&mut self, observation: &Observation) -> Vec<f32>;

    /// Short identifier used in logs and diagnostics.
    fn name(&self) -> &'static str;
}

/// Charges each connected bus at the lowest constant rate that reaches its
/// target SOC by departure.
///
/// Rate = `(desired_soc - soc) * capacity / (100 * hours_remaining)`; zero
/// once the target is met, the bus is not connected, or no time remains.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyPolicy;

impl GreedyPolicy {
    /// Rate in kW for a single bus.
    pub fn rate_kw(
        soc_pct: f32,
        desired_soc_pct: f32,
        battery_capacity_kwh: f32,
        hours_remaining: f32,
    ) -> f32 {
        if hours_remaining <= 0.0 || soc_pct >= desired_soc_pct {
            return 0.0;
        }
        (desired_soc_pct - soc_pct) * battery_capacity_kwh / (100.0 * hours_remaining)
    }
}

impl Policy for GreedyPolicy {
    fn decide(&mut self, observation: &Observation) -> Vec<f32> {
        observation
            .buses
            .iter()
            .map(|b| {
                if !b.connected {
                    return 0.0;
                }
                Self::rate_kw(
                    b.soc_pct,
                    b.desired_soc_pct,
                    b.battery_capacity_kwh,
                    b.hours_to_departure,
                )
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "greedy"
    }
}

/// Replays a full-horizon schedule computed before the run starts.
#[derive(Debug, Clone)]
pub struct OfflinePolicy {
    schedule: RateMatrix,
}

impl OfflinePolicy {
    pub fn new(schedule: RateMatrix) -> Self {
        Self { schedule }
    }

    /// Plans a schedule for `depot` with `planner`.
    ///
    /// Must be called before the first tick: the problem is built from the
    /// fleet's current energy and true timetable.
    pub fn plan(depot: &DepotState, planner: &impl SchedulePlanner) -> Self {
        let problem = ScheduleProblem::from_depot(depot);
        Self::new(planner.plan(&problem))
    }

    pub fn schedule(&self) -> &RateMatrix {
        &self.schedule
    }
}

impl Policy for OfflinePolicy {
    fn decide(&mut self, observation: &Observation) -> Vec<f32> {
        let slot = observation.timestep.checked_sub(1);
        (0..self.schedule.num_buses())
            .map(|bus| slot.map_or(0.0, |s| self.schedule.rate(bus, s)))
            .collect()
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

/// A trained mapping from observation features to per-bus rates.
///
/// Features follow [`Observation::features`]: SOC of every bus, hours to
/// departure of every bus, aggregate draw, price.
pub trait ControlFunction {
    fn act(&self, features: &[f32]) -> Vec<f32>;
}

/// Linear control function with shared per-bus weights.
///
/// For bus `i`: `rate_i = max(0, bias + soc_gap * (target_soc - soc_i)
/// + hours * hours_i + grid_draw * draw + price * price)`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinearControl {
    /// Target SOC the gap is measured against (percent).
    pub target_soc_pct: f32,
    pub bias: f32,
    /// Weight on the SOC gap (kW per percentage point).
    pub soc_gap: f32,
    /// Weight on hours to departure (kW per hour).
    pub hours: f32,
    /// Weight on aggregate draw (kW per kW).
    pub grid_draw: f32,
    /// Weight on price (kW per currency unit).
    pub price: f32,
}

impl Default for LinearControl {
    fn default() -> Self {
        Self {
            target_soc_pct: 90.0,
            bias: 0.0,
            soc_gap: 2.0,
            hours: 0.0,
            grid_draw: 0.0,
            price: 0.0,
        }
    }
}

impl ControlFunction for LinearControl {
    fn act(&self, features: &[f32]) -> Vec<f32> {
        let n = features.len().saturating_sub(2) / 2;
        let draw = features.get(2 * n).copied().unwrap_or(0.0);
        let price = features.get(2 * n + 1).copied().unwrap_or(0.0);
        (0..n)
            .map(|i| {
                let gap = (self.target_soc_pct - features[i]).max(0.0);
                if gap == 0.0 {
                    return 0.0;
                }
                let hours = features[n + i];
                (self.bias
                    + self.soc_gap * gap
                    + self.hours * hours
                    + self.grid_draw * draw
                    + self.price * price)
                    .max(0.0)
            })
            .collect()
    }
}

/// Queries a trained control function every tick.
pub struct LearnedPolicy {
    control: Box<dyn ControlFunction>,
}

impl LearnedPolicy {
    pub fn new(control: Box<dyn ControlFunction>) -> Self {
        Self { control }
    }
}

impl Policy for LearnedPolicy {
    fn decide(&mut self, observation: &Observation) -> Vec<f32> {
        self.control.act(&observation.features())
    }

    fn name(&self) -> &'static str {
        "learned"
    }
}

/// Policy variants selectable from configuration.
pub enum DepotPolicy {
    Greedy(GreedyPolicy),
    OfflineOptimized(OfflinePolicy),
    LearnedOnline(LearnedPolicy),
}

impl Policy for DepotPolicy {
    fn decide(&mut self, observation: &Observation) -> Vec<f32> {
        match self {
            Self::Greedy(p) => p.decide(observation),
            Self::OfflineOptimized(p) => p.decide(observation),
            Self::LearnedOnline(p) => p.decide(observation),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Greedy(p) => p.name(),
            Self::OfflineOptimized(p) => p.name(),
            Self::LearnedOnline(p) => p.name(),
        }
    }
}
