//! Full-horizon charging schedules for offline optimization.
//!
//! A [`ScheduleProblem`] captures everything an offline search needs: per-bus
//! energy demand and availability, slot prices, and the grid limit. Any search
//! procedure implementing [`SchedulePlanner`] can produce the [`RateMatrix`]
//! that `OfflinePolicy` replays; [`ScheduleProblem::score`] is the objective
//! such procedures minimize.

use std::cmp::Ordering;
use std::iter;

use crate::sim::engine::DepotState;

/// Penalty per kW scheduled outside a bus's availability window.
pub const UNAVAILABLE_PENALTY: f32 = 1000.0;
/// Penalty per kWh of demand left unmet at departure.
pub const UNMET_DEMAND_PENALTY: f32 = 3000.0;
/// Penalty per kW of aggregate rate above the grid limit.
pub const GRID_EXCESS_PENALTY: f32 = 1000.0;
/// Penalty per kW of negative rate.
pub const NEGATIVE_RATE_PENALTY: f32 = 1000.0;

/// Slack for float residue when comparing delivered energy with demand.
const ENERGY_EPSILON_KWH: f32 = 1e-3;

/// Bus × slot matrix of charging rates (kW), stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RateMatrix {
    num_buses: usize,
    num_slots: usize,
    rates: Vec<f32>,
}

impl RateMatrix {
    /// All-zero schedule.
    pub fn zeros(num_buses: usize, num_slots: usize) -> Self {
        Self {
            num_buses,
            num_slots,
            rates: vec![0.0; num_buses * num_slots],
        }
    }

    /// Builds a matrix from one row per bus.
    ///
    /// Returns `None` if the rows have different lengths.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Option<Self> {
        let num_slots = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != num_slots) {
            return None;
        }
        Some(Self {
            num_buses: rows.len(),
            num_slots,
            rates: rows.into_iter().flatten().collect(),
        })
    }

    pub fn num_buses(&self) -> usize {
        self.num_buses
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Rate of `bus` in `slot`; `0.0` outside the matrix.
    pub fn rate(&self, bus: usize, slot: usize) -> f32 {
        if bus < self.num_buses && slot < self.num_slots {
            self.rates[bus * self.num_slots + slot]
        } else {
            0.0
        }
    }

    /// Sets one entry. Out-of-range indices are ignored.
    pub fn set(&mut self, bus: usize, slot: usize, rate_kw: f32) {
        if bus < self.num_buses && slot < self.num_slots {
            self.rates[bus * self.num_slots + slot] = rate_kw;
        }
    }

    /// Schedule of one bus; `None` outside the matrix.
    pub fn row(&self, bus: usize) -> Option<&[f32]> {
        (bus < self.num_buses)
            .then(|| &self.rates[bus * self.num_slots..(bus + 1) * self.num_slots])
    }

    /// Aggregate rate across all buses in `slot`.
    pub fn slot_total(&self, slot: usize) -> f32 {
        (0..self.num_buses).map(|b| self.rate(b, slot)).sum()
    }
}

/// Planning view of one bus.
#[derive(Debug, Clone)]
pub struct BusDemand {
    /// Energy required by departure (kWh).
    pub energy_demand_kwh: f32,
    /// Whether the bus can charge in each slot.
    pub available: Vec<bool>,
    /// Highest rate its connector can deliver (kW).
    pub max_rate_kw: f32,
}

/// Inputs of the offline scheduling problem.
#[derive(Debug, Clone)]
pub struct ScheduleProblem {
    /// Price per kWh in each slot.
    pub prices: Vec<f32>,
    /// Slot length in hours.
    pub slot_hours: f32,
    /// Soft cap on aggregate rate per slot (kW).
    pub grid_limit_kw: f32,
    pub buses: Vec<BusDemand>,
}

/// Objective value of a schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleScore {
    /// Σ price × energy over all slots.
    pub energy_cost: f32,
    /// Weighted constraint violations.
    pub penalty: f32,
}

impl ScheduleScore {
    pub fn total(&self) -> f32 {
        self.energy_cost + self.penalty
    }
}

impl ScheduleProblem {
    /// Builds the problem from a depot's true bus times and tick prices.
    ///
    /// Slot `j` is replayed on the tick at `start + (j + 1) * timestep`. A bus
    /// can charge in that slot if it was already parked at the previous tick
    /// instant, when connectors are assigned, and has not left before the
    /// slot's own tick.
    pub fn from_depot(depot: &DepotState) -> Self {
        let slots = depot.slot_instants();
        let prices = slots.iter().map(|&t| depot.prices().price_at(t)).collect();
        let max_rate_kw = depot.config().max_rate_kw;
        let admitted_at: Vec<_> = iter::once(depot.clock().start())
            .chain(slots.iter().copied())
            .collect();
        let buses = depot
            .buses()
            .iter()
            .map(|bus| BusDemand {
                energy_demand_kwh: bus.energy_shortfall_kwh(),
                available: slots
                    .iter()
                    .zip(&admitted_at)
                    .map(|(&t, &prev)| bus.true_arrival <= prev && t <= bus.true_departure)
                    .collect(),
                max_rate_kw,
            })
            .collect();

        Self {
            prices,
            slot_hours: depot.clock().step_hours(),
            grid_limit_kw: depot.config().grid_limit_kw,
            buses,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.prices.len()
    }

    /// Scores a schedule: energy cost plus penalties for charging while
    /// unavailable, unmet demand, grid-limit excess, and negative rates.
    pub fn score(&self, schedule: &RateMatrix) -> ScheduleScore {
        let mut energy_cost = 0.0;
        let mut penalty = 0.0;

        for (b, bus) in self.buses.iter().enumerate() {
            let mut delivered_kwh = 0.0;
            for (t, &price) in self.prices.iter().enumerate() {
                let rate = schedule.rate(b, t);
                if rate < 0.0 {
                    penalty += NEGATIVE_RATE_PENALTY * -rate;
                }
                if bus.available.get(t).copied().unwrap_or(false) {
                    delivered_kwh += rate * self.slot_hours;
                } else if rate > 0.0 {
                    penalty += UNAVAILABLE_PENALTY * rate;
                }
                energy_cost += price * rate * self.slot_hours;
            }
            if delivered_kwh + ENERGY_EPSILON_KWH < bus.energy_demand_kwh {
                penalty += UNMET_DEMAND_PENALTY * (bus.energy_demand_kwh - delivered_kwh);
            }
        }

        for t in 0..self.num_slots() {
            let excess = schedule.slot_total(t) - self.grid_limit_kw;
            if excess > 0.0 {
                penalty += GRID_EXCESS_PENALTY * excess;
            }
        }

        ScheduleScore {
            energy_cost,
            penalty,
        }
    }
}

/// A search procedure producing a full-horizon schedule.
pub trait SchedulePlanner {
    /// Returns a bus × slot rate matrix for `problem`.
    fn plan(&self, problem: &ScheduleProblem) -> RateMatrix;
}

/// Deterministic baseline planner.
///
/// Buses are served in order of their last available slot. Each bus's demand
/// is poured into its cheapest available slots (earliest first on ties), capped
/// by the connector maximum and the grid headroom left by earlier buses.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheapestSlotPlanner;

impl SchedulePlanner for CheapestSlotPlanner {
    fn plan(&self, problem: &ScheduleProblem) -> RateMatrix {
        let num_slots = problem.num_slots();
        let mut schedule = RateMatrix::zeros(problem.buses.len(), num_slots);
        if problem.slot_hours <= 0.0 {
            return schedule;
        }
        let mut headroom = vec![problem.grid_limit_kw.max(0.0); num_slots];

        let mut order: Vec<usize> = (0..problem.buses.len()).collect();
        order.sort_by_key(|&b| {
            let deadline = problem.buses[b].available.iter().rposition(|&a| a);
            (deadline.unwrap_or(usize::MAX), b)
        });

        for b in order {
            let bus = &problem.buses[b];
            let mut slots: Vec<usize> = (0..num_slots)
                .filter(|&t| bus.available.get(t).copied().unwrap_or(false))
                .collect();
            slots.sort_by(|&x, &y| {
                problem.prices[x]
                    .partial_cmp(&problem.prices[y])
                    .unwrap_or(Ordering::Equal)
                    .then(x.cmp(&y))
            });

            let mut remaining_kwh = bus.energy_demand_kwh;
            for t in slots {
                if remaining_kwh <= 0.0 {
                    break;
                }
                let rate = (remaining_kwh / problem.slot_hours)
                    .min(bus.max_rate_kw)
                    .min(headroom[t])
                    .max(0.0);
                schedule.set(b, t, rate);
                headroom[t] -= rate;
                remaining_kwh -= rate * problem.slot_hours;
            }
        }

        schedule
    }
}
