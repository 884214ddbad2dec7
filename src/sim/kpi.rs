//! Post-hoc KPI computation from simulation results.

use std::fmt;

use crate::devices::Bus;

use super::types::TickResult;

/// Aggregate key performance indicators derived from a complete simulation run.
///
/// Computed post-hoc from `Vec<TickResult>` and the final fleet state to
/// ensure consistency between tick data and reported metrics.
#[derive(Debug, Clone)]
pub struct KpiReport {
    /// Total energy cost.
    pub total_cost: f32,
    /// Total energy delivered across all buses (kWh).
    pub energy_delivered_kwh: f32,
    /// Peak aggregate draw (kW).
    pub peak_draw_kw: f32,
    /// Number of ticks where the aggregate draw exceeded the grid limit.
    pub grid_violation_count: usize,
    /// Buses at or above their target SOC at the end of the run.
    pub buses_at_target: usize,
    /// Fleet size.
    pub bus_count: usize,
    /// Energy still missing to reach every target (kWh).
    pub unmet_demand_kwh: f32,
    /// Buses that never got a connector, including admissions after the
    /// last delivery.
    pub never_connected: usize,
}

impl KpiReport {
    /// Computes all KPIs from the tick records and the final fleet.
    ///
    /// # Arguments
    ///
    /// * `results` - Complete simulation tick results
    /// * `buses` - Fleet state after the last tick
    pub fn from_results(results: &[TickResult], buses: &[Bus]) -> Self {
        let mut peak_draw = 0.0_f32;
        let mut energy = 0.0_f32;
        let mut violations = 0_usize;

        for r in results {
            peak_draw = peak_draw.max(r.grid_draw_kw);
            energy += r.energy_delivered_kwh;
            if !r.within_grid_limit {
                violations += 1;
            }
        }

        Self {
            total_cost: results.last().map_or(0.0, |r| r.cumulative_cost),
            energy_delivered_kwh: energy,
            peak_draw_kw: peak_draw,
            grid_violation_count: violations,
            buses_at_target: buses.iter().filter(|b| b.meets_target()).count(),
            bus_count: buses.len(),
            unmet_demand_kwh: buses.iter().map(Bus::energy_shortfall_kwh).sum(),
            never_connected: buses.iter().filter(|b| !b.has_connected()).count(),
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Total cost:            {:.2}", self.total_cost)?;
        writeln!(f, "Energy delivered:      {:.2} kWh", self.energy_delivered_kwh)?;
        writeln!(f, "Peak draw:             {:.2} kW", self.peak_draw_kw)?;
        writeln!(f, "Grid violations:       {}", self.grid_violation_count)?;
        writeln!(
            f,
            "Buses at target:       {}/{}",
            self.buses_at_target, self.bus_count
        )?;
        writeln!(f, "Unmet demand:          {:.2} kWh", self.unmet_demand_kwh)?;
        write!(f, "Never connected:       {}", self.never_connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::JitterModel;
    use crate::sim::types::BusTelemetry;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use rand::{SeedableRng, rngs::StdRng};

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 6)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .expect("valid timestamp")
    }

    fn make_bus(id: usize, initial_soc_pct: f32) -> Bus {
        let jitter = JitterModel::new(0.0, TimeDelta::hours(1));
        let mut rng = StdRng::seed_from_u64(0);
        Bus::new(id, at(1), at(9), 100.0, initial_soc_pct, 90.0, &jitter, &mut rng)
    }

    fn make_result(t: usize, draw: f32, ok: bool, connected: &[bool]) -> TickResult {
        TickResult {
            timestep: t,
            time: at(t as u32),
            price: 0.1,
            grid_draw_kw: draw,
            within_grid_limit: ok,
            energy_delivered_kwh: draw,
            tick_cost: 0.1 * draw,
            cumulative_cost: 0.1 * draw * t as f32,
            connected_buses: connected.iter().filter(|&&c| c).count(),
            waiting_buses: 0,
            buses: connected
                .iter()
                .enumerate()
                .map(|(id, &c)| BusTelemetry {
                    bus_id: id,
                    soc_pct: 0.0,
                    applied_rate_kw: 0.0,
                    delivered_kwh: 0.0,
                    connected: c,
                })
                .collect(),
        }
    }

    #[test]
    fn peak_energy_and_violations() {
        let results = vec![
            make_result(1, 50.0, true, &[true, false]),
            make_result(2, 120.0, false, &[true, false]),
            make_result(3, 80.0, true, &[true, false]),
        ];
        let buses = vec![make_bus(0, 95.0), make_bus(1, 20.0)];
        let kpi = KpiReport::from_results(&results, &buses);
        assert_eq!(kpi.peak_draw_kw, 120.0);
        assert!((kpi.energy_delivered_kwh - 250.0).abs() < 1e-4);
        assert_eq!(kpi.grid_violation_count, 1);
        assert!((kpi.total_cost - 24.0).abs() < 1e-4);
    }

    #[test]
    fn target_and_unmet_demand() {
        let buses = vec![make_bus(0, 95.0), make_bus(1, 20.0), make_bus(2, 80.0)];
        let kpi = KpiReport::from_results(&[], &buses);
        assert_eq!(kpi.buses_at_target, 1);
        assert_eq!(kpi.bus_count, 3);
        // 70 + 10 points of a 100 kWh battery
        assert!((kpi.unmet_demand_kwh - 80.0).abs() < 1e-3);
    }

    #[test]
    fn never_connected_buses_are_counted() {
        let results = vec![make_result(1, 10.0, true, &[true, false, false])];
        let mut buses = vec![make_bus(0, 20.0), make_bus(1, 20.0), make_bus(2, 20.0)];
        buses[0].mark_connected();
        buses[1].mark_connected();
        let kpi = KpiReport::from_results(&results, &buses);
        assert_eq!(kpi.never_connected, 1);
    }

    #[test]
    fn empty_results() {
        let kpi = KpiReport::from_results(&[], &[]);
        assert_eq!(kpi.total_cost, 0.0);
        assert_eq!(kpi.grid_violation_count, 0);
        assert_eq!(kpi.never_connected, 0);
        assert!(!format!("{kpi}").is_empty());
    }
}
