//! Scenario-driven construction and execution of a depot run.

use tracing::info;

use crate::config::ScenarioConfig;
use crate::devices::Bus;
use crate::error::Result;
use crate::sim::engine::DepotState;
use crate::sim::kpi::KpiReport;
use crate::sim::policy::{DepotPolicy, GreedyPolicy, LearnedPolicy, OfflinePolicy};
use crate::sim::schedule::CheapestSlotPlanner;
use crate::sim::types::TickResult;

/// Everything a completed run produces.
pub struct SimulationResult {
    /// One record per tick.
    pub results: Vec<TickResult>,
    /// Aggregate metrics over the run.
    pub kpis: KpiReport,
    /// Fleet state after the last tick.
    pub buses: Vec<Bus>,
}

/// Builds the configured policy for a freshly constructed depot.
///
/// The offline policy plans against the depot's true timetable, so it must
/// be built before the first tick.
pub fn build_policy(config: &ScenarioConfig, depot: &DepotState) -> DepotPolicy {
    match config.policy.kind.as_str() {
        "offline" => {
            DepotPolicy::OfflineOptimized(OfflinePolicy::plan(depot, &CheapestSlotPlanner))
        }
        "learned" => {
            DepotPolicy::LearnedOnline(LearnedPolicy::new(Box::new(config.policy.linear)))
        }
        _ => DepotPolicy::Greedy(GreedyPolicy),
    }
}

/// Validates, builds, and runs a scenario to completion.
///
/// # Errors
///
/// Returns `DepotError::Config` for the first validation error and
/// propagates any fatal error raised during the run.
pub fn run_scenario(config: &ScenarioConfig) -> Result<SimulationResult> {
    if let Some(err) = config.validate().into_iter().next() {
        return Err(err.into());
    }

    let mut depot = DepotState::new(config.to_depot_config())?;
    let mut policy = build_policy(config, &depot);
    let results = depot.run(&mut policy)?;
    let kpis = KpiReport::from_results(&results, depot.buses());
    info!(
        cost = kpis.total_cost,
        at_target = kpis.buses_at_target,
        buses = kpis.bus_count,
        "scenario complete"
    );

    Ok(SimulationResult {
        results,
        kpis,
        buses: depot.buses().to_vec(),
    })
}
