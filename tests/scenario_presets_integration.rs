//! End-to-end runs of the built-in presets and bundled scenario files.

use std::path::Path;
use std::process::Command;

use depot_sim::config::ScenarioConfig;
use depot_sim::runner::run_scenario;

#[derive(Debug)]
struct Kpis {
    total_cost: f64,
    buses_at_target: usize,
    bus_count: usize,
}

#[test]
fn all_presets_validate_and_run() {
    for name in ScenarioConfig::PRESETS {
        let cfg = ScenarioConfig::from_preset(name).expect("preset should load");
        let errors = cfg.validate();
        assert!(errors.is_empty(), "preset \"{name}\" invalid: {errors:?}");

        let run = run_scenario(&cfg).unwrap_or_else(|e| panic!("preset \"{name}\" failed: {e}"));
        assert!(!run.results.is_empty());
        assert_eq!(run.kpis.bus_count, cfg.schedules().len());
        assert!(run.kpis.energy_delivered_kwh > 0.0, "preset \"{name}\" delivered nothing");
    }
}

#[test]
fn bundled_scenario_files_match_presets() {
    for name in ["overnight", "day_ahead"] {
        let path = format!("scenarios/{name}.toml");
        let file = ScenarioConfig::from_toml_file(Path::new(&path)).expect("scenario should parse");
        let preset = ScenarioConfig::from_preset(name).expect("preset should load");
        assert_eq!(file.schedules(), preset.schedules(), "{name} timetables differ");
        assert_eq!(file.policy.kind, preset.policy.kind);
        assert_eq!(file.depot.grid_limit_kw, preset.depot.grid_limit_kw);
    }
}

#[test]
fn scenarios_run_via_cli_and_report_kpis() {
    let overnight = run_and_parse_kpis(&["--scenario", "scenarios/overnight.toml"]);
    let day_ahead = run_and_parse_kpis(&["--scenario", "scenarios/day_ahead.toml"]);
    let learned = run_and_parse_kpis(&["--scenario", "scenarios/learned.toml"]);

    assert_eq!(overnight.bus_count, 20);
    assert_eq!(day_ahead.bus_count, 3);
    assert_eq!(day_ahead.buses_at_target, 3);
    assert_eq!(learned.bus_count, 3);
    assert!(overnight.total_cost > day_ahead.total_cost);
    assert!(learned.total_cost > 0.0);
}

#[test]
fn cli_policy_override_changes_cost() {
    let offline = run_and_parse_kpis(&["--preset", "day_ahead"]);
    let greedy = run_and_parse_kpis(&["--preset", "day_ahead", "--policy", "greedy"]);
    assert!(
        offline.total_cost < greedy.total_cost,
        "offline {:.2} should undercut greedy {:.2}",
        offline.total_cost,
        greedy.total_cost
    );
}

#[test]
fn cli_rejects_unknown_preset() {
    let output = Command::new(env!("CARGO_BIN_EXE_depot-sim"))
        .args(["--preset", "nonexistent"])
        .output()
        .expect("depot-sim process should run");
    assert!(!output.status.success());
}

fn run_and_parse_kpis(args: &[&str]) -> Kpis {
    let output = Command::new(env!("CARGO_BIN_EXE_depot-sim"))
        .args(args)
        .output()
        .expect("depot-sim process should run");

    assert!(
        output.status.success(),
        "run failed for {args:?}: stderr={} ",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
    parse_kpis(&stdout)
}

fn parse_kpis(stdout: &str) -> Kpis {
    let total_cost = parse_metric(stdout, "Total cost:")
        .parse::<f64>()
        .unwrap_or_else(|_| panic!("invalid total cost in output: {stdout}"));
    let at_target = parse_metric(stdout, "Buses at target:");
    let (reached, count) = at_target
        .split_once('/')
        .unwrap_or_else(|| panic!("invalid buses-at-target line: {at_target}"));

    Kpis {
        total_cost,
        buses_at_target: reached.trim().parse().expect("bus count"),
        bus_count: count.trim().parse().expect("bus count"),
    }
}

fn parse_metric<'a>(stdout: &'a str, label: &str) -> &'a str {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with(label))
        .unwrap_or_else(|| panic!("missing KPI line `{label}` in output: {stdout}"));

    line.split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_else(|| panic!("invalid KPI format for line `{line}`"))
}
