//! Scenario runner for dunk3d.
//!
//! Assembles the selected scenarios, drives them headless and exports their rigid-body
//! trajectories (and telemetry, for scenarios tracking a body) to the output directory.
//!
//! Usage:
//!   cargo run -p dunk_validation -- [OPTIONS]
//!
//! Options:
//!   --scenario <NAME>    Run a specific preset (or "all")
//!   --config <PATH>      Run the scenario described by a JSON file
//!   --steps <N>          Number of steps to run
//!   --start-time <T>     Simulation time of the first step
//!   --output-dir <PATH>  Output directory for results

use dunk3d::scenario::presets;
use dunk3d::{Scenario, ScenarioConfig};
use dunk_validation::harness::*;
use std::path::{Path, PathBuf};

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    let mut scenario_filter = "all".to_string();
    let mut config_file: Option<PathBuf> = None;
    let mut output_dir = PathBuf::from("dunk_results");
    let mut steps: Option<usize> = None;
    let mut start_time: Option<f32> = None;
    let mut snapshot_interval = RunOptions::default().snapshot_interval;
    let mut dump_config = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                if i < args.len() {
                    scenario_filter = args[i].clone();
                }
            }
            "--config" => {
                i += 1;
                if i < args.len() {
                    config_file = Some(PathBuf::from(&args[i]));
                }
            }
            "--output-dir" => {
                i += 1;
                if i < args.len() {
                    output_dir = PathBuf::from(&args[i]);
                }
            }
            "--steps" | "--start-time" | "--snapshot-interval" => {
                let flag = args[i].clone();
                i += 1;
                let Some(value) = args.get(i) else {
                    eprintln!("Missing value for {flag}");
                    print_help();
                    return;
                };
                let parsed = match flag.as_str() {
                    "--steps" => value.parse().map(|v| steps = Some(v)).is_ok(),
                    "--start-time" => value.parse().map(|v| start_time = Some(v)).is_ok(),
                    _ => value.parse().map(|v| snapshot_interval = v).is_ok(),
                };
                if !parsed {
                    eprintln!("Invalid value for {flag}: {value}");
                    return;
                }
            }
            "--dump-config" => {
                dump_config = true;
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                return;
            }
        }
        i += 1;
    }

    let configs = match load_configs(&scenario_filter, config_file.as_deref()) {
        Ok(configs) => configs,
        Err(e) => {
            eprintln!("Failed to load scenarios: {}", e);
            return;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        eprintln!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    for mut config in configs {
        if dump_config {
            let path = output_dir.join(format!("{}_config.json", config.name));
            match config.save_json(&path) {
                Ok(()) => println!("Saved configuration: {:?}", path),
                Err(e) => eprintln!("  Failed to save configuration: {}", e),
            }
            continue;
        }

        if config.telemetry.tracked_body.is_some() && config.telemetry.path.is_none() {
            config.telemetry.path = Some(output_dir.join(format!("{}_telemetry.txt", config.name)));
        }

        // Nothing moves before the release: start shortly before it unless told otherwise.
        let options = RunOptions {
            steps: steps.unwrap_or(RunOptions::default().steps),
            snapshot_interval,
            start_time: start_time
                .unwrap_or_else(|| (config.gravity.release_time - 0.01).max(0.0)),
        };
        run_one(config, options, &output_dir);
    }
}

fn load_configs(
    filter: &str,
    file: Option<&Path>,
) -> Result<Vec<ScenarioConfig>, Box<dyn std::error::Error>> {
    if let Some(path) = file {
        return Ok(vec![ScenarioConfig::load_json(path)?]);
    }

    if filter == "all" {
        Ok(presets::NAMES
            .iter()
            .map(|name| presets::by_name(name))
            .collect::<Result<_, _>>()?)
    } else {
        Ok(vec![presets::by_name(filter)?])
    }
}

fn run_one(config: ScenarioConfig, options: RunOptions, output_dir: &Path) {
    println!("\nRunning scenario: {}", config.name);
    let mut scenario = match Scenario::build(config) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("  Failed to build scenario: {}", e);
            return;
        }
    };

    println!("  Particles: {}", scenario.total_particles());
    println!("  Bodies: {}", scenario.registry().count());
    println!(
        "  Steps: {} from t = {}",
        options.steps, options.start_time
    );

    let trajectory = run_scenario(&mut scenario, options);
    let json_path = output_dir.join(format!("{}_rigid.json", trajectory.name));
    match trajectory.export_json(&json_path) {
        Ok(()) => println!("  Saved: {:?}", json_path),
        Err(e) => eprintln!("  Failed to export trajectory: {}", e),
    }
    scenario.teardown();
}

fn print_help() {
    println!(
        r#"
dunk3d Scenario Runner

Usage:
  cargo run -p dunk_validation -- [OPTIONS]

Options:
  --scenario <NAME>          Run a specific preset. Options:
                               all (default), cylinder_fall, gprobe_fall, trial

  --config <PATH>            Run the scenario described by a JSON file instead of a preset

  --steps <N>                Number of steps to run (default: 2000)

  --start-time <T>           Simulation time of the first step
                             (default: 0.01 before the release time of the scenario)

  --snapshot-interval <N>    Record the rigid bodies every N steps (default: 100)

  --output-dir <PATH>        Output directory for results (default: dunk_results)
                             Writes <scenario>_rigid.json and, for scenarios tracking
                             a body, <scenario>_telemetry.txt

  --dump-config              Write <scenario>_config.json for the selected scenarios
                             and exit without running them

  --help, -h                 Show this help message
"#
    );
}
