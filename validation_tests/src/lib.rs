//! Headless runner for the dunk3d scenarios.
//!
//! Assembles a scenario, drives its step-time callbacks without a fluid solver (the fluid
//! force on every body is zero) and records the rigid-body trajectories, so that the
//! release, fall and floor contact of the bodies can be checked or compared across runs.
//!
//! # Usage
//!
//! ```bash
//! # Run every preset from shortly before its release time
//! cargo run -p dunk_validation -- --scenario all
//!
//! # Run a scenario described by a JSON file
//! cargo run -p dunk_validation -- --config my_scenario.json --steps 5000
//! ```

pub mod harness;

pub use harness::*;
