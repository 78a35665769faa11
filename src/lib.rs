//! Particle population assembly and rigid-body coupling for SPH scenarios.
//!
//! A scenario is made of four particle populations (boundary, rigid-body objects, obstacle,
//! fluid) packed into flat arrays for the fluid solver, a rapier world holding the rigid
//! bodies, and a gravity schedule that releases the bodies at a given time and records
//! telemetry on one of them.

#![allow(clippy::too_many_arguments)]

pub extern crate nalgebra as na;
pub extern crate rapier3d as rapier;

pub mod error;
pub mod grid;
pub mod particles;
pub mod rigid;
pub mod sampling;
pub mod scenario;
pub mod schedule;

pub use error::{Error, Result};
pub use scenario::{Scenario, ScenarioConfig};
