//! Headless scenario harness.
//!
//! Drives the step-time callbacks of a [`Scenario`] and extracts the rigid-body states
//! for later inspection or comparison with other runs.

use dunk3d::Scenario;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Recorded state of a single rigid body at a point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BodyState {
    pub name: String,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub velocity: [f32; 3],
}

/// Recorded state of every rigid body at a point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RigidSnapshot {
    pub time: f32,
    pub step: usize,
    /// Gravity applied by the rigid-body engine during this step.
    pub engine_gravity: [f32; 3],
    /// Contact constraints created during this step.
    pub contacts: usize,
    pub bodies: Vec<BodyState>,
}

/// Complete rigid-body trajectory of a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RigidTrajectory {
    pub name: String,
    pub dt: f32,
    pub snapshots: Vec<RigidSnapshot>,
    pub metadata: RunMetadata,
}

/// Setup of the scenario a trajectory was recorded from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunMetadata {
    pub num_particles: usize,
    pub cell_size: f32,
    pub gravity: [f32; 3],
    pub release_time: f32,
    pub populations: PopulationSizes,
}

/// Particle count of each packed population.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PopulationSizes {
    pub boundary: usize,
    pub objects: Vec<usize>,
    pub obstacle: usize,
    pub fluid: usize,
}

impl RigidTrajectory {
    /// Export trajectory to JSON file.
    pub fn export_json(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load trajectory from JSON file.
    pub fn load_json(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let trajectory: RigidTrajectory = serde_json::from_str(&json)?;
        Ok(trajectory)
    }

    /// States of the body named `name`, in time order.
    pub fn body_history<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (f32, &'a BodyState)> {
        self.snapshots.iter().filter_map(move |s| {
            s.bodies
                .iter()
                .find(|b| b.name == name)
                .map(|b| (s.time, b))
        })
    }
}

/// How long to run and how often to record.
#[derive(Copy, Clone, Debug)]
pub struct RunOptions {
    pub steps: usize,
    pub snapshot_interval: usize,
    /// Simulation time of the first step.
    pub start_time: f32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            steps: 2_000,
            snapshot_interval: 100,
            start_time: 0.0,
        }
    }
}

fn extract_snapshot(scenario: &Scenario, step: usize, time: f32, contacts: usize) -> RigidSnapshot {
    let world = scenario.world();
    let bodies = scenario
        .registry()
        .iter()
        .filter_map(|body| {
            let pose = world.body_pose(body.body())?;
            let linvel = world.body_linvel(body.body())?;
            let rot = pose.rotation.coords;
            Some(BodyState {
                name: body.name().to_string(),
                position: pose.translation.vector.into(),
                rotation: [rot.x, rot.y, rot.z, rot.w],
                velocity: linvel.into(),
            })
        })
        .collect();

    RigidSnapshot {
        time,
        step,
        engine_gravity: world.gravity().into(),
        contacts,
        bodies,
    }
}

/// Runs `scenario` for `options.steps` steps without fluid forces and records the
/// rigid-body trajectory.
pub fn run_scenario(scenario: &mut Scenario, options: RunOptions) -> RigidTrajectory {
    let config = scenario.config().clone();
    let dt = config.sph.dt;
    let forces = vec![Vector3::zeros(); scenario.registry().count()];
    let interval = options.snapshot_interval.max(1);

    let mut snapshots = vec![extract_snapshot(scenario, 0, options.start_time, 0)];

    for step in 1..=options.steps {
        let step_start = Instant::now();
        let time = (options.start_time as f64 + (step - 1) as f64 * dt as f64) as f32;
        scenario.gravity_callback(time, &forces);
        let contacts = scenario.step_rigid_bodies();
        let step_time = step_start.elapsed();

        if step % interval == 0 || step == options.steps {
            snapshots.push(extract_snapshot(scenario, step, time + dt, contacts));
            println!(
                "  Step {}/{} ({:.3}ms/step, {} contacts)",
                step,
                options.steps,
                step_time.as_secs_f64() * 1000.0,
                contacts
            );
        }
    }

    let ranges = scenario.ranges();
    RigidTrajectory {
        name: config.name.clone(),
        dt,
        snapshots,
        metadata: RunMetadata {
            num_particles: scenario.total_particles(),
            cell_size: config.cell_size(),
            gravity: config.gravity.nominal.into(),
            release_time: config.gravity.release_time,
            populations: PopulationSizes {
                boundary: ranges.boundary.len(),
                objects: ranges.objects.iter().map(|r| r.len()).collect(),
                obstacle: ranges.obstacle.len(),
                fluid: ranges.fluid.len(),
            },
        },
    }
}
