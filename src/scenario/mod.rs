//! Scenario assembly and step-time callbacks.
//!
//! [`Scenario::build`] samples the particle populations, registers the rigid bodies and
//! packs everything into the solver arrays. Once built, the step driver calls
//! [`Scenario::gravity_callback`] once per step and [`Scenario::step_rigid_bodies`] to
//! advance the rigid bodies. Contacts found during the rigid-body step go through the
//! contact synthesizer before the solver sees them.

pub use config::{DomainConfig, ObstacleConfig, ScenarioConfig, SphParams, TelemetryConfig};

mod config;
pub mod presets;

use crate::error::{Error, Result};
use crate::grid::CellGrid;
use crate::particles::{
    BufferPacker, ParticleBuffers, PopulationBuilder, PopulationRanges, Populations,
};
use crate::rigid::{ContactGroup, RigidBodyRegistry, RigidWorld, SolverPlane, StaticPlane};
use crate::sampling::{GeometryProvider, LatticeSampler};
use crate::schedule::{DynamicsGravity, SchedulerState, Telemetry, TelemetryProbe, TelemetrySink};
use nalgebra::Vector3;
use rapier3d::prelude::RigidBodyHandle;

/// A fully assembled scenario.
pub struct Scenario {
    config: ScenarioConfig,
    world: RigidWorld,
    registry: RigidBodyRegistry,
    populations: Populations,
    grid: CellGrid,
    buffers: ParticleBuffers,
    ranges: PopulationRanges,
    contacts: ContactGroup<RigidBodyHandle>,
    scheduler: SchedulerState,
    probe: Option<TelemetryProbe<RigidBodyHandle>>,
    sink: Option<TelemetrySink>,
}

impl Scenario {
    /// Assembles `config` with the default lattice sampler.
    pub fn build(config: ScenarioConfig) -> Result<Self> {
        Self::build_with(config, &LatticeSampler::default())
    }

    /// Assembles `config`, sampling shapes with `provider`.
    ///
    /// Any error aborts the construction: no partially built scenario is returned.
    pub fn build_with(config: ScenarioConfig, provider: &impl GeometryProvider) -> Result<Self> {
        config.validate()?;
        log::info!("building scenario `{}`", config.name);

        let mut world = RigidWorld::new(config.sph.dt)?;
        if config.use_planes {
            world.install_static_planes(&StaticPlane::domain_walls(
                config.domain.origin,
                config.domain.size,
            ))?;
        }
        // Engine gravity matching the phase at t = 0.
        world.set_gravity(config.gravity.dynamics_gravity(0.0));
        world.synthesizer_mut().log_body_pairs = config.log_body_contacts;

        let output = PopulationBuilder::new(provider).build(&config)?;
        let total = output.total();

        let mut registry = RigidBodyRegistry::default();
        for (desc, particles) in config.bodies.iter().zip(output.objects) {
            registry.register(&mut world, desc, particles)?;
        }

        let grid = CellGrid::new(config.domain.origin, config.domain.size, config.cell_size())?;
        let mut buffers = ParticleBuffers::with_len(total);
        let ranges = BufferPacker::new(&grid, config.sph.rho0).pack(
            &output.populations,
            &registry,
            &mut buffers,
        )?;
        log::info!("scenario `{}`: {total} particles", config.name);

        let probe = match config.telemetry.tracked_body {
            Some(idx) => {
                let body = registry.get(idx).ok_or_else(|| {
                    Error::InvalidParam(format!("tracked body {idx} is not registered"))
                })?;
                Some(TelemetryProbe {
                    body: body.body(),
                    object_index: idx,
                    axis: config.telemetry.velocity_axis,
                    record_force: config.telemetry.record_force,
                })
            }
            None => None,
        };

        let sink = match (&config.telemetry.path, &probe) {
            (Some(path), Some(_)) => {
                Some(TelemetrySink::create(path, config.telemetry.record_force)?)
            }
            _ => None,
        };

        Ok(Self {
            config,
            world,
            registry,
            populations: output.populations,
            grid,
            buffers,
            ranges,
            contacts: ContactGroup::default(),
            scheduler: SchedulerState::default(),
            probe,
            sink,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn world(&self) -> &RigidWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut RigidWorld {
        &mut self.world
    }

    pub fn registry(&self) -> &RigidBodyRegistry {
        &self.registry
    }

    pub fn populations(&self) -> &Populations {
        &self.populations
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn buffers(&self) -> &ParticleBuffers {
        &self.buffers
    }

    pub fn ranges(&self) -> &PopulationRanges {
        &self.ranges
    }

    pub fn total_particles(&self) -> usize {
        self.buffers.len()
    }

    pub fn scheduler_state(&self) -> &SchedulerState {
        &self.scheduler
    }

    pub fn contacts(&self) -> &ContactGroup<RigidBodyHandle> {
        &self.contacts
    }

    /// Replaces the telemetry sink, e.g. to capture records in memory.
    pub fn set_telemetry_sink(&mut self, sink: TelemetrySink) {
        self.sink = Some(sink);
    }

    pub fn telemetry_sink(&self) -> Option<&TelemetrySink> {
        self.sink.as_ref()
    }

    /// Planes the fluid solver must enforce, in the same order as the static colliders:
    /// floor, x-near, x-far, y-near, y-far (x walls before y walls).
    pub fn solver_planes(&self) -> Vec<SolverPlane> {
        if !self.config.use_planes {
            return vec![];
        }
        StaticPlane::domain_walls(self.config.domain.origin, self.config.domain.size)
            .iter()
            .map(StaticPlane::to_solver)
            .collect()
    }

    /// Per-step gravity callback. `forces` holds the net fluid force on each rigid body, by
    /// object index. Returns the gravity of the fluid.
    pub fn gravity_callback(&mut self, t: f32, forces: &[Vector3<f32>]) -> Vector3<f32> {
        let telemetry = match (&self.probe, self.sink.as_mut()) {
            (Some(probe), Some(sink)) => Some(Telemetry {
                probe,
                forces,
                sink,
            }),
            _ => None,
        };
        self.config
            .gravity
            .on_step(&mut self.scheduler, t, &mut self.world, telemetry)
    }

    /// Advances the rigid bodies by one step. Returns the number of contact constraints
    /// created during the step.
    pub fn step_rigid_bodies(&mut self) -> usize {
        self.world.step();
        self.contacts = self.world.take_contacts();
        self.contacts.len()
    }

    /// Flushes and closes the telemetry sink and releases the rigid-body world.
    pub fn teardown(mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.flush();
            log::info!(
                "scenario `{}`: {} telemetry records written, {} dropped",
                self.config.name,
                sink.written(),
                sink.dropped()
            );
        }
    }
}
