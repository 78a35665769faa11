use super::{ParticleKind, Population, Populations};
use crate::error::Result;
use crate::sampling::GeometryProvider;
use crate::scenario::ScenarioConfig;

/// Populations produced by [`PopulationBuilder::build`].
#[derive(Clone, Debug)]
pub struct BuildOutput {
    pub populations: Populations,
    /// One population per rigid body, in the order of [`ScenarioConfig::bodies`].
    pub objects: Vec<Population>,
}

impl BuildOutput {
    /// Total number of particles of all populations. The packer must write exactly this many.
    pub fn total(&self) -> usize {
        self.populations.len() + self.objects.iter().map(|o| o.len()).sum::<usize>()
    }
}

/// Samples every particle population of a scenario.
pub struct PopulationBuilder<'a, G: GeometryProvider> {
    provider: &'a G,
}

impl<'a, G: GeometryProvider> PopulationBuilder<'a, G> {
    pub fn new(provider: &'a G) -> Self {
        Self { provider }
    }

    /// Samples the boundary, fluid, obstacle and rigid-body populations of `config`.
    ///
    /// The fluid is carved around the obstacle and around every body with
    /// `unfill_fluid` set, so that the populations never overlap.
    pub fn build(&self, config: &ScenarioConfig) -> Result<BuildOutput> {
        config.validate()?;

        let r0 = config.sph.r0;
        let deltap = config.sph.deltap;
        let mut populations = Populations::default();

        if !config.use_planes {
            let mass = config.boundary_mass().particle_mass();
            let pts = self
                .provider
                .fill_border(&config.boundary_box(), r0, false);
            populations.boundary.extend_from_points(pts, mass);
            log::debug!("boundary: {} particles", populations.boundary.len());
        }

        let fluid_mass = config.fluid_mass().particle_mass();
        let bulk = config.fluid_region();
        let pts = self.provider.fill(&bulk, deltap);
        populations.fluid.extend_from_points(pts, fluid_mass);

        if config.wet {
            if let Some(region) = &config.wet_region {
                // Union with the bulk: the part of the region already filled is skipped.
                let pts = self.provider.fill(region, deltap);
                let wet = self.provider.unfill(&pts, &bulk, 0.5 * deltap);
                log::debug!(
                    "wetting region: {} particles, {} inside the bulk fluid",
                    wet.len(),
                    pts.len() - wet.len()
                );
                populations.fluid.extend_from_points(wet, fluid_mass);
            }
        }
        log::debug!("fluid: {} particles", populations.fluid.len());

        if let Some(obstacle) = &config.obstacle {
            let removed = populations.fluid.unfill(self.provider, &obstacle.shape, r0);
            let pts = self.provider.fill_border(&obstacle.shape, r0, true);
            populations
                .obstacle
                .extend_from_points(pts, obstacle.particle_mass.particle_mass());
            log::debug!(
                "obstacle: {} particles, {removed} fluid particles removed",
                populations.obstacle.len()
            );
        }

        let mut objects = Vec::with_capacity(config.bodies.len());
        for desc in &config.bodies {
            if desc.unfill_fluid {
                let removed = populations.fluid.unfill(self.provider, &desc.shape, r0);
                log::debug!("{}: {removed} fluid particles removed", desc.name);
            }

            let mut object = Population::new(ParticleKind::ObjectPart);
            let pts = self.provider.fill_border(&desc.shape, r0, true);
            object.extend_from_points(pts, desc.particle_mass.particle_mass());
            log::debug!("{}: {} surface particles", desc.name, object.len());
            objects.push(object);
        }

        Ok(BuildOutput {
            populations,
            objects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::MassConvention;
    use crate::rigid::RigidBodyDescriptor;
    use crate::sampling::{LatticeSampler, Shape};
    use crate::scenario::{presets, ObstacleConfig};
    use nalgebra::{point, vector};

    fn small_config() -> ScenarioConfig {
        let mut config = presets::cylinder_fall();
        config.domain.size = vector![0.3, 0.3, 0.6];
        config.fluid_depth = 0.15;
        config.bodies[0].shape = Shape::cylinder(point![0.15, 0.15, 0.1], 0.025, vector![0.0, 0.0, 0.2]);
        config
    }

    #[test]
    fn planes_replace_boundary_particles() {
        let sampler = LatticeSampler::default();
        let mut config = small_config();
        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        assert!(out.populations.boundary.is_empty());
        assert_eq!(out.objects.len(), 1);

        config.use_planes = false;
        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        assert!(!out.populations.boundary.is_empty());
        assert!(out
            .populations
            .boundary
            .iter()
            .all(|r| r.mass == config.boundary_mass().particle_mass()));
    }

    #[test]
    fn fluid_is_carved_around_bodies() {
        let sampler = LatticeSampler::default();
        let config = small_config();
        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        let cylinder = &config.bodies[0].shape;

        assert!(out
            .populations
            .fluid
            .iter()
            .all(|r| !cylinder.is_inside(&r.position, config.sph.r0)));

        let full = sampler.fill(&config.fluid_region(), config.sph.deltap).len();
        assert!(out.populations.fluid.len() < full);
        assert_eq!(out.total(), out.populations.fluid.len() + out.objects[0].len());
    }

    #[test]
    fn bodies_that_do_not_unfill_leave_fluid_intact() {
        let sampler = LatticeSampler::default();
        let mut config = small_config();
        config.bodies[0].unfill_fluid = false;
        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        let full = sampler.fill(&config.fluid_region(), config.sph.deltap).len();
        assert_eq!(out.populations.fluid.len(), full);
    }

    #[test]
    fn obstacle_and_wet_region() {
        let sampler = LatticeSampler::default();
        let mut config = small_config();
        config.bodies.clear();
        config.telemetry.tracked_body = None;
        config.wet = true;
        config.wet_region = Some(Shape::cuboid(
            point![0.03, 0.03, 0.2],
            vector![0.24, 0.24, 0.06],
        ));
        let obstacle = Shape::cuboid(point![0.1, 0.1, 0.0], vector![0.1, 0.1, 0.4]);
        config.obstacle = Some(ObstacleConfig {
            shape: obstacle,
            particle_mass: MassConvention::Explicit { mass: 0.1 },
        });

        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        assert!(!out.populations.obstacle.is_empty());
        assert!(out
            .populations
            .fluid
            .iter()
            .all(|r| !obstacle.is_inside(&r.position, config.sph.r0)));
        assert!(out.populations.fluid.iter().any(|r| r.position.z > 0.19));
        assert_eq!(out.total(), out.populations.len());
    }

    #[test]
    fn wet_region_does_not_overlap_the_bulk() {
        let sampler = LatticeSampler::default();
        let mut config = small_config();
        let deltap = config.sph.deltap;
        let bulk = config.fluid_region();
        let dry = PopulationBuilder::new(&sampler).build(&config).unwrap();

        // Fully inside the bulk column: nothing to add.
        config.wet = true;
        config.wet_region = Some(Shape::cuboid(
            point![0.06, 0.06, 0.03],
            vector![0.18, 0.18, 0.06],
        ));
        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        assert_eq!(out.populations.fluid.len(), dry.populations.fluid.len());

        // Straddling the free surface: only the part above the bulk is added.
        config.wet_region = Some(Shape::cuboid(
            point![0.03, 0.03, 0.09],
            vector![0.24, 0.24, 0.15],
        ));
        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        let added = out.populations.fluid.len() - dry.populations.fluid.len();
        assert!(added > 0);
        let wet = &out.populations.fluid.records()[out.populations.fluid.len() - added..];
        assert!(wet.iter().all(|r| !bulk.is_inside(&r.position, 0.5 * deltap)));
    }

    #[test]
    fn object_masses_follow_descriptor() {
        let sampler = LatticeSampler::default();
        let mut config = small_config();
        config.bodies.push(RigidBodyDescriptor {
            name: "probe".into(),
            shape: Shape::cone(point![0.15, 0.15, 0.35], 0.0, 0.025, vector![0.0, 0.0, 0.1]),
            particle_mass: MassConvention::Explicit { mass: 1.0 },
            body_mass: 1.0,
            unfill_fluid: false,
        });
        let out = PopulationBuilder::new(&sampler).build(&config).unwrap();
        assert_eq!(out.objects.len(), 2);
        assert_eq!(out.objects[0].last_mass(), Some(5.0));
        assert_eq!(out.objects[1].last_mass(), Some(1.0));
    }
}
