//! Ready-made scenarios: a cylinder (optionally with a probe cone) dropped into a fluid
//! column at rest.

use super::config::{DomainConfig, ScenarioConfig, SphParams, TelemetryConfig};
use crate::error::{Error, Result};
use crate::particles::MassConvention;
use crate::rigid::RigidBodyDescriptor;
use crate::sampling::Shape;
use crate::schedule::{GravitySchedule, ObservationWindow};
use nalgebra::{point, vector};

pub const NAMES: [&str; 3] = ["cylinder_fall", "gprobe_fall", "trial"];

pub fn by_name(name: &str) -> Result<ScenarioConfig> {
    match name {
        "cylinder_fall" => Ok(cylinder_fall()),
        "gprobe_fall" => Ok(gprobe_fall()),
        "trial" => Ok(trial()),
        _ => Err(Error::UnknownScenario(name.to_string())),
    }
}

fn cylinder(mass: f32) -> RigidBodyDescriptor {
    RigidBodyDescriptor {
        name: "cylinder".to_string(),
        shape: Shape::cylinder(point![0.5, 0.5, 2.0], 0.025, vector![0.0, 0.0, 0.5]),
        particle_mass: MassConvention::Explicit { mass },
        body_mass: mass,
        unfill_fluid: true,
    }
}

/// A 1x1x3 tank with 0.6 of fluid. The cylinder is held 2 units above the floor until
/// t = 15 and then falls; its vertical velocity and the fluid force on it are recorded
/// until t = 16.
pub fn cylinder_fall() -> ScenarioConfig {
    let (lx, ly, lz) = (1.0, 1.0, 3.0);
    let h = 0.6;
    let deltap = 0.03;
    let r0 = deltap;

    ScenarioConfig {
        name: "cylinder_fall".to_string(),
        domain: DomainConfig {
            origin: point![0.0, 0.0, 0.0],
            size: vector![lx, ly, lz],
        },
        sph: SphParams {
            deltap,
            r0,
            rho0: 1800.0,
            influence_factor: 2.6,
            dt: 1.0e-4,
        },
        end_time: 20.0,
        fluid_depth: h,
        wet: false,
        wet_region: Some(Shape::cuboid(
            point![h + deltap + r0, r0, r0],
            vector![lx - h - deltap - 2.0 * r0, 0.67 - 2.0 * r0, 0.1],
        )),
        use_planes: true,
        obstacle: None,
        bodies: vec![cylinder(5.0)],
        gravity: GravitySchedule {
            nominal: vector![0.0, 0.0, -9.81],
            release_time: 15.0,
            observation: Some(ObservationWindow {
                start: 15.0,
                end: 16.0,
            }),
            sample_step: 1.0e-4,
        },
        telemetry: TelemetryConfig {
            tracked_body: Some(0),
            velocity_axis: 2,
            record_force: true,
            path: None,
        },
        log_body_contacts: false,
    }
}

/// Same drop with a coarser fluid, a lighter cylinder, and an apex-down probe cone hanging
/// below it. The cone does not carve the fluid. Only the cylinder velocity is recorded.
pub fn gprobe_fall() -> ScenarioConfig {
    let mut config = cylinder_fall();
    config.name = "gprobe_fall".to_string();
    config.sph.deltap = 0.04;
    config.sph.r0 = 0.04;
    config.wet_region = None;
    config.bodies = vec![
        cylinder(4.5),
        RigidBodyDescriptor {
            name: "cone".to_string(),
            shape: Shape::cone(point![0.5, 0.5, 1.5], 0.0, 0.025, vector![0.0, 0.0, 0.1]),
            particle_mass: MassConvention::Explicit { mass: 1.0 },
            body_mass: 1.0,
            unfill_fluid: false,
        },
    ];
    config.telemetry.record_force = false;
    config.log_body_contacts = true;
    config
}

/// Fine-resolution drop of a heavier cylinder, falling from the start. No telemetry.
pub fn trial() -> ScenarioConfig {
    let mut config = cylinder_fall();
    let deltap = 0.01;
    config.name = "trial".to_string();
    config.sph.deltap = deltap;
    config.sph.r0 = deltap;
    config.end_time = 4.0;
    config.wet_region = Some(Shape::cuboid(
        point![0.6 + 2.0 * deltap, deltap, deltap],
        vector![1.0 - 0.6 - 3.0 * deltap, 0.67 - 2.0 * deltap, 0.1],
    ));
    config.bodies = vec![cylinder(8.3)];
    config.gravity = GravitySchedule::constant(vector![0.0, 0.0, -9.81]);
    config.telemetry.tracked_body = None;
    config.telemetry.record_force = false;
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_by_name() {
        for name in NAMES {
            assert_eq!(by_name(name).unwrap().name, name);
        }
        assert!(matches!(by_name("dam_break"), Err(Error::UnknownScenario(_))));
    }

    #[test]
    fn trial_releases_from_the_start() {
        let config = trial();
        assert_eq!(config.gravity.dynamics_gravity(0.0), config.gravity.nominal);
        assert!(config.gravity.observation.is_none());
        assert_eq!(config.num_steps(), 40_000);
    }

    #[test]
    fn gprobe_cone_keeps_the_fluid() {
        let config = gprobe_fall();
        assert_eq!(config.bodies.len(), 2);
        assert!(!config.bodies[1].unfill_fluid);
        assert_eq!(config.bodies[0].body_mass, 4.5);
    }
}
