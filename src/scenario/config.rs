use crate::error::{Error, Result};
use crate::particles::MassConvention;
use crate::rigid::RigidBodyDescriptor;
use crate::sampling::Shape;
use crate::schedule::GravitySchedule;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Axis-aligned simulation domain.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub origin: Point3<f32>,
    pub size: Vector3<f32>,
}

/// Discretization parameters of the fluid solver.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SphParams {
    /// Fluid particle spacing.
    pub deltap: f32,
    /// Boundary particle spacing.
    pub r0: f32,
    /// Rest density of the fluid.
    pub rho0: f32,
    /// Width of a hash cell, as a multiple of `deltap`.
    pub influence_factor: f32,
    /// Time step.
    pub dt: f32,
}

/// A static obstacle made of boundary-like particles.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub shape: Shape,
    pub particle_mass: MassConvention,
}

/// Which body is observed and where its telemetry goes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Object index of the observed body.
    pub tracked_body: Option<usize>,
    /// Component (0, 1, 2 for x, y, z) of the linear velocity to record.
    pub velocity_axis: usize,
    /// Also record the net fluid force on the body.
    pub record_force: bool,
    /// Telemetry file. No telemetry is written if `None`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Everything needed to assemble a fluid/rigid-body scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub domain: DomainConfig,
    pub sph: SphParams,
    /// Simulated duration.
    pub end_time: f32,
    /// Depth of the initial fluid column.
    pub fluid_depth: f32,
    /// Add the fluid of `wet_region` at start.
    pub wet: bool,
    #[serde(default)]
    pub wet_region: Option<Shape>,
    /// Represent the floor and side walls by planes instead of boundary particles.
    pub use_planes: bool,
    #[serde(default)]
    pub obstacle: Option<ObstacleConfig>,
    /// Rigid bodies, in registration order.
    pub bodies: Vec<RigidBodyDescriptor>,
    pub gravity: GravitySchedule,
    pub telemetry: TelemetryConfig,
    /// Log the contact count of every body/body collision.
    #[serde(default)]
    pub log_body_contacts: bool,
}

fn positive(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParam(format!("{name} must be > 0, got {value}")))
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        positive("sph.deltap", self.sph.deltap)?;
        positive("sph.r0", self.sph.r0)?;
        positive("sph.rho0", self.sph.rho0)?;
        positive("sph.influence_factor", self.sph.influence_factor)?;
        positive("sph.dt", self.sph.dt)?;
        positive("end_time", self.end_time)?;
        for (axis, size) in ["x", "y", "z"].iter().zip(self.domain.size.iter()) {
            positive(&format!("domain.size.{axis}"), *size)?;
        }
        if !self.domain.origin.coords.iter().all(|e| e.is_finite()) {
            return Err(Error::InvalidParam("domain origin must be finite".into()));
        }

        let r0 = self.sph.r0;
        positive("fluid_depth - r0", self.fluid_depth - r0)?;
        positive("domain.size.x - 2 r0", self.domain.size.x - 2.0 * r0)?;
        positive("domain.size.y - 2 r0", self.domain.size.y - 2.0 * r0)?;
        if self.fluid_depth > self.domain.size.z {
            return Err(Error::InvalidParam(format!(
                "fluid depth {} exceeds the domain height {}",
                self.fluid_depth, self.domain.size.z
            )));
        }

        if let Some(region) = &self.wet_region {
            region.validate()?;
        }
        if let Some(obstacle) = &self.obstacle {
            obstacle.shape.validate()?;
            obstacle.particle_mass.validate()?;
        }
        for body in &self.bodies {
            body.shape.validate()?;
            body.particle_mass.validate()?;
            positive(&format!("{}.body_mass", body.name), body.body_mass)?;
        }
        if self.bodies.len() > u16::MAX as usize {
            return Err(Error::InvalidParam(format!(
                "{} rigid bodies exceed the maximum of {}",
                self.bodies.len(),
                u16::MAX
            )));
        }

        self.gravity.validate()?;
        if let Some(tracked) = self.telemetry.tracked_body {
            if tracked >= self.bodies.len() {
                return Err(Error::InvalidParam(format!(
                    "tracked body {tracked} out of range ({} bodies)",
                    self.bodies.len()
                )));
            }
        }
        if self.telemetry.velocity_axis > 2 {
            return Err(Error::InvalidParam(format!(
                "velocity axis must be 0, 1 or 2, got {}",
                self.telemetry.velocity_axis
            )));
        }

        Ok(())
    }

    /// The whole domain, as a box.
    pub fn boundary_box(&self) -> Shape {
        Shape::cuboid(self.domain.origin, self.domain.size)
    }

    /// Initial fluid column, one boundary spacing away from the walls and the floor.
    pub fn fluid_region(&self) -> Shape {
        let r0 = self.sph.r0;
        let size = self.domain.size;
        Shape::cuboid(
            self.domain.origin + Vector3::repeat(r0),
            Vector3::new(size.x - 2.0 * r0, size.y - 2.0 * r0, self.fluid_depth - r0),
        )
    }

    pub fn boundary_mass(&self) -> MassConvention {
        MassConvention::Spacing {
            spacing: self.sph.r0,
            density: self.sph.rho0,
        }
    }

    pub fn fluid_mass(&self) -> MassConvention {
        MassConvention::Spacing {
            spacing: self.sph.deltap,
            density: self.sph.rho0,
        }
    }

    /// Width of the cells used to hash particle positions.
    pub fn cell_size(&self) -> f32 {
        self.sph.influence_factor * self.sph.deltap
    }

    /// Number of solver steps of duration `dt` in `end_time`.
    pub fn num_steps(&self) -> usize {
        (self.end_time / self.sph.dt).round() as usize
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::presets;

    #[test]
    fn presets_are_valid() {
        for config in [presets::cylinder_fall(), presets::gprobe_fall(), presets::trial()] {
            config.validate().unwrap();
        }
    }

    #[test]
    fn json_roundtrip_preserves_config() -> Result<()> {
        let config = presets::gprobe_fall();
        let json = config.to_json_string()?;
        assert_eq!(ScenarioConfig::from_json_str(&json)?, config);

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("gprobe.json");
        config.save_json(&path)?;
        assert_eq!(ScenarioConfig::load_json(&path)?, config);
        Ok(())
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut config = presets::cylinder_fall();
        config.sph.deltap = 0.0;
        assert!(matches!(config.validate(), Err(Error::InvalidParam(_))));

        let mut config = presets::cylinder_fall();
        config.telemetry.tracked_body = Some(1);
        assert!(config.validate().is_err());

        let mut config = presets::cylinder_fall();
        config.bodies[0].body_mass = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = presets::cylinder_fall();
        config.fluid_depth = 4.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            ScenarioConfig::from_json_str("{\"name\": 3}"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn fluid_region_is_inset_by_r0() {
        let config = presets::cylinder_fall();
        match config.fluid_region() {
            Shape::Cuboid { origin, edges } => {
                assert_eq!(origin, Point3::new(0.03, 0.03, 0.03));
                approx::assert_relative_eq!(edges[0].x, 0.94, epsilon = 1.0e-6);
                approx::assert_relative_eq!(edges[2].z, 0.57, epsilon = 1.0e-6);
            }
            other => panic!("unexpected fluid region {other:?}"),
        }
    }
}
