//! Particle populations and their packing into flat solver arrays.
//!
//! - [`PopulationBuilder`] samples the boundary, obstacle, fluid and per-body populations and
//!   applies the exclusion rules between them.
//! - [`BufferPacker`] copies the populations into [`ParticleBuffers`] following a fixed
//!   ordering: boundary, objects (by registration index), obstacle, fluid.

pub use builder::{BuildOutput, PopulationBuilder};
pub use packer::{BufferPacker, ParticleBuffers, PopulationRanges};

mod builder;
mod packer;

use crate::error::{Error, Result};
use crate::sampling::{GeometryProvider, Shape};
use bytemuck::{Pod, Zeroable};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Physical role of a particle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ParticleKind {
    Fluid = 0,
    Boundary = 1,
    /// Surface particle of a dynamically-coupled rigid body.
    ObjectPart = 2,
    Obstacle = 3,
}

impl ParticleKind {
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Fluid),
            1 => Some(Self::Boundary),
            2 => Some(Self::ObjectPart),
            3 => Some(Self::Obstacle),
            _ => None,
        }
    }
}

/// Per-particle metadata, as read by the solver.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ParticleInfo {
    /// A [`ParticleKind`] discriminant.
    pub kind: u16,
    /// Registration index of the owning rigid body. Only meaningful for
    /// [`ParticleKind::ObjectPart`], zero otherwise.
    pub object: u16,
    /// Index of the particle within its source population.
    pub id: u32,
}

impl ParticleInfo {
    pub fn new(kind: ParticleKind, object: u16, id: u32) -> Self {
        Self {
            kind: kind as u16,
            object,
            id,
        }
    }

    pub fn kind(&self) -> Option<ParticleKind> {
        ParticleKind::from_raw(self.kind)
    }
}

/// How the mass of each particle of a population is derived.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MassConvention {
    /// Mass of a cubic cell of side `spacing` filled at `density`.
    Spacing { spacing: f32, density: f32 },
    /// Same mass given explicitly for every particle.
    Explicit { mass: f32 },
}

impl MassConvention {
    pub fn particle_mass(&self) -> f32 {
        match self {
            MassConvention::Spacing { spacing, density } => spacing.powi(3) * density,
            MassConvention::Explicit { mass } => *mass,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mass = self.particle_mass();
        if mass.is_finite() && mass > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidParam(format!(
                "particle mass must be > 0, got {mass} from {self:?}"
            )))
        }
    }
}

/// A sampled particle before packing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleRecord {
    pub position: Point3<f32>,
    pub mass: f32,
}

/// Ordered group of particles sharing a physical role.
#[derive(Clone, Debug, PartialEq)]
pub struct Population {
    kind: ParticleKind,
    records: Vec<ParticleRecord>,
}

impl Population {
    pub fn new(kind: ParticleKind) -> Self {
        Self {
            kind,
            records: vec![],
        }
    }

    pub fn kind(&self) -> ParticleKind {
        self.kind
    }

    /// Appends `points`, all with the same `mass`.
    pub fn extend_from_points(&mut self, points: impl IntoIterator<Item = Point3<f32>>, mass: f32) {
        self.records.extend(
            points
                .into_iter()
                .map(|position| ParticleRecord { position, mass }),
        );
    }

    /// Removes every particle within `radius` of `exclusion`. Returns the number of removed
    /// particles.
    ///
    /// Order of the remaining particles is preserved.
    pub fn unfill(
        &mut self,
        provider: &impl GeometryProvider,
        exclusion: &Shape,
        radius: f32,
    ) -> usize {
        let points: Vec<_> = self.records.iter().map(|r| r.position).collect();
        let kept = provider.unfill(&points, exclusion, radius);
        if kept.len() == points.len() {
            return 0;
        }

        // The provider returns the surviving points in order, so a single merge pass
        // recovers their masses.
        let before = self.records.len();
        let mut kept = kept.into_iter().peekable();
        self.records.retain(|r| {
            if kept.peek() == Some(&r.position) {
                let _ = kept.next();
                true
            } else {
                false
            }
        });
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ParticleRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticleRecord> {
        self.records.iter()
    }

    /// Mass of the last particle, used for diagnostics.
    pub fn last_mass(&self) -> Option<f32> {
        self.records.last().map(|r| r.mass)
    }
}

/// The populations that are not attached to a rigid body.
#[derive(Clone, Debug, PartialEq)]
pub struct Populations {
    pub boundary: Population,
    pub obstacle: Population,
    pub fluid: Population,
}

impl Default for Populations {
    fn default() -> Self {
        Self {
            boundary: Population::new(ParticleKind::Boundary),
            obstacle: Population::new(ParticleKind::Obstacle),
            fluid: Population::new(ParticleKind::Fluid),
        }
    }
}

impl Populations {
    pub fn len(&self) -> usize {
        self.boundary.len() + self.obstacle.len() + self.fluid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::LatticeSampler;
    use nalgebra::{point, vector};

    #[test]
    fn spacing_mass_convention() {
        let m = MassConvention::Spacing {
            spacing: 0.03,
            density: 1800.0,
        };
        approx::assert_relative_eq!(m.particle_mass(), 0.0486, epsilon = 1.0e-6);
        assert!(MassConvention::Explicit { mass: 0.0 }.validate().is_err());
    }

    #[test]
    fn particle_info_layout() {
        assert_eq!(std::mem::size_of::<ParticleInfo>(), 8);
        let info = ParticleInfo::new(ParticleKind::ObjectPart, 3, 42);
        assert_eq!(info.kind(), Some(ParticleKind::ObjectPart));
        assert_eq!(bytemuck::bytes_of(&info).len(), 8);
    }

    #[test]
    fn unfill_keeps_order_and_masses() {
        let sampler = LatticeSampler::default();
        let mut pop = Population::new(ParticleKind::Fluid);
        let pts = sampler.fill(
            &Shape::cuboid(point![0.0, 0.0, 0.0], vector![1.0, 1.0, 0.2]),
            0.1,
        );
        pop.extend_from_points(pts.iter().copied(), 1.5);
        let before = pop.len();

        let cyl = Shape::cylinder(point![0.5, 0.5, 0.0], 0.15, vector![0.0, 0.0, 0.2]);
        let removed = pop.unfill(&sampler, &cyl, 0.05);

        assert!(removed > 0);
        assert_eq!(pop.len() + removed, before);
        assert!(pop.iter().all(|r| r.mass == 1.5));
        assert!(pop.iter().all(|r| !cyl.is_inside(&r.position, 0.05)));
        let expected: Vec<_> = pts
            .into_iter()
            .filter(|p| !cyl.is_inside(p, 0.05))
            .collect();
        let got: Vec<_> = pop.iter().map(|r| r.position).collect();
        assert_eq!(got, expected);
    }
}
