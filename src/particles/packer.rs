use super::{ParticleInfo, ParticleKind, Population, Populations};
use crate::error::{Error, Result};
use crate::grid::CellGrid;
use crate::rigid::RigidBodyRegistry;
use std::ops::Range;

/// Flat particle arrays consumed by the solver.
///
/// All four arrays have the same length; entry `i` of each describes the same particle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleBuffers {
    /// Position relative to the particle's cell, with the mass in the 4th channel.
    pub positions: Vec<[f32; 4]>,
    /// Hash of the cell containing the particle.
    pub hashes: Vec<u32>,
    /// Velocity, with the density in the 4th channel.
    pub velocities: Vec<[f32; 4]>,
    pub infos: Vec<ParticleInfo>,
}

impl ParticleBuffers {
    /// Zero-initialized buffers for `len` particles.
    pub fn with_len(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 4]; len],
            hashes: vec![0; len],
            velocities: vec![[0.0; 4]; len],
            infos: vec![ParticleInfo::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn is_consistent(&self) -> bool {
        let len = self.positions.len();
        self.hashes.len() == len && self.velocities.len() == len && self.infos.len() == len
    }

    pub fn positions_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn hashes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.hashes)
    }

    pub fn velocities_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.velocities)
    }

    pub fn infos_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.infos)
    }
}

/// Index ranges occupied by each population in the packed arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopulationRanges {
    pub boundary: Range<usize>,
    /// One range per rigid body, by registration index.
    pub objects: Vec<Range<usize>>,
    pub obstacle: Range<usize>,
    pub fluid: Range<usize>,
}

impl PopulationRanges {
    /// Number of packed particles.
    pub fn total(&self) -> usize {
        self.fluid.end
    }
}

/// Writes populations into [`ParticleBuffers`] in the solver's ordering.
pub struct BufferPacker<'a> {
    grid: &'a CellGrid,
    rest_density: f32,
}

impl<'a> BufferPacker<'a> {
    pub fn new(grid: &'a CellGrid, rest_density: f32) -> Self {
        Self { grid, rest_density }
    }

    /// Packs boundary, rigid-body objects (by registration index), obstacle and fluid
    /// particles, in that order, into `buffers`.
    ///
    /// `buffers` must have been allocated with the total particle count reported by the
    /// builder. Any difference with the number of particles actually written is an error.
    pub fn pack(
        &self,
        populations: &Populations,
        registry: &RigidBodyRegistry,
        buffers: &mut ParticleBuffers,
    ) -> Result<PopulationRanges> {
        let expected = buffers.len();
        let available = populations.len() + registry.num_particles();
        if available != expected || !buffers.is_consistent() {
            return Err(Error::CountMismatch {
                expected,
                written: available,
            });
        }

        let mut cursor = 0;
        let boundary = self.write(&populations.boundary, 0, buffers, &mut cursor);
        log::info!(
            "Boundary parts: {}, part mass: {:?}",
            populations.boundary.len(),
            populations.boundary.last_mass()
        );

        let mut objects = Vec::with_capacity(registry.count());
        for body in registry.iter() {
            let range = self.write(body.particles(), body.object_index(), buffers, &mut cursor);
            log::info!(
                "Rigid body {} ({}): {} particles, part mass: {:?}",
                body.object_index(),
                body.name(),
                body.particles().len(),
                body.particles().last_mass()
            );
            objects.push(range);
        }

        let obstacle = self.write(&populations.obstacle, 0, buffers, &mut cursor);
        log::info!(
            "Obstacle parts: {}, part mass: {:?}",
            populations.obstacle.len(),
            populations.obstacle.last_mass()
        );

        let fluid = self.write(&populations.fluid, 0, buffers, &mut cursor);
        log::info!(
            "Fluid parts: {}, part mass: {:?}",
            populations.fluid.len(),
            populations.fluid.last_mass()
        );

        if cursor != expected {
            return Err(Error::CountMismatch {
                expected,
                written: cursor,
            });
        }

        Ok(PopulationRanges {
            boundary,
            objects,
            obstacle,
            fluid,
        })
    }

    fn write(
        &self,
        population: &Population,
        object: u16,
        buffers: &mut ParticleBuffers,
        cursor: &mut usize,
    ) -> Range<usize> {
        let start = *cursor;
        let object = if population.kind() == ParticleKind::ObjectPart {
            object
        } else {
            0
        };

        for (local_id, record) in population.iter().enumerate() {
            let i = start + local_id;
            let (pos, hash) = self.grid.localize(&record.position, record.mass);
            buffers.positions[i] = pos;
            buffers.hashes[i] = hash;
            buffers.velocities[i] = [0.0, 0.0, 0.0, self.rest_density];
            buffers.infos[i] = ParticleInfo::new(population.kind(), object, local_id as u32);
        }

        *cursor = start + population.len();
        start..*cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid::RigidWorld;
    use nalgebra::{point, vector};

    fn grid() -> CellGrid {
        CellGrid::new(point![0.0, 0.0, 0.0], vector![1.0, 1.0, 1.0], 0.1).unwrap()
    }

    fn populations() -> Populations {
        let mut pops = Populations::default();
        pops.boundary
            .extend_from_points([point![0.0, 0.0, 0.0], point![1.0, 0.0, 0.0]], 0.2);
        pops.obstacle.extend_from_points([point![0.5, 0.5, 0.9]], 0.3);
        pops.fluid.extend_from_points(
            [point![0.3, 0.3, 0.3], point![0.4, 0.3, 0.3], point![0.5, 0.3, 0.3]],
            0.1,
        );
        pops
    }

    #[test]
    fn packs_in_fixed_order() {
        let grid = grid();
        let pops = populations();
        let registry = RigidBodyRegistry::default();
        let mut buffers = ParticleBuffers::with_len(6);

        let ranges = BufferPacker::new(&grid, 1000.0)
            .pack(&pops, &registry, &mut buffers)
            .unwrap();

        assert_eq!(ranges.boundary, 0..2);
        assert!(ranges.objects.is_empty());
        assert_eq!(ranges.obstacle, 2..3);
        assert_eq!(ranges.fluid, 3..6);
        assert_eq!(ranges.total(), 6);

        let kinds: Vec<_> = buffers.infos.iter().map(|i| i.kind().unwrap()).collect();
        assert_eq!(
            kinds,
            [
                ParticleKind::Boundary,
                ParticleKind::Boundary,
                ParticleKind::Obstacle,
                ParticleKind::Fluid,
                ParticleKind::Fluid,
                ParticleKind::Fluid,
            ]
        );
        let ids: Vec<_> = buffers.infos.iter().map(|i| i.id).collect();
        assert_eq!(ids, [0, 1, 0, 0, 1, 2]);
        assert!(buffers.infos.iter().all(|i| i.object == 0));
        assert!(buffers
            .velocities
            .iter()
            .all(|v| *v == [0.0, 0.0, 0.0, 1000.0]));
        assert_eq!(buffers.positions[2][3], 0.3);

        let p = grid.global_position(&buffers.positions[4], buffers.hashes[4]);
        approx::assert_relative_eq!(p, point![0.4, 0.3, 0.3], epsilon = 1.0e-5);
    }

    #[test]
    fn count_mismatch_is_fatal() {
        let grid = grid();
        let pops = populations();
        let registry = RigidBodyRegistry::default();
        let mut buffers = ParticleBuffers::with_len(5);

        let err = BufferPacker::new(&grid, 1000.0)
            .pack(&pops, &registry, &mut buffers)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::CountMismatch {
                expected: 5,
                written: 6
            }
        ));
    }

    #[test]
    fn object_particles_follow_registration_order() {
        use crate::particles::MassConvention;
        use crate::rigid::RigidBodyDescriptor;
        use crate::sampling::Shape;

        let grid = grid();
        let pops = populations();
        let mut world = RigidWorld::new(1.0e-4).unwrap();
        let mut registry = RigidBodyRegistry::default();

        for (k, n) in [3usize, 2].into_iter().enumerate() {
            let desc = RigidBodyDescriptor {
                name: format!("body{k}"),
                shape: Shape::cylinder(
                    point![0.2 + 0.3 * k as f32, 0.5, 0.5],
                    0.05,
                    vector![0.0, 0.0, 0.2],
                ),
                particle_mass: MassConvention::Explicit { mass: 1.0 },
                body_mass: 1.0,
                unfill_fluid: true,
            };
            let mut particles = Population::new(ParticleKind::ObjectPart);
            particles.extend_from_points(
                (0..n).map(|i| point![0.2 + 0.3 * k as f32, 0.5, 0.5 + 0.01 * i as f32]),
                1.0,
            );
            assert_eq!(registry.register(&mut world, &desc, particles).unwrap(), k);
        }

        let mut buffers = ParticleBuffers::with_len(11);
        let ranges = BufferPacker::new(&grid, 1000.0)
            .pack(&pops, &registry, &mut buffers)
            .unwrap();

        assert_eq!(ranges.objects, vec![2..5, 5..7]);
        assert_eq!(ranges.obstacle, 7..8);
        assert_eq!(ranges.fluid, 8..11);
        for (k, range) in ranges.objects.iter().enumerate() {
            for (local, i) in range.clone().enumerate() {
                let info = buffers.infos[i];
                assert_eq!(info.kind(), Some(ParticleKind::ObjectPart));
                assert_eq!(info.object as usize, k);
                assert_eq!(info.id as usize, local);
            }
        }
    }
}
