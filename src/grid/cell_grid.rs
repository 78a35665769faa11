use crate::error::{Error, Result};
use nalgebra::{Point3, Vector3};

/// Axis-aligned uniform grid covering the simulation domain.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CellGrid {
    origin: Point3<f32>,
    cell_size: f32,
    dims: Vector3<u32>,
}

impl CellGrid {
    /// Grid with cubic cells of width `cell_size` covering the box `origin + [0, size]`.
    pub fn new(origin: Point3<f32>, size: Vector3<f32>, cell_size: f32) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::InvalidParam(format!(
                "grid cell size must be > 0, got {cell_size}"
            )));
        }
        if size.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(Error::InvalidParam(format!(
                "grid size must be > 0 along every axis, got {size:?}"
            )));
        }

        let dims = size.map(|e| ((e / cell_size).ceil() as u32).max(1));
        let num_cells = dims.iter().map(|d| *d as u64).product::<u64>();
        if num_cells > u32::MAX as u64 {
            return Err(Error::InvalidParam(format!(
                "{num_cells} grid cells do not fit in a 32-bit hash"
            )));
        }

        Ok(Self {
            origin,
            cell_size,
            dims,
        })
    }

    pub fn origin(&self) -> Point3<f32> {
        self.origin
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of cells along each axis.
    pub fn dims(&self) -> Vector3<u32> {
        self.dims
    }

    pub fn num_cells(&self) -> u32 {
        self.dims.x * self.dims.y * self.dims.z
    }

    /// Cell containing `pt`. Points outside of the grid are attached to the nearest border cell.
    pub fn cell_of(&self, pt: &Point3<f32>) -> Vector3<u32> {
        let rel = (pt - self.origin) / self.cell_size;
        Vector3::new(
            (rel.x.floor().max(0.0) as u32).min(self.dims.x - 1),
            (rel.y.floor().max(0.0) as u32).min(self.dims.y - 1),
            (rel.z.floor().max(0.0) as u32).min(self.dims.z - 1),
        )
    }

    pub fn hash(&self, cell: &Vector3<u32>) -> u32 {
        cell.x + self.dims.x * (cell.y + self.dims.y * cell.z)
    }

    pub fn unhash(&self, hash: u32) -> Vector3<u32> {
        let x = hash % self.dims.x;
        let yz = hash / self.dims.x;
        Vector3::new(x, yz % self.dims.y, yz / self.dims.y)
    }

    pub fn cell_center(&self, cell: &Vector3<u32>) -> Point3<f32> {
        self.origin + (cell.cast::<f32>() + Vector3::repeat(0.5)) * self.cell_size
    }

    /// Position of `pt` relative to the center of its cell, with `mass` in the 4th channel,
    /// and the hash of that cell.
    pub fn localize(&self, pt: &Point3<f32>, mass: f32) -> ([f32; 4], u32) {
        let cell = self.cell_of(pt);
        let local = pt - self.cell_center(&cell);
        ([local.x, local.y, local.z, mass], self.hash(&cell))
    }

    /// Inverse of [`Self::localize`].
    pub fn global_position(&self, local: &[f32; 4], hash: u32) -> Point3<f32> {
        self.cell_center(&self.unhash(hash)) + Vector3::new(local[0], local[1], local[2])
    }
}
