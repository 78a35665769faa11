//! Candidate particle positions for simple shapes.
//!
//! A [`GeometryProvider`] turns a [`Shape`] and a particle spacing into a point set. It is
//! deterministic: the same inputs always give the same points in the same order.

pub use lattice::LatticeSampler;
pub use shape::Shape;

mod lattice;
mod shape;

use nalgebra::Point3;

/// Source of candidate particle positions for a shape.
pub trait GeometryProvider {
    /// Samples the whole volume of `shape` on a lattice with the given spacing.
    fn fill(&self, shape: &Shape, spacing: f32) -> Vec<Point3<f32>>;

    /// Samples the surface of `shape`.
    ///
    /// When `close_top` is false, the face at the end of the last edge (cuboids) or of the
    /// height vector (cylinders and cones) is left open. The rim of that face is still sampled.
    fn fill_border(&self, shape: &Shape, spacing: f32, close_top: bool) -> Vec<Point3<f32>>;

    /// Returns the points of `points` that are farther than `radius` from `exclusion`.
    fn unfill(&self, points: &[Point3<f32>], exclusion: &Shape, radius: f32) -> Vec<Point3<f32>> {
        points
            .iter()
            .filter(|pt| !exclusion.is_inside(pt, radius))
            .copied()
            .collect()
    }
}
