use super::shape::AxisFrame;
use super::{GeometryProvider, Shape};
use nalgebra::{Point3, Vector3};

/// Regular-lattice implementation of [`GeometryProvider`].
///
/// Cuboids are sampled on a grid aligned with their edges. Cylinders and cones are sampled
/// layer by layer along their axis: a clipped square lattice for volume fills, rings for
/// surfaces.
#[derive(Copy, Clone, Debug)]
pub struct LatticeSampler {
    /// Include the points lying exactly on the faces of the shape when filling volumes.
    pub fill_edges: bool,
}

impl Default for LatticeSampler {
    fn default() -> Self {
        Self { fill_edges: true }
    }
}

fn subdivisions(length: f32, spacing: f32) -> u32 {
    ((length / spacing).round() as u32).max(1)
}

fn radius_at(shape: &Shape, t: f32) -> f32 {
    match shape {
        Shape::Cylinder { radius, .. } => *radius,
        Shape::Cone {
            bottom_radius,
            top_radius,
            ..
        } => bottom_radius + (top_radius - bottom_radius) * t,
        Shape::Cuboid { .. } => 0.0,
    }
}

fn base_of(shape: &Shape) -> Point3<f32> {
    match shape {
        Shape::Cuboid { origin, .. } => *origin,
        Shape::Cylinder { base, .. } | Shape::Cone { base, .. } => *base,
    }
}

fn push_ring(
    out: &mut Vec<Point3<f32>>,
    center: Point3<f32>,
    frame: &AxisFrame,
    radius: f32,
    spacing: f32,
) {
    if radius < spacing * 0.5 {
        out.push(center);
        return;
    }

    let n = ((std::f32::consts::TAU * radius / spacing).ceil() as u32).max(3);
    for i in 0..n {
        let theta = std::f32::consts::TAU * i as f32 / n as f32;
        out.push(center + (frame.u * theta.cos() + frame.v * theta.sin()) * radius);
    }
}

/// Concentric rings covering a disk, outer ring excluded.
fn push_disk_interior(
    out: &mut Vec<Point3<f32>>,
    center: Point3<f32>,
    frame: &AxisFrame,
    radius: f32,
    spacing: f32,
) {
    let mut r = radius - spacing;
    while r >= spacing * 0.5 {
        push_ring(out, center, frame, r, spacing);
        r -= spacing;
    }
    if radius >= spacing * 0.5 {
        out.push(center);
    }
}

impl LatticeSampler {
    fn fill_cuboid(&self, origin: &Point3<f32>, edges: &[Vector3<f32>; 3], spacing: f32) -> Vec<Point3<f32>> {
        let n = edges.map(|e| subdivisions(e.norm(), spacing));
        let (lo, hi_excl) = if self.fill_edges { (0, 1) } else { (1, 0) };
        let mut out = vec![];

        for k in lo..n[2] + hi_excl {
            for j in lo..n[1] + hi_excl {
                for i in lo..n[0] + hi_excl {
                    out.push(
                        origin
                            + edges[0] * (i as f32 / n[0] as f32)
                            + edges[1] * (j as f32 / n[1] as f32)
                            + edges[2] * (k as f32 / n[2] as f32),
                    );
                }
            }
        }

        out
    }

    fn border_cuboid(
        &self,
        origin: &Point3<f32>,
        edges: &[Vector3<f32>; 3],
        spacing: f32,
        close_top: bool,
    ) -> Vec<Point3<f32>> {
        let n = edges.map(|e| subdivisions(e.norm(), spacing));
        let mut out = vec![];

        for k in 0..=n[2] {
            for j in 0..=n[1] {
                for i in 0..=n[0] {
                    let on_x = i == 0 || i == n[0];
                    let on_y = j == 0 || j == n[1];
                    let on_z = k == 0 || k == n[2];
                    if !(on_x || on_y || on_z) {
                        continue;
                    }
                    // Interior of the top face.
                    if !close_top && k == n[2] && !on_x && !on_y {
                        continue;
                    }
                    out.push(
                        origin
                            + edges[0] * (i as f32 / n[0] as f32)
                            + edges[1] * (j as f32 / n[1] as f32)
                            + edges[2] * (k as f32 / n[2] as f32),
                    );
                }
            }
        }

        out
    }

    fn fill_revolution(&self, shape: &Shape, frame: &AxisFrame, spacing: f32) -> Vec<Point3<f32>> {
        let base = base_of(shape);
        let nz = subdivisions(frame.length, spacing);
        let (lo, hi_excl) = if self.fill_edges { (0, 1) } else { (1, 0) };
        let mut out = vec![];

        for k in lo..nz + hi_excl {
            let t = k as f32 / nz as f32;
            let center = base + frame.axis * (t * frame.length);
            let r = radius_at(shape, t);
            let limit = if self.fill_edges { r } else { r - spacing * 0.5 };
            if limit < 0.0 {
                continue;
            }
            let m = (r / spacing).floor() as i32;
            for b in -m..=m {
                for a in -m..=m {
                    let offset = frame.u * (a as f32 * spacing) + frame.v * (b as f32 * spacing);
                    // Small tolerance so that lattice points on the rim are kept.
                    if offset.norm() <= limit + spacing * 1.0e-3 {
                        out.push(center + offset);
                    }
                }
            }
        }

        out
    }

    fn border_revolution(
        &self,
        shape: &Shape,
        frame: &AxisFrame,
        spacing: f32,
        close_top: bool,
    ) -> Vec<Point3<f32>> {
        let base = base_of(shape);
        let nz = subdivisions(frame.length, spacing);
        let mut out = vec![];

        for k in 0..=nz {
            let t = k as f32 / nz as f32;
            let center = base + frame.axis * (t * frame.length);
            let r = radius_at(shape, t);
            push_ring(&mut out, center, frame, r, spacing);

            if k == 0 || (k == nz && close_top) {
                push_disk_interior(&mut out, center, frame, r, spacing);
            }
        }

        out
    }
}

impl GeometryProvider for LatticeSampler {
    fn fill(&self, shape: &Shape, spacing: f32) -> Vec<Point3<f32>> {
        match shape {
            Shape::Cuboid { origin, edges } => self.fill_cuboid(origin, edges, spacing),
            Shape::Cylinder { .. } | Shape::Cone { .. } => match shape.axis_frame() {
                Some(frame) => self.fill_revolution(shape, &frame, spacing),
                None => vec![],
            },
        }
    }

    fn fill_border(&self, shape: &Shape, spacing: f32, close_top: bool) -> Vec<Point3<f32>> {
        match shape {
            Shape::Cuboid { origin, edges } => {
                self.border_cuboid(origin, edges, spacing, close_top)
            }
            Shape::Cylinder { .. } | Shape::Cone { .. } => match shape.axis_frame() {
                Some(frame) => self.border_revolution(shape, &frame, spacing, close_top),
                None => vec![],
            },
        }
    }
}
