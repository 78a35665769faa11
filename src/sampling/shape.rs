use crate::error::{Error, Result};
use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// Length threshold below which a shape dimension is considered degenerate.
const EPS: f32 = 1.0e-6;

/// Geometric descriptor of a particle source or a rigid body.
///
/// All shapes are positioned in world space. Cylinders and cones extend from `base` along
/// `height`; the radii are measured orthogonally to that axis.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Parallelepiped spanned by three orthogonal edges starting at `origin`.
    Cuboid {
        origin: Point3<f32>,
        edges: [Vector3<f32>; 3],
    },
    /// Right circular cylinder.
    Cylinder {
        base: Point3<f32>,
        radius: f32,
        height: Vector3<f32>,
    },
    /// Right circular (possibly truncated) cone. Either radius may be zero.
    Cone {
        base: Point3<f32>,
        bottom_radius: f32,
        top_radius: f32,
        height: Vector3<f32>,
    },
}

/// Orthonormal frame attached to the axis of a cylinder or cone.
#[derive(Copy, Clone, Debug)]
pub(crate) struct AxisFrame {
    pub axis: Vector3<f32>,
    pub u: Vector3<f32>,
    pub v: Vector3<f32>,
    pub length: f32,
}

impl AxisFrame {
    pub fn new(height: &Vector3<f32>) -> Self {
        let length = height.norm();
        let axis = if length > EPS {
            height / length
        } else {
            Vector3::z()
        };
        let helper = if axis.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = axis.cross(&helper).normalize();
        let v = axis.cross(&u);
        Self { axis, u, v, length }
    }

    /// Splits `rel` into its coordinate along the axis and its distance to the axis.
    pub fn project(&self, rel: &Vector3<f32>) -> (f32, f32) {
        let s = rel.dot(&self.axis);
        let radial = (rel - self.axis * s).norm();
        (s, radial)
    }
}

impl Shape {
    /// Axis-aligned box with its minimum corner at `origin`.
    pub fn cuboid(origin: Point3<f32>, size: Vector3<f32>) -> Self {
        Shape::Cuboid {
            origin,
            edges: [
                Vector3::x() * size.x,
                Vector3::y() * size.y,
                Vector3::z() * size.z,
            ],
        }
    }

    pub fn cylinder(base: Point3<f32>, radius: f32, height: Vector3<f32>) -> Self {
        Shape::Cylinder {
            base,
            radius,
            height,
        }
    }

    pub fn cone(
        base: Point3<f32>,
        bottom_radius: f32,
        top_radius: f32,
        height: Vector3<f32>,
    ) -> Self {
        Shape::Cone {
            base,
            bottom_radius,
            top_radius,
            height,
        }
    }

    /// Checks that the shape is non-degenerate.
    pub fn validate(&self) -> Result<()> {
        let finite = |v: &Vector3<f32>| v.iter().all(|e| e.is_finite());
        match self {
            Shape::Cuboid { origin, edges } => {
                if !finite(&origin.coords) || !edges.iter().all(finite) {
                    return Err(Error::InvalidParam("cuboid must be finite".into()));
                }
                if edges.iter().any(|e| e.norm() <= EPS) {
                    return Err(Error::InvalidParam("cuboid edges must be non-zero".into()));
                }
                for (i, j) in [(0, 1), (1, 2), (2, 0)] {
                    let cos = edges[i].dot(&edges[j]) / (edges[i].norm() * edges[j].norm());
                    if cos.abs() > 1.0e-4 {
                        return Err(Error::InvalidParam(
                            "cuboid edges must be mutually orthogonal".into(),
                        ));
                    }
                }
            }
            Shape::Cylinder {
                base,
                radius,
                height,
            } => {
                if !finite(&base.coords) || !finite(height) || !radius.is_finite() {
                    return Err(Error::InvalidParam("cylinder must be finite".into()));
                }
                if *radius <= 0.0 || height.norm() <= EPS {
                    return Err(Error::InvalidParam(
                        "cylinder radius and height must be > 0".into(),
                    ));
                }
            }
            Shape::Cone {
                base,
                bottom_radius,
                top_radius,
                height,
            } => {
                if !finite(&base.coords)
                    || !finite(height)
                    || !bottom_radius.is_finite()
                    || !top_radius.is_finite()
                {
                    return Err(Error::InvalidParam("cone must be finite".into()));
                }
                if *bottom_radius < 0.0
                    || *top_radius < 0.0
                    || bottom_radius.max(*top_radius) <= 0.0
                    || height.norm() <= EPS
                {
                    return Err(Error::InvalidParam(
                        "cone radii must be >= 0 (one of them > 0) and height > 0".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Center of mass of the shape, assuming a uniform density.
    pub fn centroid(&self) -> Point3<f32> {
        match self {
            Shape::Cuboid { origin, edges } => origin + (edges[0] + edges[1] + edges[2]) * 0.5,
            Shape::Cylinder { base, height, .. } => base + height * 0.5,
            Shape::Cone {
                base,
                bottom_radius: r0,
                top_radius: r1,
                height,
            } => {
                // Centroid of a frustum, measured from the bottom face.
                let denom = r0 * r0 + r0 * r1 + r1 * r1;
                let ratio = if denom > 0.0 {
                    (r0 * r0 + 2.0 * r0 * r1 + 3.0 * r1 * r1) / (4.0 * denom)
                } else {
                    0.5
                };
                base + height * ratio
            }
        }
    }

    pub fn volume(&self) -> f32 {
        match self {
            Shape::Cuboid { edges, .. } => edges[0].cross(&edges[1]).dot(&edges[2]).abs(),
            Shape::Cylinder { radius, height, .. } => {
                std::f32::consts::PI * radius * radius * height.norm()
            }
            Shape::Cone {
                bottom_radius: r0,
                top_radius: r1,
                height,
                ..
            } => std::f32::consts::PI * height.norm() * (r0 * r0 + r0 * r1 + r1 * r1) / 3.0,
        }
    }

    /// Is `pt` inside this shape grown by `margin` in every direction?
    pub fn is_inside(&self, pt: &Point3<f32>, margin: f32) -> bool {
        match self {
            Shape::Cuboid { origin, edges } => {
                let rel = pt - origin;
                edges.iter().all(|e| {
                    let len = e.norm();
                    let s = rel.dot(e) / len;
                    s >= -margin && s <= len + margin
                })
            }
            Shape::Cylinder {
                base,
                radius,
                height,
            } => {
                let frame = AxisFrame::new(height);
                let (s, radial) = frame.project(&(pt - base));
                s >= -margin && s <= frame.length + margin && radial <= radius + margin
            }
            Shape::Cone {
                base,
                bottom_radius,
                top_radius,
                height,
            } => {
                let frame = AxisFrame::new(height);
                let (s, radial) = frame.project(&(pt - base));
                if s < -margin || s > frame.length + margin {
                    return false;
                }
                let t = (s / frame.length).clamp(0.0, 1.0);
                let r = bottom_radius + (top_radius - bottom_radius) * t;
                radial <= r + margin
            }
        }
    }

    /// Rotation taking the canonical frame of the matching collision primitive to this shape.
    ///
    /// For cuboids, the local x, y, z axes follow the three edges. For cylinders and cones,
    /// the local y axis follows the height vector.
    pub fn orientation(&self) -> UnitQuaternion<f32> {
        match self {
            Shape::Cuboid { edges, .. } => {
                let basis = Matrix3::from_columns(&[
                    edges[0].normalize(),
                    edges[1].normalize(),
                    edges[2].normalize(),
                ]);
                UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(basis))
            }
            Shape::Cylinder { height, .. } | Shape::Cone { height, .. } => {
                let axis = height.normalize();
                UnitQuaternion::rotation_between(&Vector3::y(), &axis).unwrap_or_else(|| {
                    // `axis` is exactly opposite to y.
                    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::PI)
                })
            }
        }
    }

    pub(crate) fn axis_frame(&self) -> Option<AxisFrame> {
        match self {
            Shape::Cuboid { .. } => None,
            Shape::Cylinder { height, .. } | Shape::Cone { height, .. } => {
                Some(AxisFrame::new(height))
            }
        }
    }

    /// Vertices of a convex polyhedron approximating this shape, relative to its centroid.
    ///
    /// Used for shapes without an exact collision primitive (truncated cones).
    pub fn hull_points(&self, segments: usize) -> Vec<Point3<f32>> {
        let center = self.centroid();
        let segments = segments.max(3);
        let mut out = vec![];
        let push_ring = |out: &mut Vec<Point3<f32>>, c: Point3<f32>, frame: &AxisFrame, r: f32| {
            if r <= EPS {
                out.push(Point3::from(c - center));
                return;
            }
            for i in 0..segments {
                let theta = std::f32::consts::TAU * i as f32 / segments as f32;
                let pt = c + (frame.u * theta.cos() + frame.v * theta.sin()) * r;
                out.push(Point3::from(pt - center));
            }
        };

        match self {
            Shape::Cuboid { origin, edges } => {
                for i in 0..2 {
                    for j in 0..2 {
                        for k in 0..2 {
                            let pt = origin
                                + edges[0] * i as f32
                                + edges[1] * j as f32
                                + edges[2] * k as f32;
                            out.push(Point3::from(pt - center));
                        }
                    }
                }
            }
            Shape::Cylinder {
                base,
                radius,
                height,
            } => {
                let frame = AxisFrame::new(height);
                push_ring(&mut out, *base, &frame, *radius);
                push_ring(&mut out, base + height, &frame, *radius);
            }
            Shape::Cone {
                base,
                bottom_radius,
                top_radius,
                height,
            } => {
                let frame = AxisFrame::new(height);
                push_ring(&mut out, *base, &frame, *bottom_radius);
                push_ring(&mut out, base + height, &frame, *top_radius);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{point, vector};

    #[test]
    fn cuboid_inside_with_margin() {
        let cube = Shape::cuboid(point![0.0, 0.0, 0.0], vector![1.0, 2.0, 3.0]);
        assert!(cube.is_inside(&point![0.5, 1.0, 1.5], 0.0));
        assert!(!cube.is_inside(&point![1.05, 1.0, 1.5], 0.0));
        assert!(cube.is_inside(&point![1.05, 1.0, 1.5], 0.1));
        assert!(!cube.is_inside(&point![0.5, 1.0, -0.2], 0.1));
    }

    #[test]
    fn cylinder_inside_follows_axis() {
        let cyl = Shape::cylinder(point![0.5, 0.5, 2.0], 0.025, vector![0.0, 0.0, 0.5]);
        assert!(cyl.is_inside(&point![0.5, 0.5, 2.25], 0.0));
        assert!(cyl.is_inside(&point![0.52, 0.5, 2.49], 0.0));
        assert!(!cyl.is_inside(&point![0.5, 0.5, 1.9], 0.0));
        assert!(cyl.is_inside(&point![0.5, 0.5, 1.98], 0.03));
        assert!(!cyl.is_inside(&point![0.6, 0.5, 2.2], 0.03));
    }

    #[test]
    fn apex_down_cone_narrows_at_base() {
        let cone = Shape::cone(point![0.0, 0.0, 0.0], 0.0, 1.0, vector![0.0, 0.0, 1.0]);
        assert!(!cone.is_inside(&point![0.5, 0.0, 0.1], 0.0));
        assert!(cone.is_inside(&point![0.5, 0.0, 0.9], 0.0));
    }

    #[test]
    fn centroids_and_volumes() {
        let cube = Shape::cuboid(point![1.0, 1.0, 1.0], vector![2.0, 2.0, 2.0]);
        assert_relative_eq!(cube.centroid(), point![2.0, 2.0, 2.0]);
        assert_relative_eq!(cube.volume(), 8.0);

        // A full cone with its apex on top has its centroid at a quarter of its height.
        let cone = Shape::cone(point![0.0, 0.0, 0.0], 1.0, 0.0, vector![0.0, 0.0, 4.0]);
        assert_relative_eq!(cone.centroid(), point![0.0, 0.0, 1.0], epsilon = 1.0e-6);
        assert_relative_eq!(
            cone.volume(),
            std::f32::consts::PI * 4.0 / 3.0,
            epsilon = 1.0e-5
        );
    }

    #[test]
    fn orientation_maps_y_to_height() {
        let cyl = Shape::cylinder(point![0.0, 0.0, 0.0], 1.0, vector![0.0, 0.0, 2.0]);
        let rotated = cyl.orientation() * Vector3::y();
        assert_relative_eq!(rotated, Vector3::z(), epsilon = 1.0e-6);

        let flipped = Shape::cylinder(point![0.0, 0.0, 0.0], 1.0, vector![0.0, -1.0, 0.0]);
        let rotated = flipped.orientation() * Vector3::y();
        assert_relative_eq!(rotated, -Vector3::y(), epsilon = 1.0e-6);
    }

    #[test]
    fn degenerate_shapes_are_rejected() {
        let flat = Shape::cuboid(point![0.0, 0.0, 0.0], vector![1.0, 0.0, 1.0]);
        assert!(flat.validate().is_err());
        let skewed = Shape::Cuboid {
            origin: point![0.0, 0.0, 0.0],
            edges: [vector![1.0, 0.0, 0.0], vector![1.0, 1.0, 0.0], vector![0.0, 0.0, 1.0]],
        };
        assert!(skewed.validate().is_err());
        let pointless = Shape::cone(point![0.0, 0.0, 0.0], 0.0, 0.0, vector![0.0, 0.0, 1.0]);
        assert!(pointless.validate().is_err());
    }
}
