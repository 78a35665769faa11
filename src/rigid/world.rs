use super::contacts::{ContactGroup, ContactSynthesizer};
use super::hooks::ContactHooks;
use crate::error::{Error, Result};
use crate::sampling::Shape;
use crate::schedule::DynamicsGravity;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};
use rapier3d::prelude::{
    ActiveHooks, CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet, DefaultBroadPhase, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};

// Number of segments of the polygons approximating the caps of a cone.
const CONE_HULL_SEGMENTS: usize = 16;

/// An infinite plane `normal · x = offset`. The fluid and the bodies live on the side the
/// normal points to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StaticPlane {
    pub normal: Vector3<f32>,
    pub offset: f32,
}

/// Plane record read by the SPH solver: `plane.xyz · x + plane.w = 0`, with a divisor.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SolverPlane {
    pub plane: [f32; 4],
    pub div: f32,
}

impl StaticPlane {
    pub fn new(normal: Vector3<f32>, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// Floor and side walls of a box domain, in that order: floor, x-near, x-far, y-near,
    /// y-far. The top stays open.
    ///
    /// The solver planes use this same order, so that plane `i` of the solver is static
    /// collider `i`. Solvers expecting the y walls before the x walls must reorder them.
    pub fn domain_walls(origin: Point3<f32>, size: Vector3<f32>) -> [StaticPlane; 5] {
        let far = origin + size;
        [
            StaticPlane::new(Vector3::z(), origin.z),
            StaticPlane::new(Vector3::x(), origin.x),
            StaticPlane::new(-Vector3::x(), -far.x),
            StaticPlane::new(Vector3::y(), origin.y),
            StaticPlane::new(-Vector3::y(), -far.y),
        ]
    }

    pub fn to_solver(&self) -> SolverPlane {
        let n = self.normal;
        SolverPlane {
            plane: [n.x, n.y, n.z, -self.offset],
            div: 1.0,
        }
    }

    /// Signed distance from `pt` to the plane, positive on the normal side.
    pub fn distance(&self, pt: &Point3<f32>) -> f32 {
        self.normal.dot(&pt.coords) - self.offset
    }
}

/// Rapier world holding the rigid bodies and the static collision geometry.
pub struct RigidWorld {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub impulse_joints: ImpulseJointSet,
    pub multibody_joints: MultibodyJointSet,
    pub params: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub narrow_phase: NarrowPhase,
    pub broad_phase: DefaultBroadPhase,
    pub ccd_solver: CCDSolver,
    pub islands: IslandManager,
    gravity: Vector3<f32>,
    hooks: ContactHooks,
    static_geometry: Vec<ColliderHandle>,
    static_installed: bool,
}

impl RigidWorld {
    /// Empty world stepped with the time step `dt` and zero gravity.
    pub fn new(dt: f32) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(Error::WorldInit(format!("time step must be > 0, got {dt}")));
        }

        let params = IntegrationParameters {
            dt,
            ..Default::default()
        };

        Ok(Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            params,
            physics_pipeline: PhysicsPipeline::new(),
            narrow_phase: NarrowPhase::new(),
            broad_phase: DefaultBroadPhase::new(),
            ccd_solver: CCDSolver::new(),
            islands: IslandManager::new(),
            gravity: Vector3::zeros(),
            hooks: ContactHooks::default(),
            static_geometry: vec![],
            static_installed: false,
        })
    }

    /// Synthesizer applied to the solver contacts of every step.
    pub fn synthesizer_mut(&mut self) -> &mut ContactSynthesizer {
        self.hooks.synthesizer_mut()
    }

    pub fn set_synthesizer(&mut self, synthesizer: ContactSynthesizer) {
        *self.hooks.synthesizer_mut() = synthesizer;
    }

    pub fn dt(&self) -> f32 {
        self.params.dt
    }

    /// Inserts the static half-spaces. This can only be done once.
    pub fn install_static_planes(&mut self, planes: &[StaticPlane]) -> Result<()> {
        if self.static_installed {
            return Err(Error::StaticGeometryFrozen);
        }

        for plane in planes {
            let normal = Unit::try_new(plane.normal, 1.0e-6).ok_or_else(|| {
                Error::InvalidParam(format!("static plane normal is zero: {plane:?}"))
            })?;
            let co = ColliderBuilder::halfspace(normal)
                .translation(normal.into_inner() * plane.offset)
                .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
                .build();
            self.static_geometry.push(self.colliders.insert(co));
        }

        self.static_installed = true;
        Ok(())
    }

    /// Static collision geometry, in installation order.
    pub fn static_geometry(&self) -> &[ColliderHandle] {
        &self.static_geometry
    }

    /// Creates a dynamic body with mass `mass` and the collision geometry of `shape`.
    ///
    /// The body frame is centered on the shape's centroid.
    pub fn create_body(
        &mut self,
        name: &str,
        shape: &Shape,
        mass: f32,
    ) -> Result<(RigidBodyHandle, ColliderHandle)> {
        shape.validate().map_err(|_| Error::GeometryCreation {
            name: name.to_string(),
        })?;
        if !(mass.is_finite() && mass > 0.0) {
            return Err(Error::BodyCreation {
                name: name.to_string(),
                reason: format!("mass must be > 0, got {mass}"),
            });
        }

        let (rotation, builder) = match shape {
            Shape::Cuboid { edges, .. } => (
                shape.orientation(),
                ColliderBuilder::cuboid(
                    edges[0].norm() / 2.0,
                    edges[1].norm() / 2.0,
                    edges[2].norm() / 2.0,
                ),
            ),
            Shape::Cylinder { radius, height, .. } => (
                shape.orientation(),
                ColliderBuilder::cylinder(height.norm() / 2.0, *radius),
            ),
            Shape::Cone { .. } => {
                let pts = shape.hull_points(CONE_HULL_SEGMENTS);
                let builder =
                    ColliderBuilder::convex_hull(&pts).ok_or_else(|| Error::GeometryCreation {
                        name: name.to_string(),
                    })?;
                (UnitQuaternion::identity(), builder)
            }
        };

        let pose = Isometry3::from_parts(Translation3::from(shape.centroid().coords), rotation);
        let rb = RigidBodyBuilder::dynamic().position(pose).build();
        let co = builder
            .mass(mass)
            .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS)
            .build();

        let body = self.bodies.insert(rb);
        let collider = self
            .colliders
            .insert_with_parent(co, body, &mut self.bodies);
        log::debug!("created body `{name}` ({body:?}, collider {collider:?})");
        Ok((body, collider))
    }

    /// Advances the rigid bodies by one time step. The contacts of the step go through the
    /// contact synthesizer before reaching the solver.
    pub fn step(&mut self) {
        self.hooks.begin_step();
        self.physics_pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &self.hooks,
            &(),
        );
    }

    /// Contact constraints created during the last step.
    pub fn take_contacts(&mut self) -> ContactGroup<RigidBodyHandle> {
        self.hooks.take_contacts()
    }

    pub fn gravity(&self) -> Vector3<f32> {
        self.gravity
    }

    pub fn body_pose(&self, body: RigidBodyHandle) -> Option<Isometry3<f32>> {
        self.bodies.get(body).map(|rb| *rb.position())
    }

    pub fn body_linvel(&self, body: RigidBodyHandle) -> Option<Vector3<f32>> {
        self.bodies.get(body).map(|rb| *rb.linvel())
    }
}

impl DynamicsGravity for RigidWorld {
    type Body = RigidBodyHandle;

    fn set_gravity(&mut self, gravity: Vector3<f32>) {
        self.gravity = gravity;
    }

    fn linear_velocity(&self, body: RigidBodyHandle) -> Option<Vector3<f32>> {
        self.body_linvel(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid::{ContactSynthesizer, SurfaceParams};
    use approx::assert_relative_eq;
    use nalgebra::{point, vector};

    #[test]
    fn invalid_time_step_is_rejected() {
        assert!(matches!(RigidWorld::new(0.0), Err(Error::WorldInit(_))));
        assert!(matches!(RigidWorld::new(f32::NAN), Err(Error::WorldInit(_))));
    }

    #[test]
    fn domain_walls_face_inward() {
        let walls = StaticPlane::domain_walls(point![0.0, 0.0, 0.0], vector![1.0, 1.0, 3.0]);
        let inside = point![0.5, 0.5, 1.0];
        assert!(walls.iter().all(|w| w.distance(&inside) > 0.0));
        assert_eq!(walls[2].to_solver().plane, [-1.0, 0.0, 0.0, 1.0]);
        assert_eq!(walls[0].to_solver().plane, [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(walls[4].to_solver().div, 1.0);
    }

    #[test]
    fn static_planes_are_installed_once() {
        let mut world = RigidWorld::new(1.0e-3).unwrap();
        let walls = StaticPlane::domain_walls(point![0.0, 0.0, 0.0], vector![1.0, 1.0, 3.0]);
        world.install_static_planes(&walls).unwrap();
        assert_eq!(world.static_geometry().len(), 5);
        assert!(matches!(
            world.install_static_planes(&walls),
            Err(Error::StaticGeometryFrozen)
        ));
        assert_eq!(world.static_geometry().len(), 5);
        assert!(world
            .static_geometry()
            .iter()
            .all(|h| world.colliders[*h].parent().is_none()));
    }

    #[test]
    fn bodies_are_centered_on_their_centroid() {
        let mut world = RigidWorld::new(1.0e-3).unwrap();
        let cyl = Shape::cylinder(point![0.5, 0.5, 2.0], 0.025, vector![0.0, 0.0, 0.5]);
        let (body, collider) = world.create_body("cylinder", &cyl, 5.0).unwrap();

        let pose = world.body_pose(body).unwrap();
        assert_relative_eq!(pose.translation.vector, vector![0.5, 0.5, 2.25], epsilon = 1.0e-6);
        assert_relative_eq!(world.bodies[body].mass(), 5.0, epsilon = 1.0e-4);
        assert_eq!(world.colliders[collider].parent(), Some(body));

        let cone = Shape::cone(point![0.5, 0.5, 1.5], 0.0, 0.025, vector![0.0, 0.0, 0.1]);
        assert!(world.create_body("cone", &cone, 1.0).is_ok());
    }

    #[test]
    fn invalid_bodies_are_rejected() {
        let mut world = RigidWorld::new(1.0e-3).unwrap();
        let cyl = Shape::cylinder(point![0.5, 0.5, 2.0], 0.025, vector![0.0, 0.0, 0.5]);
        assert!(matches!(
            world.create_body("heavy", &cyl, -1.0),
            Err(Error::BodyCreation { .. })
        ));
        let flat = Shape::cylinder(point![0.5, 0.5, 2.0], 0.0, vector![0.0, 0.0, 0.5]);
        assert!(matches!(
            world.create_body("flat", &flat, 1.0),
            Err(Error::GeometryCreation { .. })
        ));
    }

    #[test]
    fn gravity_moves_bodies_only_when_set() {
        let mut world = RigidWorld::new(1.0e-2).unwrap();
        let cyl = Shape::cylinder(point![0.5, 0.5, 2.0], 0.025, vector![0.0, 0.0, 0.5]);
        let (body, _) = world.create_body("cylinder", &cyl, 5.0).unwrap();

        world.step();
        assert_relative_eq!(world.body_linvel(body).unwrap(), Vector3::zeros());

        world.set_gravity(vector![0.0, 0.0, -9.81]);
        world.step();
        assert!(world.body_linvel(body).unwrap().z < 0.0);
    }

    /// A flat box resting on the floor of a 1x1x1 domain, released under gravity with the
    /// given contact policy and an initial horizontal velocity. Returns the final pose
    /// and the largest per-step constraint count.
    fn slide_box(synthesizer: ContactSynthesizer, vx: f32) -> (Vector3<f32>, usize) {
        let mut world = RigidWorld::new(1.0e-3).unwrap();
        world.set_synthesizer(synthesizer);
        world
            .install_static_planes(&StaticPlane::domain_walls(
                point![0.0, 0.0, 0.0],
                vector![1.0, 1.0, 1.0],
            ))
            .unwrap();
        let plate = Shape::cuboid(point![0.4, 0.4, 0.001], vector![0.2, 0.2, 0.05]);
        let (body, _) = world.create_body("plate", &plate, 1.0).unwrap();
        world.bodies[body].set_linvel(vector![vx, 0.0, 0.0], true);
        world.set_gravity(vector![0.0, 0.0, -9.81]);

        let mut max_constraints = 0;
        for _ in 0..300 {
            world.step();
            max_constraints = max_constraints.max(world.take_contacts().len());
        }
        (world.body_pose(body).unwrap().translation.vector, max_constraints)
    }

    #[test]
    fn contact_cap_reaches_the_solver() {
        let (held, held_contacts) = slide_box(ContactSynthesizer::default(), 0.0);
        assert!(held_contacts > 0 && held_contacts <= 10);
        assert!(held.z > 0.0, "the plate went through the floor: {held}");

        // Without any kept contact, nothing holds the plate up.
        let (dropped, dropped_contacts) =
            slide_box(ContactSynthesizer::new(0, SurfaceParams::default()), 0.0);
        assert_eq!(dropped_contacts, 0);
        assert!(dropped.z < -0.1, "the plate was held without contacts: {dropped}");
    }

    #[test]
    fn surface_friction_reaches_the_solver() {
        let (sticky, _) = slide_box(ContactSynthesizer::default(), 1.0);
        let frictionless = SurfaceParams {
            friction: 0.0,
            ..SurfaceParams::default()
        };
        let (slippery, _) = slide_box(ContactSynthesizer::new(10, frictionless), 1.0);

        // Start at x = 0.5. Without friction the plate keeps its 1 m/s for 0.3 s.
        assert!(slippery.x > 0.7, "frictionless plate stopped at {slippery}");
        assert!(sticky.x < 0.65, "non-slipping plate slid to {sticky}");
    }
}
