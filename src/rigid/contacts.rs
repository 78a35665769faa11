use nalgebra::{Point3, Vector3};

/// Largest friction coefficient handed to the rigid-body engine.
const MAX_ENGINE_FRICTION: f32 = 1.0e4;

/// Response model of a contact.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContactMode {
    /// Restitution-based response, gated by a minimum incoming velocity.
    Bounce,
}

/// Surface properties shared by every contact of a scenario.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SurfaceParams {
    pub mode: ContactMode,
    /// Coulomb friction coefficient. `f32::INFINITY` means no slip.
    pub friction: f32,
    /// Restitution coefficient in `[0, 1]`.
    pub restitution: f32,
    /// Minimum incoming normal velocity for the restitution to apply.
    pub bounce_velocity: f32,
}

impl Default for SurfaceParams {
    /// Non-slipping, fully inelastic contacts.
    fn default() -> Self {
        Self {
            mode: ContactMode::Bounce,
            friction: f32::INFINITY,
            restitution: 0.0,
            bounce_velocity: 0.0,
        }
    }
}

impl SurfaceParams {
    /// Friction coefficient usable by the rigid-body engine.
    pub fn engine_friction(&self) -> f32 {
        self.friction.min(MAX_ENGINE_FRICTION)
    }
}

/// A contact point reported by the narrow phase, in world space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ContactPoint {
    pub position: Point3<f32>,
    /// Contact normal, pointing from the first geometry to the second.
    pub normal: Vector3<f32>,
    /// Penetration depth. Negative for speculative contacts, which are kept by the solver
    /// while the geometries are still apart.
    pub depth: f32,
}

/// A contact constraint between the bodies owning two colliding geometries.
///
/// A `None` body stands for the static world.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ContactConstraint<B> {
    pub point: ContactPoint,
    pub surface: SurfaceParams,
    pub body1: Option<B>,
    pub body2: Option<B>,
}

/// Contact constraints created during one step. Emptied before the next one.
#[derive(Clone, Debug)]
pub struct ContactGroup<B> {
    constraints: Vec<ContactConstraint<B>>,
}

impl<B> Default for ContactGroup<B> {
    fn default() -> Self {
        Self {
            constraints: vec![],
        }
    }
}

impl<B> ContactGroup<B> {
    pub fn push(&mut self, constraint: ContactConstraint<B>) {
        self.constraints.push(constraint);
    }

    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactConstraint<B>> {
        self.constraints.iter()
    }
}

/// Narrow-phase collision queries, keyed by opaque geometry handles.
pub trait CollisionBackend {
    type Geometry: Copy + std::fmt::Debug;
    type Body: Copy;

    /// The dynamic body a geometry is attached to, or `None` for static geometry.
    fn owning_body(&self, geom: Self::Geometry) -> Option<Self::Body>;

    /// Appends at most `max_contacts` contact points between the two geometries to `out`.
    fn collide(
        &self,
        geom1: Self::Geometry,
        geom2: Self::Geometry,
        max_contacts: usize,
        out: &mut Vec<ContactPoint>,
    );
}

/// Turns the contacts of candidate geometry pairs into contact constraints.
#[derive(Clone, Debug)]
pub struct ContactSynthesizer {
    /// Contacts beyond this count are dropped.
    pub max_contacts: usize,
    pub surface: SurfaceParams,
    /// Log the number of contacts of pairs where both geometries belong to a body.
    pub log_body_pairs: bool,
    scratch: Vec<ContactPoint>,
}

impl Default for ContactSynthesizer {
    fn default() -> Self {
        Self::new(10, SurfaceParams::default())
    }
}

impl ContactSynthesizer {
    pub fn new(max_contacts: usize, surface: SurfaceParams) -> Self {
        Self {
            max_contacts,
            surface,
            log_body_pairs: false,
            scratch: Vec::with_capacity(max_contacts),
        }
    }

    /// Creates one constraint per contact point between `geom1` and `geom2`, and returns
    /// the number of constraints created.
    ///
    /// A pair without contacts creates nothing. Pairs are independent from each other and
    /// can be processed in any order within a step.
    pub fn on_candidate_pair<C: CollisionBackend>(
        &mut self,
        backend: &C,
        group: &mut ContactGroup<C::Body>,
        geom1: C::Geometry,
        geom2: C::Geometry,
    ) -> usize {
        self.scratch.clear();
        backend.collide(geom1, geom2, self.max_contacts, &mut self.scratch);
        self.scratch.truncate(self.max_contacts);

        let body1 = backend.owning_body(geom1);
        let body2 = backend.owning_body(geom2);

        if self.log_body_pairs && body1.is_some() && body2.is_some() {
            log::info!(
                "{} contacts between {geom1:?} and {geom2:?}",
                self.scratch.len()
            );
        }

        for point in &self.scratch {
            group.push(ContactConstraint {
                point: *point,
                surface: self.surface,
                body1,
                body2,
            });
        }

        self.scratch.len()
    }
}
