use super::contacts::{CollisionBackend, ContactGroup, ContactPoint, ContactSynthesizer};
use nalgebra::{Point3, Vector3};
use rapier3d::geometry::SolverContact;
use rapier3d::pipeline::{ContactModificationContext, PhysicsHooks};
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle, RigidBodySet};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Default)]
struct HookState {
    synthesizer: ContactSynthesizer,
    group: ContactGroup<RigidBodyHandle>,
    /// Contacts kept so far for each collider pair during the current step.
    per_pair: HashMap<(ColliderHandle, ColliderHandle), usize>,
}

/// Rapier hooks running the [`ContactSynthesizer`] on the contacts handed to the solver.
///
/// For every contact manifold, the synthesizer decides how many solver contacts are kept,
/// and the kept contacts get its surface parameters. The constraints it creates are
/// collected until [`ContactHooks::take_contacts`].
#[derive(Default)]
pub struct ContactHooks {
    state: Mutex<HookState>,
}

impl ContactHooks {
    fn state_mut(&mut self) -> &mut HookState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn synthesizer_mut(&mut self) -> &mut ContactSynthesizer {
        &mut self.state_mut().synthesizer
    }

    /// Forgets the constraints and per-pair counts of the previous step.
    pub fn begin_step(&mut self) {
        let state = self.state_mut();
        state.group.clear();
        state.per_pair.clear();
    }

    /// Constraints created since the last [`Self::begin_step`].
    pub fn take_contacts(&mut self) -> ContactGroup<RigidBodyHandle> {
        std::mem::take(&mut self.state_mut().group)
    }
}

/// One contact manifold, seen as a collision backend.
struct ManifoldPair<'a> {
    collider1: ColliderHandle,
    collider2: ColliderHandle,
    body1: Option<RigidBodyHandle>,
    body2: Option<RigidBodyHandle>,
    normal: Vector3<f32>,
    contacts: &'a [SolverContact],
    /// Contacts the pair may still add during this step.
    budget: usize,
}

impl CollisionBackend for ManifoldPair<'_> {
    type Geometry = ColliderHandle;
    type Body = RigidBodyHandle;

    fn owning_body(&self, geom: ColliderHandle) -> Option<RigidBodyHandle> {
        if geom == self.collider1 {
            self.body1
        } else if geom == self.collider2 {
            self.body2
        } else {
            None
        }
    }

    fn collide(
        &self,
        geom1: ColliderHandle,
        _geom2: ColliderHandle,
        max_contacts: usize,
        out: &mut Vec<ContactPoint>,
    ) {
        let sign = if geom1 == self.collider1 { 1.0 } else { -1.0 };
        out.extend(
            self.contacts
                .iter()
                .take(max_contacts.min(self.budget))
                .map(|c| ContactPoint {
                    position: c.point,
                    normal: self.normal * sign,
                    depth: -c.dist,
                }),
        );
    }
}

/// Normal velocity at which the first body approaches the second one at `point`.
fn approach_speed(
    bodies: &RigidBodySet,
    body1: Option<RigidBodyHandle>,
    body2: Option<RigidBodyHandle>,
    point: &Point3<f32>,
    normal: &Vector3<f32>,
) -> f32 {
    let velocity = |body: Option<RigidBodyHandle>| {
        body.and_then(|h| bodies.get(h))
            .map_or_else(Vector3::zeros, |rb| rb.velocity_at_point(point))
    };
    (velocity(body1) - velocity(body2)).dot(normal)
}

impl PhysicsHooks for ContactHooks {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        let key = (context.collider1, context.collider2);
        let used = state.per_pair.get(&key).copied().unwrap_or(0);
        let normal = *context.normal;

        let pair = ManifoldPair {
            collider1: context.collider1,
            collider2: context.collider2,
            body1: context.rigid_body1,
            body2: context.rigid_body2,
            normal,
            contacts: context.solver_contacts.as_slice(),
            budget: state.synthesizer.max_contacts.saturating_sub(used),
        };
        let kept = state.synthesizer.on_candidate_pair(
            &pair,
            &mut state.group,
            context.collider1,
            context.collider2,
        );
        *state.per_pair.entry(key).or_insert(0) += kept;

        let surface = state.synthesizer.surface;
        context.solver_contacts.truncate(kept);
        for contact in context.solver_contacts.iter_mut() {
            contact.friction = surface.engine_friction();
            let speed = approach_speed(
                context.bodies,
                context.rigid_body1,
                context.rigid_body2,
                &contact.point,
                &normal,
            );
            contact.restitution = if speed > surface.bounce_velocity {
                surface.restitution
            } else {
                0.0
            };
        }
    }
}
