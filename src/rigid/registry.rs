use super::world::RigidWorld;
use crate::error::{Error, Result};
use crate::particles::{MassConvention, Population};
use crate::sampling::Shape;
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Description of a rigid body coupled with the fluid.
///
/// `particle_mass` is the mass of each surface particle seen by the fluid solver, while
/// `body_mass` is the total mass given to the rigid-body engine. The two are unrelated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyDescriptor {
    pub name: String,
    pub shape: Shape,
    pub particle_mass: MassConvention,
    pub body_mass: f32,
    /// Remove the fluid particles overlapping the body before the run.
    #[serde(default = "default_true")]
    pub unfill_fluid: bool,
}

/// A registered rigid body.
#[derive(Clone, Debug)]
pub struct RigidBody {
    name: String,
    shape: Shape,
    body_mass: f32,
    particles: Population,
    body: RigidBodyHandle,
    collider: ColliderHandle,
    object_index: u16,
}

impl RigidBody {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn body_mass(&self) -> f32 {
        self.body_mass
    }

    /// Surface particles of the body.
    pub fn particles(&self) -> &Population {
        &self.particles
    }

    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    /// Registration index, also stamped on the body's particles.
    pub fn object_index(&self) -> u16 {
        self.object_index
    }
}

/// Ordered set of the rigid bodies of a scenario.
///
/// Object indices are assigned in registration order, starting at 0, and never change.
#[derive(Clone, Debug, Default)]
pub struct RigidBodyRegistry {
    bodies: Vec<RigidBody>,
}

impl RigidBodyRegistry {
    /// Creates the dynamics body and collision geometry of `desc` in `world` and returns the
    /// object index of the new body.
    pub fn register(
        &mut self,
        world: &mut RigidWorld,
        desc: &RigidBodyDescriptor,
        particles: Population,
    ) -> Result<usize> {
        let object_index = u16::try_from(self.bodies.len()).map_err(|_| Error::BodyCreation {
            name: desc.name.clone(),
            reason: format!("at most {} rigid bodies are supported", u16::MAX),
        })?;
        let (body, collider) = world.create_body(&desc.name, &desc.shape, desc.body_mass)?;

        self.bodies.push(RigidBody {
            name: desc.name.clone(),
            shape: desc.shape,
            body_mass: desc.body_mass,
            particles,
            body,
            collider,
            object_index,
        });

        Ok(object_index as usize)
    }

    pub fn get(&self, object_index: usize) -> Option<&RigidBody> {
        self.bodies.get(object_index)
    }

    pub fn count(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigidBody> {
        self.bodies.iter()
    }

    /// Total number of surface particles of all the bodies.
    pub fn num_particles(&self) -> usize {
        self.bodies.iter().map(|b| b.particles.len()).sum()
    }

    pub fn find_by_collider(&self, collider: ColliderHandle) -> Option<&RigidBody> {
        self.bodies.iter().find(|b| b.collider == collider)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RigidBody> {
        self.bodies.iter().find(|b| b.name == name)
    }
}
