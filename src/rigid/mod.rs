//! Rigid bodies coupled with the fluid.
//!
//! [`RigidWorld`] wraps the rapier pipeline and the static collision geometry,
//! [`RigidBodyRegistry`] assigns object indices to bodies, and [`ContactSynthesizer`] turns
//! the contacts of each candidate collider pair into per-step contact constraints. The
//! synthesizer runs inside the rapier step through [`ContactHooks`].

pub use contacts::{
    CollisionBackend, ContactConstraint, ContactGroup, ContactMode, ContactPoint,
    ContactSynthesizer, SurfaceParams,
};
pub use hooks::ContactHooks;
pub use registry::{RigidBody, RigidBodyDescriptor, RigidBodyRegistry};
pub use world::{RigidWorld, SolverPlane, StaticPlane};

mod contacts;
mod hooks;
mod registry;
mod world;
