//! Rapier3D backend for the tether components.
//!
//! [`PhysicsWorld`] answers the body, collision and joint queries the rope, winch and
//! sensors are written against, and builds the jointed winch rig.

pub mod collision;
pub mod physics_world;
pub mod queries;
pub mod winch_rig;

pub use collision::*;
pub use physics_world::*;
pub use winch_rig::*;

// Re-export Rapier for downstream crates
pub use rapier3d;

// Re-export common Rapier types
pub use rapier3d::prelude::{ColliderHandle, ImpulseJointHandle, RigidBodyHandle};
