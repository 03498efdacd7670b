//! Capability traits implemented by the host physics backend.
//!
//! The tether components only ever talk to the physics engine through these traits.
//! Bodies, colliders and joints are addressed by opaque `Copy` handles chosen by the
//! backend, so the same solver code runs against rapier, a test double, or anything
//! else that can answer the queries below.

use glam::{Quat, Vec3};
use std::fmt::Debug;
use thiserror::Error;

/// Snapshot of a rigid body read at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    /// Zero for fixed and kinematic bodies.
    pub mass: f32,
}

impl BodyState {
    /// A motionless massless body at `position`, e.g. a fixed anchor.
    pub fn fixed(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            mass: 0.0,
        }
    }
}

/// Rigid-body access: state queries and force application.
pub trait BodyBackend {
    type Body: Copy + Eq + Debug;

    /// Current state, or `None` if the body no longer exists.
    fn body_state(&self, body: Self::Body) -> Option<BodyState>;

    /// Accumulate a world-space force at a world-space point for the next physics step.
    /// No-op for fixed bodies and unknown handles.
    fn apply_force_at_point(&mut self, body: Self::Body, force: Vec3, point: Vec3);
}

/// Failure modes of environment queries. None of them abort a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("collision queries are unavailable")]
    Unavailable,
    #[error("no penetration routine for this shape pair")]
    UnsupportedShape,
}

/// Spatial queries against the environment.
pub trait CollisionWorld: BodyBackend {
    type Collider: Copy + Debug;

    /// Collect solid colliders overlapping a sphere into `hits` (cleared first), skipping any
    /// collider that belongs to the same assembly as one of the `exclude` bodies.
    /// At most `max_hits` are collected.
    fn overlap_sphere(
        &self,
        center: Vec3,
        radius: f32,
        exclude: &[Self::Body],
        max_hits: usize,
        hits: &mut Vec<Self::Collider>,
    ) -> Result<(), QueryError>;

    /// Vector that moves a sphere at `center` out of `collider`, or `None` if they don't
    /// overlap or the collider is gone.
    fn penetration(
        &self,
        center: Vec3,
        radius: f32,
        collider: Self::Collider,
    ) -> Result<Option<Vec3>, QueryError>;
}

/// Height of a fluid or ground surface below a horizontal position.
pub trait SurfaceQuery {
    /// World-space height at (`x`, `z`), or `None` where the surface is undefined.
    fn surface_height(&self, x: f32, z: f32) -> Option<f32>;
}

/// A level surface, e.g. calm water.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatSurface {
    pub height: f32,
}

impl SurfaceQuery for FlatSurface {
    fn surface_height(&self, _x: f32, _z: f32) -> Option<f32> {
        Some(self.height)
    }
}

/// Drive force of a joint expressed per driven degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveForce {
    dof_count: usize,
    values: [f32; 6],
}

impl DriveForce {
    /// Force of a single-DOF drive (prismatic or revolute).
    pub fn single(value: f32) -> Self {
        let mut values = [0.0; 6];
        values[0] = value;
        Self {
            dof_count: 1,
            values,
        }
    }

    /// Forces of a multi-DOF drive. Anything past six DOFs is dropped.
    pub fn from_dofs(dofs: &[f32]) -> Self {
        let mut values = [0.0; 6];
        let dof_count = dofs.len().min(6);
        values[..dof_count].copy_from_slice(&dofs[..dof_count]);
        Self { dof_count, values }
    }

    pub fn dof_count(&self) -> usize {
        self.dof_count
    }

    /// The value if this drive has exactly one DOF.
    pub fn single_dof(&self) -> Option<f32> {
        (self.dof_count == 1).then_some(self.values[0])
    }

    pub fn values(&self) -> &[f32] {
        &self.values[..self.dof_count]
    }
}

/// Driven prismatic joints plus the collision proxies of the rig they belong to.
pub trait JointBackend {
    type Joint: Copy + Eq + Debug;

    /// Displacement along the joint axis relative to the placement set by
    /// [`place_segment`](Self::place_segment), positive meaning a longer segment.
    fn prismatic_position(&self, joint: Self::Joint) -> Option<f32>;

    /// Move the joint's two bodies so the segment starts at `origin`, runs along the unit
    /// vector `direction`, and is `rest_length` long. Joint position 0 corresponds to this placement.
    fn place_segment(&mut self, joint: Self::Joint, origin: Vec3, direction: Vec3, rest_length: f32);

    fn set_drive_limits(&mut self, joint: Self::Joint, lower: f32, upper: f32);

    fn set_drive_target(&mut self, joint: Self::Joint, target: f32);

    fn set_drive_damping(&mut self, joint: Self::Joint, damping: f32);

    /// Force the drive is currently exerting, per driven DOF.
    fn drive_force(&self, joint: Self::Joint) -> Option<DriveForce>;

    /// Total constraint reaction force transmitted by the joint.
    fn reaction_force(&self, joint: Self::Joint) -> Option<Vec3>;

    /// Resize the segment's collision proxy to span `length`.
    fn resize_proxy(&mut self, joint: Self::Joint, length: f32, thickness: f32);

    /// Put every collider of the given joints' bodies into one group that does not collide with itself.
    fn isolate_rig(&mut self, joints: &[Self::Joint]);

    /// World gravity, used to turn forces into weights.
    fn gravity(&self) -> Vec3 {
        Vec3::new(0.0, -9.81, 0.0)
    }
}
