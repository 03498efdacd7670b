//! Physics world management with Rapier3D.

use crate::collision::CollisionGroup;
use rapier3d::na::{Quaternion, UnitQuaternion};
use rapier3d::prelude::*;
use tether_core::{Transform, Vec3};

/// Rigid bodies that belong together, e.g. a buoy and its attachment points, share an
/// assembly id stored in `RigidBody::user_data`.
pub type AssemblyId = u128;

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn to_point(v: Vec3) -> Point<Real> {
    point![v.x, v.y, v.z]
}

pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

pub(crate) fn to_rotation(q: glam::Quat) -> UnitQuaternion<Real> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub(crate) fn from_rotation(q: &UnitQuaternion<Real>) -> glam::Quat {
    glam::Quat::from_xyzw(q.i, q.j, q.k, q.w)
}

pub(crate) fn to_isometry(position: Vec3, rotation: glam::Quat) -> Isometry<Real> {
    Isometry::from_parts(to_vector(position).into(), to_rotation(rotation))
}

/// Main physics world containing all simulation state.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,
    next_assembly: AssemblyId,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -9.81, 0.0))
    }
}

impl PhysicsWorld {
    /// Create a new physics world.
    pub fn new(gravity: Vec3) -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            gravity: to_vector(gravity),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            next_assembly: 1,
        }
    }

    /// Step the physics simulation by `dt` seconds.
    ///
    /// Forces added through `apply_force_at_point` only last for this step.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        for (_, body) in self.rigid_body_set.iter_mut() {
            body.reset_forces(false);
        }
    }

    /// Update query pipeline after adding colliders outside of `step`.
    pub fn update_query_pipeline(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Reserve a fresh assembly id.
    pub fn new_assembly(&mut self) -> AssemblyId {
        let id = self.next_assembly;
        self.next_assembly += 1;
        id
    }

    /// Assembly a body belongs to, 0 if it was added without one.
    pub fn assembly_of(&self, handle: RigidBodyHandle) -> Option<AssemblyId> {
        self.rigid_body_set.get(handle).map(|b| b.user_data)
    }

    /// Add a dynamic rigid body and return its handle.
    pub fn add_dynamic_body(&mut self, position: Vec3, assembly: AssemblyId) -> RigidBodyHandle {
        let rigid_body = RigidBodyBuilder::dynamic()
            .translation(to_vector(position))
            .user_data(assembly)
            .build();
        self.rigid_body_set.insert(rigid_body)
    }

    /// Add a fixed rigid body (anchors, winch mounts).
    pub fn add_fixed_body(&mut self, position: Vec3, assembly: AssemblyId) -> RigidBodyHandle {
        let rigid_body = RigidBodyBuilder::fixed()
            .translation(to_vector(position))
            .user_data(assembly)
            .build();
        self.rigid_body_set.insert(rigid_body)
    }

    /// Add a box collider to a rigid body.
    pub fn add_box_collider(
        &mut self,
        body_handle: RigidBodyHandle,
        half_extents: Vec3,
        density: f32,
        group: CollisionGroup,
    ) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .density(density)
            .collision_groups(group.interaction_groups())
            .build();
        self.collider_set.insert_with_parent(collider, body_handle, &mut self.rigid_body_set)
    }

    /// Add a sphere collider to a rigid body.
    pub fn add_sphere_collider(
        &mut self,
        body_handle: RigidBodyHandle,
        radius: f32,
        density: f32,
        group: CollisionGroup,
    ) -> ColliderHandle {
        let collider = ColliderBuilder::ball(radius)
            .density(density)
            .collision_groups(group.interaction_groups())
            .build();
        self.collider_set.insert_with_parent(collider, body_handle, &mut self.rigid_body_set)
    }

    /// Add a sensor sphere, e.g. a handover volume. See [`PhysicsWorld::is_intersecting`].
    pub fn add_trigger_sphere(&mut self, center: Vec3, radius: f32) -> ColliderHandle {
        let collider = ColliderBuilder::ball(radius)
            .translation(to_vector(center))
            .sensor(true)
            .collision_groups(CollisionGroup::Trigger.interaction_groups())
            .build();
        self.collider_set.insert(collider)
    }

    /// Add a ground plane collider (flat half-space at `height`).
    pub fn add_ground_plane(&mut self, height: f32) -> ColliderHandle {
        let collider = ColliderBuilder::halfspace(Vector::y_axis())
            .translation(vector![0.0, height, 0.0])
            .collision_groups(CollisionGroup::Environment.interaction_groups())
            .build();
        self.collider_set.insert(collider)
    }

    /// Add a static cuboid obstacle with no parent body.
    pub fn add_static_cuboid(&mut self, translation: Vec3, half_extents: Vec3) -> ColliderHandle {
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            .translation(to_vector(translation))
            .collision_groups(CollisionGroup::Environment.interaction_groups())
            .build();
        self.collider_set.insert(collider)
    }

    /// Ball joint between two bodies at the given local anchors.
    pub fn add_spherical_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor1: Vec3,
        anchor2: Vec3,
    ) -> ImpulseJointHandle {
        let joint = SphericalJointBuilder::new()
            .local_anchor1(to_point(anchor1))
            .local_anchor2(to_point(anchor2))
            .build();
        self.impulse_joint_set.insert(body1, body2, joint, true)
    }

    /// Get the transform of a rigid body.
    pub fn get_body_transform(&self, handle: RigidBodyHandle) -> Option<Transform> {
        self.rigid_body_set.get(handle).map(|body| Transform {
            position: from_vector(body.translation()),
            rotation: from_rotation(body.rotation()),
            scale: Vec3::ONE,
        })
    }

    /// Teleport a body and stop it.
    pub fn set_body_pose(&mut self, handle: RigidBodyHandle, position: Vec3, rotation: glam::Quat) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_position(to_isometry(position, rotation), true);
            body.set_linvel(Vector::zeros(), true);
            body.set_angvel(Vector::zeros(), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_body_falls() {
        let mut physics = PhysicsWorld::default();
        let assembly = physics.new_assembly();
        let body = physics.add_dynamic_body(Vec3::new(0.0, 5.0, 0.0), assembly);
        physics.add_sphere_collider(body, 0.5, 1.0, CollisionGroup::Body);
        for _ in 0..30 {
            physics.step(1.0 / 60.0);
        }
        let t = physics.get_body_transform(body).unwrap();
        assert!(t.position.y < 5.0);
        assert_eq!(physics.assembly_of(body), Some(assembly));
    }

    #[test]
    fn assemblies_are_unique() {
        let mut physics = PhysicsWorld::default();
        let a = physics.new_assembly();
        let b = physics.new_assembly();
        assert_ne!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn conversions_agree() {
        let q = glam::Quat::from_rotation_y(0.7);
        let back = from_rotation(&to_rotation(q));
        assert!(back.angle_between(q) < 1e-5);
        let iso = to_isometry(Vec3::new(1.0, 2.0, 3.0), q);
        assert!((from_vector(&iso.translation.vector) - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }
}
