//! Two-segment winch rig made of rapier joints.
//!
//! Chain: mount, ball joint, middle sleeve, prismatic joint, knot, ball joint, end sleeve,
//! prismatic joint, hook. Each sleeve carries a box proxy that is stretched to the current
//! segment length. Segments run along the sleeve's local -Y.

use crate::collision::CollisionGroup;
use crate::physics_world::{from_vector, AssemblyId, PhysicsWorld};
use rapier3d::prelude::*;
use tether::{ConfigError, WinchActuator, WinchConfig, WinchJoints};
use tether_core::{BodyBackend, DriveForce, JointBackend, Vec3};

/// Proxies never shrink below this half-length.
const MIN_PROXY_HALF_LENGTH: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinchRigConfig {
    /// Collider half-size of sleeves, knot and hook.
    pub part_size: f32,
    pub part_density: f32,
    pub drive_stiffness: f32,
    pub drive_damping: f32,
}

impl Default for WinchRigConfig {
    fn default() -> Self {
        Self {
            part_size: 0.1,
            part_density: 10.0,
            drive_stiffness: 1000.0,
            drive_damping: 10.0,
        }
    }
}

/// Handles of a built rig.
#[derive(Debug, Clone, Copy)]
pub struct WinchRig {
    pub mount: RigidBodyHandle,
    pub joints: WinchJoints<ImpulseJointHandle>,
    /// Body at the free end; loads hang from here.
    pub hook: RigidBodyHandle,
    pub assembly: AssemblyId,
}

impl PhysicsWorld {
    /// Build a rig hanging from `mount`. Call the actuator's `apply_settings` to lay it out.
    pub fn build_winch_rig(&mut self, mount: RigidBodyHandle, config: &WinchRigConfig) -> WinchRig {
        let origin = self.body_state(mount).map_or(Vec3::ZERO, |s| s.position);
        let assembly = self.new_assembly();
        let size = config.part_size;
        let density = config.part_density;

        let sleeve_mid = self.add_dynamic_body(origin, assembly);
        self.add_box_collider(sleeve_mid, Vec3::splat(size), density, CollisionGroup::Winch);
        let knot = self.add_dynamic_body(origin, assembly);
        self.add_sphere_collider(knot, size, density, CollisionGroup::Winch);
        let sleeve_end = self.add_dynamic_body(origin, assembly);
        self.add_box_collider(sleeve_end, Vec3::splat(size), density, CollisionGroup::Winch);
        let hook = self.add_dynamic_body(origin, assembly);
        self.add_sphere_collider(hook, size, density, CollisionGroup::Winch);

        self.add_spherical_joint(mount, sleeve_mid, Vec3::ZERO, Vec3::ZERO);
        let middle = self.add_segment_joint(sleeve_mid, knot, config);
        self.add_spherical_joint(knot, sleeve_end, Vec3::ZERO, Vec3::ZERO);
        let end = self.add_segment_joint(sleeve_end, hook, config);

        log::debug!("Built winch rig on {:?} (assembly {})", mount, assembly);
        WinchRig {
            mount,
            joints: WinchJoints { middle, end },
            hook,
            assembly,
        }
    }

    /// Actuator driving `rig`, mounted where the rig's mount body currently is.
    pub fn winch_actuator(
        &self,
        rig: &WinchRig,
        config: WinchConfig,
    ) -> Result<WinchActuator<ImpulseJointHandle>, ConfigError> {
        let mount = self.get_body_transform(rig.mount).unwrap_or_default();
        WinchActuator::new(config, rig.joints, mount)
    }

    fn add_segment_joint(
        &mut self,
        sleeve: RigidBodyHandle,
        tip: RigidBodyHandle,
        config: &WinchRigConfig,
    ) -> ImpulseJointHandle {
        let joint = PrismaticJointBuilder::new(UnitVector::new_normalize(vector![0.0, -1.0, 0.0]))
            .local_anchor1(point![0.0, 0.0, 0.0])
            .local_anchor2(point![0.0, 0.0, 0.0])
            .motor_model(MotorModel::ForceBased)
            .motor_position(0.0, config.drive_stiffness, config.drive_damping)
            .build();
        self.impulse_joint_set.insert(sleeve, tip, joint, true)
    }

    fn joint_bodies(&self, joint: ImpulseJointHandle) -> Option<(RigidBodyHandle, RigidBodyHandle)> {
        self.impulse_joint_set.get(joint).map(|j| (j.body1, j.body2))
    }

    /// Joint edits don't wake the attached bodies on their own.
    fn wake_joint(&mut self, joint: ImpulseJointHandle) {
        let Some((a, b)) = self.joint_bodies(joint) else {
            return;
        };
        for body in [a, b] {
            if let Some(rb) = self.rigid_body_set.get_mut(body) {
                rb.wake_up(true);
            }
        }
    }

    fn update_drive(&mut self, joint: ImpulseJointHandle, f: impl FnOnce(&mut JointMotor)) {
        self.wake_joint(joint);
        let Some(j) = self.impulse_joint_set.get_mut(joint) else {
            return;
        };
        let Some(mut motor) = j.data.motor(JointAxis::LinX).copied() else {
            return;
        };
        f(&mut motor);
        j.data
            .set_motor_position(JointAxis::LinX, motor.target_pos, motor.stiffness, motor.damping);
    }
}

impl JointBackend for PhysicsWorld {
    type Joint = ImpulseJointHandle;

    fn prismatic_position(&self, joint: ImpulseJointHandle) -> Option<f32> {
        let j = self.impulse_joint_set.get(joint)?;
        let b1 = self.rigid_body_set.get(j.body1)?;
        let b2 = self.rigid_body_set.get(j.body2)?;
        let frame1 = b1.position() * j.data.local_frame1;
        let frame2 = b2.position() * j.data.local_frame2;
        let axis = frame1.rotation * Vector::x();
        Some((frame2.translation.vector - frame1.translation.vector).dot(&axis))
    }

    fn place_segment(&mut self, joint: ImpulseJointHandle, origin: Vec3, direction: Vec3, rest_length: f32) {
        let Some((sleeve, tip)) = self.joint_bodies(joint) else {
            return;
        };
        let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
        let rotation = glam::Quat::from_rotation_arc(Vec3::NEG_Y, direction);
        self.set_body_pose(sleeve, origin, rotation);
        self.set_body_pose(tip, origin + direction * rest_length, rotation);
        if let Some(j) = self.impulse_joint_set.get_mut(joint) {
            j.data.set_local_anchor2(point![0.0, rest_length, 0.0]);
        }
    }

    fn set_drive_limits(&mut self, joint: ImpulseJointHandle, lower: f32, upper: f32) {
        self.wake_joint(joint);
        if let Some(j) = self.impulse_joint_set.get_mut(joint) {
            j.data.set_limits(JointAxis::LinX, [lower, upper]);
        }
    }

    fn set_drive_target(&mut self, joint: ImpulseJointHandle, target: f32) {
        self.update_drive(joint, |motor| motor.target_pos = target);
    }

    fn set_drive_damping(&mut self, joint: ImpulseJointHandle, damping: f32) {
        self.update_drive(joint, |motor| motor.damping = damping);
    }

    fn drive_force(&self, joint: ImpulseJointHandle) -> Option<DriveForce> {
        let j = self.impulse_joint_set.get(joint)?;
        let motor = j.data.motor(JointAxis::LinX)?;
        Some(DriveForce::single(motor.impulse / self.integration_parameters.dt))
    }

    fn reaction_force(&self, joint: ImpulseJointHandle) -> Option<Vec3> {
        let j = self.impulse_joint_set.get(joint)?;
        let along_axis = j.data.motor(JointAxis::LinX).map_or(0.0, |m| m.impulse)
            + j.data.limits(JointAxis::LinX).map_or(0.0, |l| l.impulse);
        let impulse = Vec3::new(j.impulses[0] + along_axis, j.impulses[1], j.impulses[2]);
        Some(impulse / self.integration_parameters.dt)
    }

    fn resize_proxy(&mut self, joint: ImpulseJointHandle, length: f32, thickness: f32) {
        let Some((sleeve, _)) = self.joint_bodies(joint) else {
            return;
        };
        let Some(&handle) = self.rigid_body_set.get(sleeve).and_then(|b| b.colliders().first()) else {
            return;
        };
        if let Some(collider) = self.collider_set.get_mut(handle) {
            let half = (length * 0.5).max(MIN_PROXY_HALF_LENGTH);
            let thickness = thickness.max(MIN_PROXY_HALF_LENGTH);
            collider.set_shape(SharedShape::cuboid(thickness, half, thickness));
            collider.set_translation_wrt_parent(vector![0.0, -half, 0.0]);
        }
    }

    fn isolate_rig(&mut self, joints: &[ImpulseJointHandle]) {
        let colliders: Vec<ColliderHandle> = joints
            .iter()
            .filter_map(|&joint| self.joint_bodies(joint))
            .flat_map(|(a, b)| [a, b])
            .filter_map(|body| self.rigid_body_set.get(body))
            .flat_map(|body| body.colliders().iter().copied())
            .collect();
        let groups = CollisionGroup::Winch.interaction_groups();
        for handle in colliders {
            if let Some(collider) = self.collider_set.get_mut(handle) {
                collider.set_collision_groups(groups);
            }
        }
    }

    fn gravity(&self) -> Vec3 {
        from_vector(&self.gravity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn rig(gravity: Vec3) -> (PhysicsWorld, WinchRig, WinchActuator<ImpulseJointHandle>) {
        let mut physics = PhysicsWorld::new(gravity);
        let assembly = physics.new_assembly();
        let mount = physics.add_fixed_body(Vec3::new(0.0, 10.0, 0.0), assembly);
        let rig = physics.build_winch_rig(mount, &WinchRigConfig::default());
        let config = WinchConfig {
            total_length: 5.0,
            starting_slack: 2.0,
            ..Default::default()
        };
        let mut winch = physics.winch_actuator(&rig, config).unwrap();
        winch.apply_settings(&mut physics);
        (physics, rig, winch)
    }

    #[test]
    fn layout_starts_at_zero_displacement() {
        let (physics, rig, _) = rig(Vec3::ZERO);
        for joint in rig.joints.both() {
            assert!(physics.prismatic_position(joint).unwrap().abs() < 1e-4);
        }
        let hook = physics.body_state(rig.hook).unwrap().position;
        assert!((hook - Vec3::new(0.0, 7.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn limits_and_targets_reach_the_joint() {
        let (mut physics, rig, _) = rig(Vec3::ZERO);
        physics.set_drive_target(rig.joints.end, 0.4);
        physics.set_drive_damping(rig.joints.end, 55.0);
        let j = physics.impulse_joint_set.get(rig.joints.end).unwrap();
        let motor = j.data.motor(JointAxis::LinX).unwrap();
        assert_eq!(motor.target_pos, 0.4);
        assert_eq!(motor.damping, 55.0);
        assert_eq!(motor.stiffness, WinchRigConfig::default().drive_stiffness);
        let limits = j.data.limits(JointAxis::LinX).unwrap();
        assert!((limits.min + 1.5).abs() < 1e-6);
        assert!((limits.max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn drive_edits_wake_a_sleeping_rig() {
        let (mut physics, rig, _) = rig(Vec3::ZERO);
        physics.rigid_body_set[rig.hook].sleep();
        assert!(physics.rigid_body_set[rig.hook].is_sleeping());
        physics.set_drive_target(rig.joints.end, -0.2);
        assert!(!physics.rigid_body_set[rig.hook].is_sleeping());

        physics.rigid_body_set[rig.hook].sleep();
        physics.set_drive_limits(rig.joints.end, -1.0, 1.0);
        assert!(!physics.rigid_body_set[rig.hook].is_sleeping());
    }

    #[test]
    fn rig_colliders_join_winch_group() {
        let (physics, rig, _) = rig(Vec3::ZERO);
        let winch = CollisionGroup::Winch.interaction_groups();
        let body = physics.rigid_body_set.get(rig.hook).unwrap();
        for handle in body.colliders() {
            assert_eq!(physics.collider_set[*handle].collision_groups(), winch);
        }
    }

    #[test]
    fn proxy_spans_segment() {
        let (mut physics, rig, _) = rig(Vec3::ZERO);
        physics.resize_proxy(rig.joints.middle, 2.0, 0.1);
        let (sleeve, _) = physics.joint_bodies(rig.joints.middle).unwrap();
        let handle = physics.rigid_body_set[sleeve].colliders()[0];
        let cuboid = physics.collider_set[handle].shape().as_cuboid().unwrap();
        assert!((cuboid.half_extents.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn paying_out_lengthens_the_rig() {
        let (mut physics, _, mut winch) = rig(Vec3::ZERO);
        winch.set_pull_speed(-1.0);
        for _ in 0..60 {
            winch.step(DT, &mut physics);
            physics.step(DT);
        }
        winch.step(DT, &mut physics);
        assert!(winch.state().current_length > 3.1);
        assert!(winch.state().current_length <= 5.0 + 0.05);
    }
}
