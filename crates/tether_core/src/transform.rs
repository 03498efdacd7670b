//! Transform and orientation helpers for winch mounts and rope nodes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A 3D transform representing position, rotation, and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform at the given position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a new transform with position and rotation.
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Create the model matrix for this transform.
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Map a direction from local space to world space (ignores translation and scale).
    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * direction
    }

    /// Rotate so that the local `axis` points at `target`.
    ///
    /// Leaves the rotation untouched when `target` coincides with the position.
    pub fn aim_axis_at(&mut self, axis: Vec3, target: Vec3) {
        let to_target = (target - self.position).normalize_or_zero();
        let axis = axis.normalize_or_zero();
        if to_target == Vec3::ZERO || axis == Vec3::ZERO {
            return;
        }
        self.rotation = Quat::from_rotation_arc(axis, to_target);
    }
}

/// Rotation whose local +Z points along `forward`, with local +Y as close to `up` as possible.
///
/// Degenerate input (zero `forward`) yields identity. When `forward` is parallel to `up`
/// the shortest arc from +Z is used instead.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let right = up.cross(forward);
    if right.length_squared() < 1e-8 {
        return Quat::from_rotation_arc(Vec3::Z, forward);
    }
    let right = right.normalize();
    let up = forward.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, forward))
}

/// Raw per-node model matrix for instanced drawing of rope links.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct NodeInstanceRaw {
    pub model: [[f32; 4]; 4],
}

impl From<&Transform> for NodeInstanceRaw {
    fn from(transform: &Transform) -> Self {
        Self {
            model: transform.to_matrix().to_cols_array_2d(),
        }
    }
}

impl From<Transform> for NodeInstanceRaw {
    fn from(transform: Transform) -> Self {
        Self::from(&transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_rotation_points_z_along_forward() {
        let dir = Vec3::new(1.0, -2.0, 0.5).normalize();
        let q = look_rotation(dir, Vec3::X);
        assert!((q * Vec3::Z - dir).length() < 1e-5);
    }

    #[test]
    fn look_rotation_degenerate_input() {
        assert_eq!(look_rotation(Vec3::ZERO, Vec3::X), Quat::IDENTITY);
        // Parallel to the up hint still aims +Z correctly.
        let q = look_rotation(Vec3::X, Vec3::X);
        assert!((q * Vec3::Z - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn aim_axis_at_rotates_down_axis_toward_target() {
        let mut t = Transform::from_position(Vec3::new(0.0, 5.0, 0.0));
        t.aim_axis_at(Vec3::NEG_Y, Vec3::new(5.0, 0.0, 0.0));
        let expected = Vec3::new(1.0, -1.0, 0.0).normalize();
        assert!((t.transform_direction(Vec3::NEG_Y) - expected).length() < 1e-5);
    }

    #[test]
    fn instance_matrix_carries_translation() {
        let t = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let raw = NodeInstanceRaw::from(t);
        assert_eq!(raw.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(bytemuck::bytes_of(&raw).len(), 64);
    }
}
