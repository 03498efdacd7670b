//! Body access and sphere queries used by the rope solver.

use crate::collision::CollisionGroup;
use crate::physics_world::{from_rotation, from_vector, to_point, to_vector, PhysicsWorld};
use rapier3d::parry::query;
use rapier3d::prelude::*;
use tether_core::{BodyBackend, BodyState, CollisionWorld, QueryError, Vec3};

impl BodyBackend for PhysicsWorld {
    type Body = RigidBodyHandle;

    fn body_state(&self, handle: RigidBodyHandle) -> Option<BodyState> {
        self.rigid_body_set.get(handle).map(|body| BodyState {
            position: from_vector(body.translation()),
            rotation: from_rotation(body.rotation()),
            linear_velocity: from_vector(body.linvel()),
            mass: if body.is_dynamic() { body.mass() } else { 0.0 },
        })
    }

    fn apply_force_at_point(&mut self, handle: RigidBodyHandle, force: Vec3, point: Vec3) {
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            if body.is_dynamic() {
                body.add_force_at_point(to_vector(force), to_point(point), true);
            }
        }
    }
}

impl CollisionWorld for PhysicsWorld {
    type Collider = ColliderHandle;

    fn overlap_sphere(
        &self,
        center: Vec3,
        radius: f32,
        exclude: &[RigidBodyHandle],
        max_hits: usize,
        hits: &mut Vec<ColliderHandle>,
    ) -> Result<(), QueryError> {
        hits.clear();
        let excluded: Vec<u128> = exclude
            .iter()
            .filter_map(|&h| self.rigid_body_set.get(h).map(|b| b.user_data))
            .collect();
        let bodies = &self.rigid_body_set;
        let same_assembly = |_: ColliderHandle, collider: &Collider| {
            collider
                .parent()
                .and_then(|parent| bodies.get(parent))
                .map_or(true, |body| !excluded.contains(&body.user_data))
        };
        let filter = QueryFilter::default()
            .exclude_sensors()
            .groups(CollisionGroup::RopeProbe.interaction_groups())
            .predicate(&same_assembly);

        let shape = Ball::new(radius);
        let shape_pos = Isometry::translation(center.x, center.y, center.z);
        self.query_pipeline.intersections_with_shape(
            &self.rigid_body_set,
            &self.collider_set,
            &shape_pos,
            &shape,
            filter,
            |collider| {
                hits.push(collider);
                hits.len() < max_hits
            },
        );
        Ok(())
    }

    fn penetration(
        &self,
        center: Vec3,
        radius: f32,
        handle: ColliderHandle,
    ) -> Result<Option<Vec3>, QueryError> {
        // A collider removed since the overlap query has nothing left to push out of.
        let Some(collider) = self.collider_set.get(handle) else {
            return Ok(None);
        };
        let ball = Ball::new(radius);
        let ball_pos = Isometry::translation(center.x, center.y, center.z);
        let contact = query::contact(&ball_pos, &ball, collider.position(), collider.shape(), 0.0)
            .map_err(|_| QueryError::UnsupportedShape)?;
        Ok(contact
            .filter(|c| c.dist < 0.0)
            .map(|c| from_vector(&c.normal1) * c.dist))
    }
}

impl PhysicsWorld {
    /// Whether two colliders, at least one a sensor, overlapped during the last step.
    pub fn is_intersecting(&self, a: ColliderHandle, b: ColliderHandle) -> bool {
        self.narrow_phase.intersection_pair(a, b) == Some(true)
    }
}
