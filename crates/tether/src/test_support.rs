//! In-memory backends for unit tests.

use glam::Vec3;
use tether_core::{
    BodyBackend, BodyState, CollisionWorld, DriveForce, JointBackend, QueryError,
};

#[derive(Debug, Clone)]
pub struct MockBody {
    pub state: BodyState,
    pub assembly: u32,
    pub alive: bool,
    /// (force, point) pairs applied since the last clear.
    pub forces: Vec<(Vec3, Vec3)>,
}

/// Sphere obstacle. `assembly` ties it to a body's assembly for exclusion tests.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub center: Vec3,
    pub radius: f32,
    pub assembly: Option<u32>,
    pub sensor: bool,
}

#[derive(Debug, Default)]
pub struct MockWorld {
    pub bodies: Vec<MockBody>,
    pub obstacles: Vec<Obstacle>,
    pub collisions_down: bool,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, position: Vec3, mass: f32) -> usize {
        let id = self.bodies.len();
        self.bodies.push(MockBody {
            state: BodyState {
                mass,
                ..BodyState::fixed(position)
            },
            assembly: id as u32,
            alive: true,
            forces: Vec::new(),
        });
        id
    }

    pub fn add_obstacle(&mut self, center: Vec3, radius: f32) -> usize {
        self.obstacles.push(Obstacle {
            center,
            radius,
            assembly: None,
            sensor: false,
        });
        self.obstacles.len() - 1
    }

    pub fn total_force(&self, body: usize) -> Vec3 {
        self.bodies[body].forces.iter().map(|(f, _)| *f).sum()
    }
}

impl BodyBackend for MockWorld {
    type Body = usize;

    fn body_state(&self, body: usize) -> Option<BodyState> {
        self.bodies.get(body).filter(|b| b.alive).map(|b| b.state)
    }

    fn apply_force_at_point(&mut self, body: usize, force: Vec3, point: Vec3) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.forces.push((force, point));
        }
    }
}

impl CollisionWorld for MockWorld {
    type Collider = usize;

    fn overlap_sphere(
        &self,
        center: Vec3,
        radius: f32,
        exclude: &[usize],
        max_hits: usize,
        hits: &mut Vec<usize>,
    ) -> Result<(), QueryError> {
        hits.clear();
        if self.collisions_down {
            return Err(QueryError::Unavailable);
        }
        let excluded: Vec<u32> = exclude
            .iter()
            .filter_map(|&b| self.bodies.get(b).map(|b| b.assembly))
            .collect();
        for (i, o) in self.obstacles.iter().enumerate() {
            if hits.len() >= max_hits {
                break;
            }
            if o.sensor || o.assembly.is_some_and(|a| excluded.contains(&a)) {
                continue;
            }
            if (center - o.center).length() < radius + o.radius {
                hits.push(i);
            }
        }
        Ok(())
    }

    fn penetration(
        &self,
        center: Vec3,
        radius: f32,
        collider: usize,
    ) -> Result<Option<Vec3>, QueryError> {
        let Some(o) = self.obstacles.get(collider) else {
            return Ok(None);
        };
        let offset = center - o.center;
        let depth = radius + o.radius - offset.length();
        if depth <= 0.0 {
            return Ok(None);
        }
        Ok(Some(offset.try_normalize().unwrap_or(Vec3::Y) * depth))
    }
}

#[derive(Debug, Clone)]
pub struct MockJoint {
    pub position: f32,
    pub target: f32,
    pub lower: f32,
    pub upper: f32,
    pub damping: f32,
    pub drive: DriveForce,
    pub reaction: Vec3,
    pub placement: Option<(Vec3, Vec3, f32)>,
    pub proxy_length: f32,
    pub isolated: bool,
    pub alive: bool,
    /// Snap the position to the target whenever the target changes (ideal drive).
    pub follow_target: bool,
}

impl Default for MockJoint {
    fn default() -> Self {
        Self {
            position: 0.0,
            target: 0.0,
            lower: f32::NEG_INFINITY,
            upper: f32::INFINITY,
            damping: 0.0,
            drive: DriveForce::single(0.0),
            reaction: Vec3::ZERO,
            placement: None,
            proxy_length: 0.0,
            isolated: false,
            alive: true,
            follow_target: true,
        }
    }
}

#[derive(Debug)]
pub struct MockJoints {
    pub joints: Vec<MockJoint>,
    pub gravity: Vec3,
}

impl MockJoints {
    pub fn with_count(count: usize) -> Self {
        Self {
            joints: vec![MockJoint::default(); count],
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }
}

impl JointBackend for MockJoints {
    type Joint = usize;

    fn prismatic_position(&self, joint: usize) -> Option<f32> {
        self.joints.get(joint).filter(|j| j.alive).map(|j| j.position)
    }

    fn place_segment(&mut self, joint: usize, origin: Vec3, direction: Vec3, rest_length: f32) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.placement = Some((origin, direction, rest_length));
            j.position = 0.0;
        }
    }

    fn set_drive_limits(&mut self, joint: usize, lower: f32, upper: f32) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.lower = lower;
            j.upper = upper;
        }
    }

    fn set_drive_target(&mut self, joint: usize, target: f32) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.target = target;
            if j.follow_target {
                j.position = target.clamp(j.lower, j.upper);
            }
        }
    }

    fn set_drive_damping(&mut self, joint: usize, damping: f32) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.damping = damping;
        }
    }

    fn drive_force(&self, joint: usize) -> Option<DriveForce> {
        self.joints.get(joint).filter(|j| j.alive).map(|j| j.drive)
    }

    fn reaction_force(&self, joint: usize) -> Option<Vec3> {
        self.joints.get(joint).filter(|j| j.alive).map(|j| j.reaction)
    }

    fn resize_proxy(&mut self, joint: usize, length: f32, _thickness: f32) {
        if let Some(j) = self.joints.get_mut(joint) {
            j.proxy_length = length;
        }
    }

    fn isolate_rig(&mut self, joints: &[usize]) {
        for &joint in joints {
            if let Some(j) = self.joints.get_mut(joint) {
                j.isolated = true;
            }
        }
    }

    fn gravity(&self) -> Vec3 {
        self.gravity
    }
}
