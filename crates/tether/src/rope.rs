//! Flexible rope between two optional rigid-body endpoints.
//!
//! Nodes are advanced with damped Verlet integration, then relaxed toward their rest
//! spacing for a fixed number of iterations per tick. Attached ends are pinned to their
//! bodies during relaxation, and afterwards each body is pulled toward its end node in
//! proportion to how far the chain has stretched away from it. That pull is the only
//! coupling back into the rigid-body world.

use crate::error::{check_finite, check_length, ConfigError};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;
use tether_core::{
    look_rotation, BodyBackend, BodyState, CollisionWorld, NodeInstanceRaw, QueryError,
    SurfaceQuery, Transform,
};

/// Stretch (m) to force (N) scale applied before the pull multiplier.
const END_PULL_SCALE: f32 = 100.0;
/// Extra probe radius so resting contacts are still picked up.
const PROBE_MARGIN: f32 = 0.01;
const MIN_SEGMENTS: usize = 2;

/// How a distance correction is shared between the two nodes of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CorrectionSplit {
    /// Both nodes move half of the correction.
    #[default]
    Equal,
    /// On the two end segments, a pinned node moves by `node_mass / (node_mass + body_mass)`
    /// of the correction and the free node takes the rest. Fixed bodies (mass 0) never move.
    MassWeighted { node_mass: f32 },
}

/// Rope parameters. Call [`RopeConfig::validate`] (or go through [`RopeSolver::new`])
/// before using a hand-built config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RopeConfig {
    /// Rest length of the whole rope.
    pub length: f32,
    /// Number of nodes, at least 2.
    pub segment_count: usize,
    /// Radius of the sphere used to test each node against the environment.
    pub node_collider_radius: f32,
    /// Downward acceleration. Works best low.
    pub gravity_strength: f32,
    /// Fraction of velocity kept each tick, in [0, 1].
    pub velocity_dampen: f32,
    /// Fraction of each distance error corrected per iteration, in [0, 0.99].
    pub stiffness: f32,
    /// Run a collision pass on every n-th relaxation iteration.
    pub collision_stride: usize,
    /// Relaxation iterations per tick.
    pub iterations: usize,
    /// Colliders considered per node per collision pass.
    pub collider_buffer_size: usize,
    /// Gain on the force pulling attached bodies toward their end nodes.
    pub pull_multiplier: f32,
    /// Keep nodes at or above the surface when one is supplied.
    pub float_on_surface: bool,
    pub correction: CorrectionSplit,
}

impl Default for RopeConfig {
    fn default() -> Self {
        Self {
            length: 1.0,
            segment_count: 10,
            node_collider_radius: 0.2,
            gravity_strength: 2.0,
            velocity_dampen: 0.95,
            stiffness: 0.8,
            collision_stride: 1,
            iterations: 100,
            collider_buffer_size: 1,
            pull_multiplier: 0.8,
            float_on_surface: true,
            correction: CorrectionSplit::Equal,
        }
    }
}

impl RopeConfig {
    /// Clamp recoverable values into range and reject the rest.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        check_length("rope", self.length)?;
        check_finite("gravity strength", self.gravity_strength)?;
        check_finite("pull multiplier", self.pull_multiplier)?;
        if self.segment_count < MIN_SEGMENTS {
            log::warn!(
                "Rope segment count {} is below {}, clamping",
                self.segment_count,
                MIN_SEGMENTS
            );
            self.segment_count = MIN_SEGMENTS;
        }
        if let CorrectionSplit::MassWeighted { node_mass } = self.correction {
            if !(node_mass.is_finite() && node_mass > 0.0) {
                return Err(ConfigError::InvalidNodeMass(node_mass));
            }
        }
        self.node_collider_radius = check_length("node collider radius", self.node_collider_radius)?;
        self.velocity_dampen = check_finite("velocity dampen", self.velocity_dampen)?.clamp(0.0, 1.0);
        self.stiffness = check_finite("stiffness", self.stiffness)?.clamp(0.0, 0.99);
        self.collision_stride = self.collision_stride.max(1);
        self.collider_buffer_size = self.collider_buffer_size.max(1);
        Ok(self)
    }

    /// Rest distance between neighbouring nodes.
    pub fn node_distance(&self) -> f32 {
        self.length / (self.segment_count.max(MIN_SEGMENTS) - 1) as f32
    }
}

/// One point of the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RopeNode {
    pub position: Vec3,
    /// Position at the start of the previous tick; velocity is derived from it.
    pub previous: Vec3,
    pub rotation: Quat,
}

impl RopeNode {
    fn at(position: Vec3) -> Self {
        Self {
            position,
            previous: position,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Verlet rope attached to up to two bodies of type `B`.
#[derive(Debug, Clone)]
pub struct RopeSolver<B> {
    config: RopeConfig,
    start: Option<B>,
    end: Option<B>,
    nodes: Vec<RopeNode>,
    enabled: bool,
    current_length: f32,
    collisions_reported_down: bool,
}

impl<B: Copy + Eq + std::fmt::Debug> RopeSolver<B> {
    /// Validate `config` and seed the nodes between the endpoints as they are now.
    pub fn new<W>(
        config: RopeConfig,
        start: Option<B>,
        end: Option<B>,
        world: &W,
    ) -> Result<Self, ConfigError>
    where
        W: BodyBackend<Body = B>,
    {
        let mut rope = Self {
            config: config.validate()?,
            start,
            end,
            nodes: Vec::new(),
            enabled: true,
            current_length: 0.0,
            collisions_reported_down: false,
        };
        rope.reseed(world);
        Ok(rope)
    }

    /// Replace the configuration and rebuild the node array.
    pub fn configure<W>(&mut self, config: RopeConfig, world: &W) -> Result<(), ConfigError>
    where
        W: BodyBackend<Body = B>,
    {
        self.config = config.validate()?;
        self.reseed(world);
        Ok(())
    }

    /// Change the endpoints and rebuild the node array.
    pub fn attach<W>(&mut self, start: Option<B>, end: Option<B>, world: &W)
    where
        W: BodyBackend<Body = B>,
    {
        self.start = start;
        self.end = end;
        self.reseed(world);
    }

    /// Lay the nodes out on the line between both endpoints, or hanging straight down
    /// from whichever endpoint exists, or from the origin.
    fn reseed<W>(&mut self, world: &W)
    where
        W: BodyBackend<Body = B>,
    {
        let count = self.config.segment_count.max(MIN_SEGMENTS);
        let spacing = self.config.node_distance();
        let start = self.start.and_then(|b| world.body_state(b)).map(|s| s.position);
        let end = self.end.and_then(|b| world.body_state(b)).map(|s| s.position);
        let last = (count - 1) as f32;

        self.nodes = (0..count)
            .map(|i| {
                let position = match (start, end) {
                    (Some(a), Some(b)) => a.lerp(b, i as f32 / last),
                    (Some(a), None) => a - Vec3::Y * spacing * i as f32,
                    (None, Some(b)) => b - Vec3::Y * spacing * (last - i as f32),
                    (None, None) => -Vec3::Y * spacing * i as f32,
                };
                RopeNode::at(position)
            })
            .collect();
        self.update_rotations();
        self.current_length = self.measure_length();
    }

    /// Advance one fixed tick. Does nothing while disabled.
    pub fn step<W>(&mut self, dt: f32, world: &mut W, surface: Option<&dyn SurfaceQuery>)
    where
        W: CollisionWorld<Body = B>,
    {
        if !self.enabled {
            return;
        }

        let start = self.start.and_then(|b| world.body_state(b).map(|s| (b, s)));
        let end = self.end.and_then(|b| world.body_state(b).map(|s| (b, s)));

        self.integrate(dt);
        if self.config.float_on_surface {
            if let Some(surface) = surface {
                self.clamp_to_surface(surface);
            }
        }

        let exclude: Vec<B> = start.iter().chain(end.iter()).map(|(b, _)| *b).collect();
        let mut hits = Vec::with_capacity(self.config.collider_buffer_size);
        let mut collisions_live = true;

        for iteration in 0..self.config.iterations {
            self.pin(start.map(|(_, s)| s.position), end.map(|(_, s)| s.position));
            self.relax(start.map(|(_, s)| s.mass), end.map(|(_, s)| s.mass));

            if collisions_live && iteration % self.config.collision_stride == 0 {
                if let Err(err) = self.resolve_collisions(world, &exclude, &mut hits) {
                    if !self.collisions_reported_down {
                        log::debug!("Rope collision correction skipped: {}", err);
                        self.collisions_reported_down = true;
                    }
                    collisions_live = false;
                }
            }
        }
        if collisions_live {
            self.collisions_reported_down = false;
        }

        self.pull_on_ends(world, start, end);
        self.update_rotations();
        self.current_length = self.measure_length();
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = Vec3::new(0.0, -self.config.gravity_strength, 0.0);
        let dampen = self.config.velocity_dampen;
        for node in &mut self.nodes {
            let velocity = (node.position - node.previous) * dampen;
            node.previous = node.position;
            node.position += velocity + gravity * dt;
        }
    }

    fn clamp_to_surface(&mut self, surface: &dyn SurfaceQuery) {
        for node in &mut self.nodes {
            if let Some(height) = surface.surface_height(node.position.x, node.position.z) {
                if node.position.y < height {
                    node.position.y = height;
                }
            }
        }
    }

    fn pin(&mut self, start: Option<Vec3>, end: Option<Vec3>) {
        if let Some(position) = start {
            self.nodes[0].position = position;
        }
        if let Some(position) = end {
            let last = self.nodes.len() - 1;
            self.nodes[last].position = position;
        }
    }

    /// One pass of distance constraints over every adjacent pair.
    fn relax(&mut self, start_mass: Option<f32>, end_mass: Option<f32>) {
        let spacing = self.config.node_distance();
        let stiffness = self.config.stiffness;
        let last_segment = self.nodes.len() - 2;

        for i in 0..=last_segment {
            let separation = self.nodes[i].position - self.nodes[i + 1].position;
            let current = separation.length();
            // Positive when stretched; the normalized direction is zero for coincident nodes.
            let total = separation.normalize_or_zero() * (current - spacing) * stiffness;

            let (mut move_first, mut move_second) = (total * 0.5, total * 0.5);
            if let CorrectionSplit::MassWeighted { node_mass } = self.config.correction {
                let first = start_mass.filter(|_| i == 0).map(|m| pinned_share(node_mass, m));
                let second = end_mass.filter(|_| i == last_segment).map(|m| pinned_share(node_mass, m));
                match (first, second) {
                    // A single segment pinned at both ends: split between the two bodies.
                    (Some(a), Some(b)) => {
                        let sum = a + b;
                        let (a, b) = if sum > 0.0 { (a / sum, b / sum) } else { (0.0, 0.0) };
                        move_first = total * a;
                        move_second = total * b;
                    }
                    (Some(a), None) => {
                        move_first = total * a;
                        move_second = total - move_first;
                    }
                    (None, Some(b)) => {
                        move_second = total * b;
                        move_first = total - move_second;
                    }
                    (None, None) => {}
                }
            }

            self.nodes[i].position -= move_first;
            self.nodes[i + 1].position += move_second;
        }
    }

    /// Push odd-indexed nodes out of whatever they overlap.
    fn resolve_collisions<W>(
        &mut self,
        world: &W,
        exclude: &[B],
        hits: &mut Vec<W::Collider>,
    ) -> Result<(), QueryError>
    where
        W: CollisionWorld<Body = B>,
    {
        let radius = self.config.node_collider_radius;
        let max_hits = self.config.collider_buffer_size;

        for i in (1..self.nodes.len()).step_by(2) {
            world.overlap_sphere(self.nodes[i].position, radius + PROBE_MARGIN, exclude, max_hits, hits)?;
            for &collider in hits.iter() {
                match world.penetration(self.nodes[i].position, radius, collider) {
                    Ok(Some(push)) => self.nodes[i].position += push,
                    Ok(None) | Err(QueryError::UnsupportedShape) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    fn pull_on_ends<W>(&self, world: &mut W, start: Option<(B, BodyState)>, end: Option<(B, BodyState)>)
    where
        W: BodyBackend<Body = B>,
    {
        let last = self.nodes.len() - 1;
        for (this, node, other) in [(start, 0, end), (end, last, start)] {
            let Some((body, state)) = this else {
                continue;
            };
            let ratio = other.map_or(1.0, |(_, o)| pull_ratio(state.mass, o.mass));
            let node_position = self.nodes[node].position;
            let offset = node_position - state.position;
            let force = offset.normalize_or_zero()
                * offset.length()
                * ratio
                * self.config.pull_multiplier
                * END_PULL_SCALE;
            if force != Vec3::ZERO {
                world.apply_force_at_point(body, force, node_position);
            }
        }
    }

    /// Aim each node along the chain, rolling every second link by 90° so instanced
    /// chain links interlock.
    fn update_rotations(&mut self) {
        for i in 0..self.nodes.len() - 1 {
            let direction = (self.nodes[i + 1].position - self.nodes[i].position).normalize_or_zero();
            if direction == Vec3::ZERO {
                continue;
            }
            let mut rotation = look_rotation(direction, Vec3::X);
            if i == 0 {
                self.nodes[0].rotation = rotation;
            }
            if i % 2 == 0 && i != 0 {
                rotation *= Quat::from_rotation_z(FRAC_PI_2);
            }
            self.nodes[i + 1].rotation = rotation;
        }
    }

    fn measure_length(&self) -> f32 {
        self.nodes
            .windows(2)
            .map(|pair| pair[0].position.distance(pair[1].position))
            .sum()
    }

    pub fn config(&self) -> &RopeConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[RopeNode] {
        &self.nodes
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.nodes.iter().map(|n| n.position)
    }

    /// Sum of distances between consecutive nodes after the last tick.
    pub fn current_length(&self) -> f32 {
        self.current_length
    }

    pub fn node_distance(&self) -> f32 {
        self.config.node_distance()
    }

    pub fn start(&self) -> Option<B> {
        self.start
    }

    pub fn end(&self) -> Option<B> {
        self.end
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Per-node model matrices for instanced link drawing.
    pub fn instances(&self) -> Vec<NodeInstanceRaw> {
        self.nodes
            .iter()
            .map(|n| Transform::from_position_rotation(n.position, n.rotation).into())
            .collect()
    }
}

/// Share of the stretch force that goes to the body of mass `this` when the other end has mass `other`.
pub fn pull_ratio(this: f32, other: f32) -> f32 {
    let total = this + other;
    if total > 0.0 {
        this / total
    } else {
        0.5
    }
}

/// Fraction of a correction a node pinned to a body of `body_mass` moves by.
fn pinned_share(node_mass: f32, body_mass: f32) -> f32 {
    if body_mass > 0.0 {
        node_mass / (node_mass + body_mass)
    } else {
        0.0
    }
}
