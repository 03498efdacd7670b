//! The demo harbour: a moored buoy, a lift winch handing cargo over to a pulley rig.

use crate::config::SimConfig;
use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use tether::{
    HandoverTargets, LoadHandover, LoadSensor, LoadSource, PulleyBalancer, PulleyTargets, RopeSolver,
    WinchActuator,
};
use tether_core::{BodyBackend, FlatSurface};
use tether_physics::{
    CollisionGroup, ColliderHandle, ImpulseJointHandle, PhysicsWorld, RigidBodyHandle, WinchRig,
    WinchRigConfig,
};

/// Linear drag on the buoy while it sits in the water.
const WATER_DRAG: f32 = 2.0;
/// Gap between a hook and the top of the load hanging from it.
const HOOK_CLEARANCE: f32 = 0.15;

/// One line of diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub tick: u64,
    pub mooring_length: f32,
    pub buoy: Vec3,
    pub lift_length: f32,
    pub handed_over: bool,
    pub load_one: f32,
    pub load_two: f32,
    pub pulley_speed: f32,
    pub length_one: f32,
    pub length_two: f32,
}

pub struct Scene {
    pub physics: PhysicsWorld,
    water: FlatSurface,
    buoy: RigidBodyHandle,
    buoy_radius: f32,
    buoy_lift: f32,
    mooring: RopeSolver<RigidBodyHandle>,

    lift: WinchActuator<ImpulseJointHandle>,
    lift_speed: f32,
    cargo_collider: ColliderHandle,
    guide_rope: RopeSolver<RigidBodyHandle>,
    trigger: ColliderHandle,
    cargo_inside: bool,
    handover: LoadHandover<ColliderHandle>,

    pulley: PulleyBalancer<ImpulseJointHandle>,
    pulley_rigs: [WinchRig; 2],
    pulley_loads: [RigidBodyHandle; 2],
    /// Distance from a pulley hook down to its load's centre.
    load_drop: f32,
    pulley_active: bool,
    tick: u64,
}

impl Scene {
    pub fn build(config: &SimConfig) -> Result<Self> {
        let mut physics = PhysicsWorld::new(config.gravity);
        physics.add_ground_plane(config.seabed_height);

        // Mooring: pier anchor and a floating buoy.
        let pier = physics.new_assembly();
        let anchor = physics.add_fixed_body(config.anchor, pier);
        let buoy_assembly = physics.new_assembly();
        let buoy = physics.add_dynamic_body(config.buoy, buoy_assembly);
        physics.add_sphere_collider(buoy, config.buoy_radius, 100.0, CollisionGroup::Body);
        let mooring = RopeSolver::new(config.mooring.clone(), Some(anchor), Some(buoy), &physics)
            .context("mooring rope")?;

        // Lift winch with cargo on a guide rope, sitting in the handover volume.
        let lift_assembly = physics.new_assembly();
        let lift_mount = physics.add_fixed_body(config.lift_mount, lift_assembly);
        let lift_rig = physics.build_winch_rig(lift_mount, &WinchRigConfig::default());
        let mut lift = physics
            .winch_actuator(&lift_rig, config.lift_winch.clone())
            .context("lift winch")?;
        lift.apply_settings(&mut physics);
        let (cargo, cargo_collider) = hang_load(&mut physics, &lift_rig, config.cargo_half_extent, 200.0);
        let cargo_start = physics.body_state(cargo).map_or(config.lift_mount, |s| s.position);
        let trigger = physics.add_trigger_sphere(cargo_start, config.trigger_radius);
        let post = physics.add_fixed_body(config.guide_post, pier);
        let guide_rope = RopeSolver::new(config.guide_rope.clone(), Some(post), Some(cargo), &physics)
            .context("guide rope")?;

        // Pulley rig. Laid out by the handover.
        let spread = Vec3::X * config.pulley_spread;
        let mut rigs = Vec::with_capacity(2);
        let mut winches = Vec::with_capacity(2);
        for offset in [-spread, spread] {
            let assembly = physics.new_assembly();
            let mount = physics.add_fixed_body(config.pulley_origin + offset, assembly);
            let rig = physics.build_winch_rig(mount, &WinchRigConfig::default());
            winches.push(
                physics
                    .winch_actuator(&rig, config.pulley_winch.clone())
                    .context("pulley winch")?,
            );
            rigs.push(rig);
        }
        let pulley_rigs = [rigs[0], rigs[1]];
        let two = winches.pop().context("pulley winch two")?;
        let one = winches.pop().context("pulley winch one")?;
        let sensor = |rig: &WinchRig| {
            Some(LoadSensor::new(
                config.load_sensor,
                Some(LoadSource::DrivenJoint(rig.joints.end)),
            ))
        };
        let mut pulley = PulleyBalancer::new(config.pulley.clone(), one, two)
            .context("pulley")?
            .with_sensors(sensor(&pulley_rigs[0]), sensor(&pulley_rigs[1]));
        pulley.set_targets(Some(PulleyTargets {
            origin: config.pulley_origin,
            one: config.load_target_one,
            two: config.load_target_two,
        }));
        let (load_one, _) = hang_load(
            &mut physics,
            &pulley_rigs[0],
            config.load_half_extent,
            config.load_density_one,
        );
        let (load_two, _) = hang_load(
            &mut physics,
            &pulley_rigs[1],
            config.load_half_extent,
            config.load_density_two,
        );

        physics.update_query_pipeline();
        log::info!(
            "Scene ready: mooring {:.1} m, lift {:.1} m, pulley rope {:.1} m",
            mooring.config().length,
            lift.deployed_length(),
            pulley.config().total_rope_length
        );

        lift.set_pull_speed(config.lift_speed);
        Ok(Self {
            physics,
            water: FlatSurface {
                height: config.water_height,
            },
            buoy,
            buoy_radius: config.buoy_radius,
            buoy_lift: config.buoy_lift,
            mooring,
            lift,
            lift_speed: config.lift_speed,
            cargo_collider,
            guide_rope,
            trigger,
            cargo_inside: false,
            handover: LoadHandover::new(cargo_collider),
            pulley,
            pulley_rigs,
            pulley_loads: [load_one, load_two],
            load_drop: config.load_half_extent + HOOK_CLEARANCE,
            pulley_active: false,
            tick: 0,
        })
    }

    /// Advance every component by one fixed tick, then the physics world.
    pub fn tick(&mut self, dt: f32) {
        if self.pulley_active {
            self.pulley.step(dt, &mut self.physics);
        }
        self.lift.step(dt, &mut self.physics);
        self.mooring.step(dt, &mut self.physics, Some(&self.water));
        self.guide_rope.step(dt, &mut self.physics, None);
        self.float_buoy();
        self.physics.step(dt);
        self.tick += 1;
        self.check_trigger();
    }

    fn float_buoy(&mut self) {
        let Some(state) = self.physics.body_state(self.buoy) else {
            return;
        };
        let bottom = state.position.y - self.buoy_radius;
        let depth = (self.water.height - bottom).clamp(0.0, 2.0 * self.buoy_radius);
        if depth <= 0.0 {
            return;
        }
        let force = Vec3::Y * self.buoy_lift * depth - state.linear_velocity * WATER_DRAG;
        self.physics.apply_force_at_point(self.buoy, force, state.position);
    }

    fn check_trigger(&mut self) {
        let inside = self.physics.is_intersecting(self.trigger, self.cargo_collider);
        let exited = self.cargo_inside && !inside;
        self.cargo_inside = inside;
        if !exited {
            return;
        }
        let targets = HandoverTargets {
            rope: &mut self.guide_rope,
            pulley: &mut self.pulley,
            winch: &mut self.lift,
        };
        if self.handover.on_trigger_exit(self.cargo_collider, targets, &mut self.physics) {
            self.pulley_active = true;
            self.lift.set_pull_speed(self.lift_speed * 0.5);
            for (rig, load) in self.pulley_rigs.iter().zip(self.pulley_loads) {
                if let Some(hook) = self.physics.body_state(rig.hook) {
                    let position = hook.position - Vec3::Y * self.load_drop;
                    self.physics.set_body_pose(load, position, Quat::IDENTITY);
                }
            }
        }
    }

    pub fn report(&self) -> Report {
        let state = self.pulley.state();
        Report {
            tick: self.tick,
            mooring_length: self.mooring.current_length(),
            buoy: self.physics.body_state(self.buoy).map_or(Vec3::ZERO, |s| s.position),
            lift_length: self.lift.state().current_length,
            handed_over: self.pulley_active,
            load_one: state.load_one,
            load_two: state.load_two,
            pulley_speed: state.speed,
            length_one: self.pulley.one().state().current_length,
            length_two: self.pulley.two().state().current_length,
        }
    }
}

/// Hang a box load from a rig's hook with a ball joint.
fn hang_load(
    physics: &mut PhysicsWorld,
    rig: &WinchRig,
    half_extent: f32,
    density: f32,
) -> (RigidBodyHandle, ColliderHandle) {
    let hook = physics.body_state(rig.hook).map_or(Vec3::ZERO, |s| s.position);
    let offset = Vec3::new(0.0, -(half_extent + HOOK_CLEARANCE), 0.0);
    let assembly = physics.new_assembly();
    let load = physics.add_dynamic_body(hook + offset, assembly);
    let collider = physics.add_box_collider(load, Vec3::splat(half_extent), density, CollisionGroup::Load);
    physics.add_spherical_joint(rig.hook, load, Vec3::ZERO, -offset);
    (load, collider)
}
