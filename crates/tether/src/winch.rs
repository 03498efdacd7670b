//! Two-segment winch driven through a pair of prismatic joints.
//!
//! The rope between the mount and the hook is split into a middle segment and an end
//! segment. Each segment is one prismatic joint whose drive target moves by half of the
//! commanded length change, so the two halves shorten and lengthen together.

use crate::error::{check_finite, check_length, ConfigError};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tether_core::{JointBackend, Transform};

/// Winch parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinchConfig {
    /// Maximum length the winch can pay out.
    pub total_length: f32,
    /// Length held back on the drum when settings are applied.
    pub starting_slack: f32,
    /// The winch never reels in below this length.
    pub min_length: f32,
    /// Local direction the rope leaves the mount in.
    pub direction: Vec3,
    pub tension_epsilon: f32,
    pub max_pull_speed: f32,
    /// Half-width of the box proxies wrapped around each segment.
    pub collider_thickness: f32,
    pub drive_damping: f32,
    /// Drive damping while a load hangs on the hook.
    pub loaded_damping: f32,
}

impl Default for WinchConfig {
    fn default() -> Self {
        Self {
            total_length: 5.0,
            starting_slack: 0.0,
            min_length: 0.1,
            direction: Vec3::NEG_Y,
            tension_epsilon: 0.01,
            max_pull_speed: 2.0,
            collider_thickness: 0.1,
            drive_damping: 10.0,
            loaded_damping: 100.0,
        }
    }
}

impl WinchConfig {
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        check_length("winch total", self.total_length)?;
        check_length("winch starting slack", self.starting_slack)?;
        check_length("winch minimum", self.min_length)?;
        self.tension_epsilon = check_finite("tension epsilon", self.tension_epsilon)?.abs();
        self.max_pull_speed = check_finite("max pull speed", self.max_pull_speed)?.abs();
        self.collider_thickness = check_length("collider thickness", self.collider_thickness)?;
        self.drive_damping = check_length("drive damping", self.drive_damping)?;
        self.loaded_damping = check_length("loaded damping", self.loaded_damping)?;
        if self.direction.try_normalize().is_none() {
            log::warn!("Winch direction {:?} is degenerate, using -Y", self.direction);
            self.direction = Vec3::NEG_Y;
        }
        Ok(self)
    }
}

/// The two driven joints of a winch rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinchJoints<J> {
    /// Joint between the mount-side sleeve and the knot.
    pub middle: J,
    /// Joint between the knot-side sleeve and the hook; carries the load.
    pub end: J,
}

impl<J: Copy> WinchJoints<J> {
    pub fn both(&self) -> [J; 2] {
        [self.middle, self.end]
    }
}

/// Diagnostics refreshed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WinchState {
    pub current_length: f32,
    pub target_length: f32,
    /// Per-joint limits relative to the rest placement.
    pub lower_limit: f32,
    pub upper_limit: f32,
    pub tense: bool,
    pub at_minimum: bool,
    /// Magnitude of the drive force on the end joint.
    pub top_load: f32,
    /// Pull speed after saturation, as actually integrated last tick.
    pub applied_speed: f32,
    /// False once the joints stop answering.
    pub live: bool,
}

/// Which ends of its travel a winch has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Saturation {
    /// Fully paid out; can't lengthen.
    pub tense: bool,
    /// At the minimum length; can't shorten.
    pub at_minimum: bool,
}

/// Length controller for a two-segment winch.
#[derive(Debug, Clone)]
pub struct WinchActuator<J> {
    config: WinchConfig,
    joints: WinchJoints<J>,
    mount: Transform,
    /// Commanded speed; positive reels in.
    pull_speed: f32,
    /// Per-joint drive target relative to the rest placement.
    target: f32,
    /// Length paid out by the last `apply_settings`.
    deployed: f32,
    load_enabled: bool,
    state: WinchState,
}

impl<J: Copy> WinchActuator<J> {
    pub fn new(config: WinchConfig, joints: WinchJoints<J>, mount: Transform) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let deployed = config.total_length - config.starting_slack.min(config.total_length);
        Ok(Self {
            config,
            joints,
            mount,
            pull_speed: 0.0,
            target: 0.0,
            deployed,
            load_enabled: false,
            state: WinchState {
                current_length: deployed,
                target_length: deployed,
                live: true,
                ..Default::default()
            },
        })
    }

    /// Lay out both segments for the configured total length and slack.
    ///
    /// Safe to call repeatedly; each call resets the drive target to the rest placement.
    pub fn apply_settings<JB>(&mut self, joints: &mut JB)
    where
        JB: JointBackend<Joint = J>,
    {
        let total = self.config.total_length;
        let mut slack = self.config.starting_slack;
        if slack > total {
            log::warn!("Winch slack {slack} exceeds total length {total}, clamping");
            slack = total;
        }
        let deployed = total - slack;
        let rest = deployed * 0.5;
        self.deployed = deployed;
        self.target = 0.0;
        self.state.lower_limit = -rest;
        self.state.upper_limit = (total - deployed) * 0.5;

        let axis = self.axis();
        let origin = self.mount.position;
        joints.place_segment(self.joints.middle, origin, axis, rest);
        joints.place_segment(self.joints.end, origin + axis * rest, axis, rest);

        let damping = self.damping();
        for joint in self.joints.both() {
            joints.set_drive_limits(joint, self.state.lower_limit, self.state.upper_limit);
            joints.set_drive_target(joint, 0.0);
            joints.set_drive_damping(joint, damping);
            joints.resize_proxy(joint, rest, self.config.collider_thickness);
        }
        joints.isolate_rig(&self.joints.both());

        let Saturation { tense, at_minimum } = self.saturation_at(deployed);
        self.state.current_length = deployed;
        self.state.target_length = deployed;
        self.state.tense = tense;
        self.state.at_minimum = at_minimum;
        self.state.applied_speed = 0.0;
        self.state.live = true;
    }

    /// Advance the drive target by one tick of the pull command.
    pub fn step<JB>(&mut self, dt: f32, joints: &mut JB)
    where
        JB: JointBackend<Joint = J>,
    {
        let (Some(x_mid), Some(x_end)) = (
            joints.prismatic_position(self.joints.middle),
            joints.prismatic_position(self.joints.end),
        ) else {
            if self.state.live {
                log::warn!("Winch joints no longer respond, holding");
            }
            self.state.live = false;
            self.state.applied_speed = 0.0;
            return;
        };
        self.state.live = true;

        let current = self.deployed + x_mid + x_end;
        let Saturation { tense, at_minimum } = self.saturation_at(current);

        let mut applied = self.pull_speed.clamp(-self.config.max_pull_speed, self.config.max_pull_speed);
        if (tense && applied < 0.0) || (at_minimum && applied > 0.0) {
            applied = 0.0;
        }

        self.target = (self.target - applied * 0.5 * dt).clamp(self.state.lower_limit, self.state.upper_limit);
        let damping = self.damping();
        for joint in self.joints.both() {
            joints.set_drive_target(joint, self.target);
            joints.set_drive_damping(joint, damping);
        }

        let rest = self.deployed * 0.5;
        let thickness = self.config.collider_thickness;
        joints.resize_proxy(self.joints.middle, (rest + x_mid).max(0.0), thickness);
        joints.resize_proxy(self.joints.end, (rest + x_end).max(0.0), thickness);

        if let Some(force) = joints.drive_force(self.joints.end) {
            self.state.top_load = force.values().iter().map(|v| v * v).sum::<f32>().sqrt();
        }

        self.state.current_length = current;
        self.state.target_length = self.deployed + 2.0 * self.target;
        self.state.tense = tense;
        self.state.at_minimum = at_minimum;
        self.state.applied_speed = applied;
    }

    /// Set the commanded speed, clamped to the configured maximum. Positive reels in.
    pub fn set_pull_speed(&mut self, speed: f32) {
        let max = self.config.max_pull_speed;
        self.pull_speed = if speed.is_finite() { speed.clamp(-max, max) } else { 0.0 };
    }

    pub fn pull_speed(&self) -> f32 {
        self.pull_speed
    }

    pub fn top_load(&self) -> f32 {
        self.state.top_load
    }

    pub fn is_tense(&self) -> bool {
        self.state.tense
    }

    /// Length as the joints report it right now, before this tick's step.
    pub fn measure_length<JB>(&self, joints: &JB) -> Option<f32>
    where
        JB: JointBackend<Joint = J>,
    {
        let x_mid = joints.prismatic_position(self.joints.middle)?;
        let x_end = joints.prismatic_position(self.joints.end)?;
        Some(self.deployed + x_mid + x_end)
    }

    /// Whether the winch can still pay out or reel in at its measured length. Falls back
    /// to the last tick's state when the joints don't answer.
    pub fn saturation<JB>(&self, joints: &JB) -> Saturation
    where
        JB: JointBackend<Joint = J>,
    {
        match self.measure_length(joints) {
            Some(length) => self.saturation_at(length),
            None => Saturation {
                tense: self.state.tense,
                at_minimum: self.state.at_minimum,
            },
        }
    }

    fn saturation_at(&self, length: f32) -> Saturation {
        let eps = self.config.tension_epsilon;
        Saturation {
            tense: length >= self.config.total_length - eps,
            at_minimum: length <= self.config.min_length + eps,
        }
    }

    pub fn enable_load(&mut self) {
        self.load_enabled = true;
    }

    pub fn disable_load(&mut self) {
        self.load_enabled = false;
    }

    pub fn load_enabled(&self) -> bool {
        self.load_enabled
    }

    /// Turn the mount so the rope leaves it toward `target`. Takes effect on the next
    /// [`apply_settings`](Self::apply_settings).
    pub fn orient_toward(&mut self, target: Vec3) {
        self.mount.aim_axis_at(self.config.direction, target);
    }

    /// Change total length and slack. Takes effect on the next `apply_settings`.
    pub fn set_lengths(&mut self, total_length: f32, starting_slack: f32) -> Result<(), ConfigError> {
        self.config.total_length = check_length("winch total", total_length)?;
        self.config.starting_slack = check_length("winch starting slack", starting_slack)?;
        Ok(())
    }

    pub fn config(&self) -> &WinchConfig {
        &self.config
    }

    pub fn state(&self) -> &WinchState {
        &self.state
    }

    pub fn joints(&self) -> WinchJoints<J> {
        self.joints
    }

    pub fn mount(&self) -> &Transform {
        &self.mount
    }

    /// Length paid out by the last `apply_settings`.
    pub fn deployed_length(&self) -> f32 {
        self.deployed
    }

    /// World-space direction of the rope at the mount.
    pub fn axis(&self) -> Vec3 {
        self.mount
            .transform_direction(self.config.direction)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Y)
    }

    fn damping(&self) -> f32 {
        if self.load_enabled {
            self.config.loaded_damping
        } else {
            self.config.drive_damping
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockJoints;
    use tether_core::DriveForce;

    const DT: f32 = 1.0 / 60.0;

    fn rig(config: WinchConfig) -> (WinchActuator<usize>, MockJoints) {
        let winch = WinchActuator::new(
            config,
            WinchJoints { middle: 0, end: 1 },
            Transform::from_position(Vec3::new(0.0, 10.0, 0.0)),
        )
        .unwrap();
        (winch, MockJoints::with_count(2))
    }

    fn five_with_slack_two() -> WinchConfig {
        WinchConfig {
            total_length: 5.0,
            starting_slack: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn limits_follow_total_and_slack() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);

        assert!((winch.state().lower_limit + 1.5).abs() < 1e-6);
        assert!((winch.state().upper_limit - 1.0).abs() < 1e-6);
        for j in &joints.joints {
            assert!((j.lower + 1.5).abs() < 1e-6);
            assert!((j.upper - 1.0).abs() < 1e-6);
            assert!((j.proxy_length - 1.5).abs() < 1e-6);
            assert!(j.isolated);
        }
    }

    #[test]
    fn segments_are_laid_end_to_end_along_the_axis() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);

        let (mid_origin, mid_dir, mid_rest) = joints.joints[0].placement.unwrap();
        let (end_origin, _, end_rest) = joints.joints[1].placement.unwrap();
        assert_eq!(mid_origin, Vec3::new(0.0, 10.0, 0.0));
        assert!((mid_dir - Vec3::NEG_Y).length() < 1e-6);
        assert!((end_origin - Vec3::new(0.0, 8.5, 0.0)).length() < 1e-5);
        assert!((mid_rest - 1.5).abs() < 1e-6 && (end_rest - 1.5).abs() < 1e-6);
    }

    #[test]
    fn apply_settings_is_idempotent() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);
        let first: Vec<_> = joints.joints.iter().map(|j| (j.lower, j.upper, j.placement)).collect();

        winch.set_pull_speed(1.0);
        for _ in 0..30 {
            winch.step(DT, &mut joints);
        }
        winch.apply_settings(&mut joints);
        let second: Vec<_> = joints.joints.iter().map(|j| (j.lower, j.upper, j.placement)).collect();

        assert_eq!(first, second);
        assert!(joints.joints.iter().all(|j| j.target == 0.0));
    }

    #[test]
    fn positive_speed_reels_in() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);
        winch.set_pull_speed(1.0);
        for _ in 0..60 {
            winch.step(DT, &mut joints);
        }
        assert!((winch.state().target_length - 2.0).abs() < 1e-3);
        assert!(winch.state().current_length < 3.0);
    }

    #[test]
    fn tense_winch_refuses_to_pay_out() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);
        winch.set_pull_speed(-2.0);
        for _ in 0..120 {
            winch.step(DT, &mut joints);
        }
        assert!(winch.is_tense());
        assert_eq!(winch.state().applied_speed, 0.0);
        assert!((winch.state().current_length - 5.0).abs() < 1e-4);
        // The command itself is left alone.
        assert_eq!(winch.pull_speed(), -2.0);
    }

    #[test]
    fn winch_at_minimum_refuses_to_reel_in() {
        let (mut winch, mut joints) = rig(WinchConfig {
            min_length: 1.0,
            ..five_with_slack_two()
        });
        winch.apply_settings(&mut joints);
        winch.set_pull_speed(2.0);
        for _ in 0..120 {
            winch.step(DT, &mut joints);
        }
        let state = winch.state();
        assert!(state.at_minimum);
        assert_eq!(state.applied_speed, 0.0);
        assert!(state.current_length <= 1.01 + 2.0 * DT);
        assert!(state.current_length >= 1.0 - 2.0 * DT);
    }

    #[test]
    fn pull_speed_is_clamped() {
        let (mut winch, _) = rig(WinchConfig::default());
        winch.set_pull_speed(10.0);
        assert_eq!(winch.pull_speed(), 2.0);
        winch.set_pull_speed(-10.0);
        assert_eq!(winch.pull_speed(), -2.0);
        winch.set_pull_speed(f32::NAN);
        assert_eq!(winch.pull_speed(), 0.0);
    }

    #[test]
    fn load_raises_damping() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);
        winch.step(DT, &mut joints);
        assert_eq!(joints.joints[1].damping, 10.0);

        winch.enable_load();
        winch.step(DT, &mut joints);
        assert!(joints.joints.iter().all(|j| j.damping == 100.0));

        winch.disable_load();
        winch.step(DT, &mut joints);
        assert_eq!(joints.joints[0].damping, 10.0);
    }

    #[test]
    fn proxies_track_segment_lengths() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);
        joints.joints[0].position = 0.5;
        joints.joints[1].position = -0.25;
        joints.joints.iter_mut().for_each(|j| j.follow_target = false);
        winch.step(DT, &mut joints);
        assert!((joints.joints[0].proxy_length - 2.0).abs() < 1e-6);
        assert!((joints.joints[1].proxy_length - 1.25).abs() < 1e-6);
        assert!((winch.state().current_length - 3.25).abs() < 1e-6);
    }

    #[test]
    fn top_load_is_end_joint_drive_magnitude() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);
        joints.joints[0].drive = DriveForce::single(99.0);
        joints.joints[1].drive = DriveForce::single(-12.0);
        winch.step(DT, &mut joints);
        assert!((winch.top_load() - 12.0).abs() < 1e-6);
    }

    #[test]
    fn missing_joints_hold_state() {
        let (mut winch, mut joints) = rig(five_with_slack_two());
        winch.apply_settings(&mut joints);
        joints.joints[1].alive = false;
        winch.set_pull_speed(1.0);
        winch.step(DT, &mut joints);
        assert!(!winch.state().live);
        assert_eq!(joints.joints[0].target, 0.0);
    }

    #[test]
    fn orient_toward_turns_the_layout() {
        let (mut winch, mut joints) = rig(WinchConfig::default());
        winch.orient_toward(Vec3::new(10.0, 0.0, 0.0));
        winch.apply_settings(&mut joints);
        let (_, dir, _) = joints.joints[0].placement.unwrap();
        assert!((dir - Vec3::new(1.0, -1.0, 0.0).normalize()).length() < 1e-5);
    }

    #[test]
    fn excess_slack_deploys_nothing() {
        let (mut winch, mut joints) = rig(WinchConfig {
            total_length: 2.0,
            starting_slack: 3.0,
            ..Default::default()
        });
        winch.apply_settings(&mut joints);
        assert_eq!(winch.deployed_length(), 0.0);
        assert_eq!(winch.state().lower_limit, 0.0);
        assert!((winch.state().upper_limit - 1.0).abs() < 1e-6);
    }

    #[test]
    fn negative_length_is_rejected() {
        let config = WinchConfig {
            total_length: -1.0,
            ..Default::default()
        };
        assert!(WinchActuator::new(config, WinchJoints { middle: 0, end: 1 }, Transform::default()).is_err());
    }
}
