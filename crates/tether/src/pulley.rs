//! One rope shared between two winches over a pulley.
//!
//! The balancer never moves anything itself. Each tick it compares the loads on both
//! sides and commands equal and opposite pull speeds, so whatever one winch pays out the
//! other reels in.

use crate::error::{check_finite, check_length, ConfigError};
use crate::load_sensor::LoadSensor;
use crate::winch::WinchActuator;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tether_core::JointBackend;

/// How the rope is split between the two winches when settings are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Apportion {
    #[default]
    Equal,
    /// Winch one gets the distance from the pulley to its load, winch two the rest.
    ByLoadDistance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulleyConfig {
    pub total_rope_length: f32,
    /// Speed commanded while one side outweighs the other.
    pub balance_speed: f32,
    pub apportion: Apportion,
}

impl Default for PulleyConfig {
    fn default() -> Self {
        Self {
            total_rope_length: 10.0,
            balance_speed: 0.5,
            apportion: Apportion::Equal,
        }
    }
}

/// Pulley position and where each side's load hangs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulleyTargets {
    pub origin: Vec3,
    pub one: Vec3,
    pub two: Vec3,
}

/// Decision of the last tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PulleyState {
    pub load_one: f32,
    pub load_two: f32,
    pub tense_one: bool,
    pub tense_two: bool,
    pub one_pulls: bool,
    pub two_pulls: bool,
    pub speed: f32,
}

#[derive(Debug, Clone)]
pub struct PulleyBalancer<J> {
    config: PulleyConfig,
    one: WinchActuator<J>,
    two: WinchActuator<J>,
    sensor_one: Option<LoadSensor<J>>,
    sensor_two: Option<LoadSensor<J>>,
    targets: Option<PulleyTargets>,
    state: PulleyState,
}

impl<J: Copy> PulleyBalancer<J> {
    pub fn new(config: PulleyConfig, one: WinchActuator<J>, two: WinchActuator<J>) -> Result<Self, ConfigError> {
        check_length("pulley rope", config.total_rope_length)?;
        let balance_speed = check_finite("balance speed", config.balance_speed)?.abs();
        Ok(Self {
            config: PulleyConfig { balance_speed, ..config },
            one,
            two,
            sensor_one: None,
            sensor_two: None,
            targets: None,
            state: PulleyState::default(),
        })
    }

    /// Read loads from these sensors instead of the winches' own drive forces.
    pub fn with_sensors(mut self, one: Option<LoadSensor<J>>, two: Option<LoadSensor<J>>) -> Self {
        self.sensor_one = one;
        self.sensor_two = two;
        self
    }

    pub fn set_targets(&mut self, targets: Option<PulleyTargets>) {
        self.targets = targets;
    }

    /// Split the rope between both winches and lay them out.
    pub fn apply_settings<JB>(&mut self, joints: &mut JB)
    where
        JB: JointBackend<Joint = J>,
    {
        let total = self.config.total_rope_length;
        let (deployed_one, deployed_two) = match (self.config.apportion, self.targets) {
            (Apportion::ByLoadDistance, Some(t)) => {
                let one = (t.origin - t.one).length().max(self.one.config().min_length).min(total);
                let two = (total - one).max(self.two.config().min_length).min(total);
                (one, two)
            }
            (Apportion::ByLoadDistance, None) => {
                log::warn!("Pulley has no load targets, splitting the rope equally");
                (total * 0.5, total * 0.5)
            }
            (Apportion::Equal, _) => (total * 0.5, total * 0.5),
        };

        if let Some(t) = self.targets {
            self.one.orient_toward(t.one);
            self.two.orient_toward(t.two);
        }

        for (winch, deployed) in [(&mut self.one, deployed_one), (&mut self.two, deployed_two)] {
            if let Err(e) = winch.set_lengths(total, total - deployed) {
                log::warn!("Pulley could not set winch lengths: {e}");
                continue;
            }
            winch.apply_settings(joints);
        }
        log::debug!("Pulley split {total} into {deployed_one} / {deployed_two}");
    }

    /// Decide the balancing direction, command both winches and step them.
    pub fn step<JB>(&mut self, dt: f32, joints: &mut JB)
    where
        JB: JointBackend<Joint = J>,
    {
        let load_one = side_load(&mut self.sensor_one, &self.one, joints);
        let load_two = side_load(&mut self.sensor_two, &self.two, joints);
        let one_at = self.one.saturation(joints);
        let two_at = self.two.saturation(joints);
        let (tense_one, tense_two) = (one_at.tense, two_at.tense);

        // Moving only one side would change the total, so both ends must have room.
        let one_pulls = !tense_one && !two_at.at_minimum && load_one > load_two;
        let two_pulls = !tense_two && !one_at.at_minimum && load_two > load_one;
        let s = self
            .config
            .balance_speed
            .min(self.one.config().max_pull_speed)
            .min(self.two.config().max_pull_speed);
        let speed = if one_pulls {
            s
        } else if two_pulls {
            -s
        } else {
            0.0
        };

        self.one.set_pull_speed(-speed);
        self.two.set_pull_speed(speed);
        self.one.step(dt, joints);
        self.two.step(dt, joints);

        self.state = PulleyState {
            load_one,
            load_two,
            tense_one,
            tense_two,
            one_pulls,
            two_pulls,
            speed,
        };
    }

    pub fn state(&self) -> &PulleyState {
        &self.state
    }

    pub fn config(&self) -> &PulleyConfig {
        &self.config
    }

    pub fn one(&self) -> &WinchActuator<J> {
        &self.one
    }

    pub fn two(&self) -> &WinchActuator<J> {
        &self.two
    }
}

/// Sensor force when the sensor read cleanly, else the winch's own top load.
fn side_load<J, JB>(sensor: &mut Option<LoadSensor<J>>, winch: &WinchActuator<J>, joints: &JB) -> f32
where
    J: Copy,
    JB: JointBackend<Joint = J>,
{
    match sensor {
        Some(sensor) => {
            let reading = sensor.update(joints);
            if reading.ok {
                reading.force
            } else {
                winch.top_load()
            }
        }
        None => winch.top_load(),
    }
}
