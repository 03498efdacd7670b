//! Force readout from a joint, optionally filtered and smoothed.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tether_core::JointBackend;

/// Where a sensor reads its force from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource<J> {
    /// Drive force of a joint with exactly one driven DOF.
    DrivenJoint(J),
    /// Magnitude of a joint's constraint reaction force.
    Joint(J),
}

/// How successive raw readings are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Smoothing {
    Instant,
    /// Mean of the last `window` readings.
    MovingAverage { window: usize },
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::MovingAverage { window: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSensorConfig {
    /// Report negative (pushing) forces as zero.
    pub positive_only: bool,
    pub smoothing: Smoothing,
}

impl Default for LoadSensorConfig {
    fn default() -> Self {
        Self {
            positive_only: true,
            smoothing: Smoothing::default(),
        }
    }
}

/// Latest output of a [`LoadSensor`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadReading {
    pub force: f32,
    /// `force / |g|`.
    pub weight: f32,
    /// False when the last update could not read the source.
    pub ok: bool,
}

#[derive(Debug, Clone)]
pub struct LoadSensor<J> {
    config: LoadSensorConfig,
    source: Option<LoadSource<J>>,
    history: VecDeque<f32>,
    reading: LoadReading,
    warned_multi_dof: bool,
}

impl<J: Copy> LoadSensor<J> {
    pub fn new(config: LoadSensorConfig, source: Option<LoadSource<J>>) -> Self {
        Self {
            config,
            source,
            history: VecDeque::new(),
            reading: LoadReading::default(),
            warned_multi_dof: false,
        }
    }

    /// Swap the source and forget old readings.
    pub fn set_source(&mut self, source: Option<LoadSource<J>>) {
        self.source = source;
        self.history.clear();
        self.reading = LoadReading::default();
        self.warned_multi_dof = false;
    }

    /// Sample the source once. A failed sample keeps the previous force and weight.
    pub fn update<JB>(&mut self, joints: &JB) -> LoadReading
    where
        JB: JointBackend<Joint = J>,
    {
        let raw = match self.source {
            None => None,
            Some(LoadSource::Joint(joint)) => joints.reaction_force(joint).map(|f| f.length()),
            Some(LoadSource::DrivenJoint(joint)) => joints.drive_force(joint).and_then(|f| {
                let single = f.single_dof();
                if single.is_none() && !self.warned_multi_dof {
                    log::warn!(
                        "Load sensor source has {} driven DOFs, expected exactly one",
                        f.dof_count()
                    );
                    self.warned_multi_dof = true;
                }
                single
            }),
        };

        let Some(mut force) = raw else {
            self.reading.ok = false;
            return self.reading;
        };
        if self.config.positive_only {
            force = force.max(0.0);
        }

        let force = match self.config.smoothing {
            Smoothing::Instant => force,
            Smoothing::MovingAverage { window } => {
                self.history.push_back(force);
                while self.history.len() > window.max(1) {
                    self.history.pop_front();
                }
                self.history.iter().sum::<f32>() / self.history.len() as f32
            }
        };

        let g = joints.gravity().length();
        self.reading = LoadReading {
            force,
            weight: if g > 0.0 { force / g } else { 0.0 },
            ok: true,
        };
        self.reading
    }

    pub fn reading(&self) -> LoadReading {
        self.reading
    }

    pub fn force(&self) -> f32 {
        self.reading.force
    }

    pub fn weight(&self) -> f32 {
        self.reading.weight
    }

    pub fn ok(&self) -> bool {
        self.reading.ok
    }

    pub fn config(&self) -> &LoadSensorConfig {
        &self.config
    }
}
