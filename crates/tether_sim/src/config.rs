//! Simulation configuration. Loaded from sim.ron at startup.

use anyhow::Context;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tether::{LoadSensorConfig, PulleyConfig, RopeConfig, WinchConfig};

/// Scene layout and component settings. Loaded from `sim.ron` in the current directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated seconds to run.
    pub duration: f32,
    /// Fixed tick rate in Hz.
    pub tick_rate: f64,
    /// Ticks between diagnostic reports.
    pub report_every: u64,
    pub gravity: Vec3,
    /// Height of the calm water surface the mooring rope floats on.
    pub water_height: f32,
    pub seabed_height: f32,

    /// Fixed mooring point on the pier.
    pub anchor: Vec3,
    /// Start position of the moored buoy.
    pub buoy: Vec3,
    pub buoy_radius: f32,
    /// Upward force per metre of buoy submersion.
    pub buoy_lift: f32,
    pub mooring: RopeConfig,

    /// Where the cargo hangs from the lift winch before the handover.
    pub lift_mount: Vec3,
    pub lift_winch: WinchConfig,
    /// Reel-in speed of the lift winch.
    pub lift_speed: f32,
    /// Fixed post the guide rope runs to.
    pub guide_post: Vec3,
    pub guide_rope: RopeConfig,
    pub cargo_half_extent: f32,
    /// Radius of the volume the cargo must leave to start the handover.
    pub trigger_radius: f32,

    pub pulley_origin: Vec3,
    /// Spacing of the two winch mounts either side of the pulley.
    pub pulley_spread: f32,
    pub pulley: PulleyConfig,
    pub pulley_winch: WinchConfig,
    pub load_sensor: LoadSensorConfig,
    /// Where each side's load should hang.
    pub load_target_one: Vec3,
    pub load_target_two: Vec3,
    pub load_density_one: f32,
    pub load_density_two: f32,
    pub load_half_extent: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration: 20.0,
            tick_rate: 60.0,
            report_every: 60,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            water_height: 0.0,
            seabed_height: -6.0,

            anchor: Vec3::new(0.0, 1.5, 0.0),
            buoy: Vec3::new(5.0, 0.0, 0.0),
            buoy_radius: 0.5,
            buoy_lift: 60.0,
            mooring: RopeConfig {
                length: 6.0,
                segment_count: 16,
                ..Default::default()
            },

            lift_mount: Vec3::new(-6.0, 8.0, 0.0),
            lift_winch: WinchConfig {
                total_length: 6.0,
                starting_slack: 1.0,
                ..Default::default()
            },
            lift_speed: 0.5,
            guide_post: Vec3::new(-6.0, 0.0, 4.0),
            guide_rope: RopeConfig {
                length: 5.0,
                segment_count: 12,
                ..Default::default()
            },
            cargo_half_extent: 0.3,
            trigger_radius: 1.0,

            pulley_origin: Vec3::new(8.0, 9.0, 0.0),
            pulley_spread: 0.3,
            pulley: PulleyConfig {
                total_rope_length: 10.0,
                ..Default::default()
            },
            pulley_winch: WinchConfig::default(),
            load_sensor: LoadSensorConfig::default(),
            load_target_one: Vec3::new(6.0, 4.0, 0.0),
            load_target_two: Vec3::new(10.0, 3.0, 0.0),
            load_density_one: 400.0,
            load_density_two: 250.0,
            load_half_extent: 0.25,
        }
    }
}

impl SimConfig {
    /// Load config from `sim.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        let path = config_path();
        if path.exists() {
            match Self::load_from(&path) {
                Ok(c) => return c,
                Err(e) => log::warn!("{:#}, using defaults", e),
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config {:?}", path))?;
        ron::from_str(&data).with_context(|| format!("invalid config at {:?}", path))
    }

    /// Save current config to `sim.ron`. Logs on error.
    pub fn save(&self) {
        let path = config_path();
        if let Ok(s) = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            if let Err(e) = std::fs::write(&path, s) {
                log::warn!("Could not write config to {:?}: {}", path, e);
            }
        }
    }

    pub fn tick_count(&self) -> u64 {
        (self.duration.max(0.0) as f64 * self.tick_rate).ceil() as u64
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")).join("sim.ron")
}
