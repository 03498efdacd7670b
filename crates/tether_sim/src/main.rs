//! tether-sim: headless harbour scene exercising the rope, winch, sensor and pulley components.
//!
//! Usage: `tether-sim [config.ron] [--write-config]`. Without a path, `sim.ron` in the current
//! directory is used when present.

mod config;
mod scene;

use anyhow::Result;
use config::SimConfig;
use scene::{Report, Scene};
use std::path::PathBuf;
use std::time::Duration;
use tether_core::FixedClock;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut path = None;
    let mut write_config = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--write-config" => write_config = true,
            _ => path = Some(PathBuf::from(arg)),
        }
    }

    let config = match path {
        Some(path) => SimConfig::load_from(&path)?,
        None => SimConfig::load(),
    };
    if write_config {
        config.save();
    }

    log::info!(
        "Starting tether-sim: {:.1} s at {} Hz",
        config.duration,
        config.tick_rate
    );

    let mut scene = Scene::build(&config)?;
    let mut clock = FixedClock::new(config.tick_rate);
    let dt = clock.fixed_timestep_seconds();
    let total_ticks = config.tick_count();
    let report_every = config.report_every.max(1);

    // Headless: feed the clock exactly one tick of frame time per iteration.
    while clock.tick_count() < total_ticks {
        clock.advance(Duration::from_secs_f32(dt));
        while clock.should_step() {
            scene.tick(dt);
            if clock.tick_count() % report_every == 0 {
                log_report(&scene.report(), clock.simulated_seconds());
            }
        }
    }

    let last = scene.report();
    log::info!(
        "Finished after {} ticks: mooring {:.2} m, pulley {:.2} / {:.2} m",
        last.tick,
        last.mooring_length,
        last.length_one,
        last.length_two
    );
    Ok(())
}

fn log_report(r: &Report, seconds: f64) {
    log::info!(
        "t={:6.2}s mooring={:.2}m buoy=({:.2}, {:.2}, {:.2}) lift={:.2}m",
        seconds,
        r.mooring_length,
        r.buoy.x,
        r.buoy.y,
        r.buoy.z,
        r.lift_length
    );
    if r.handed_over {
        log::info!(
            "          pulley loads {:.1} / {:.1} N, speed {:+.2}, lengths {:.2} / {:.2} m",
            r.load_one,
            r.load_two,
            r.pulley_speed,
            r.length_one,
            r.length_two
        );
    }
}
