//! Tether simulation: a Verlet rope solver, a two-segment winch actuator, a load sensor,
//! and a pulley balancer that shares one rope between two winches.
//!
//! Every component is a plain struct advanced by an explicit `step(dt, ..)` call from the
//! host's fixed-rate loop. Physics access goes through the capability traits in
//! [`tether_core`], so nothing here depends on a particular engine.

pub mod error;
pub mod handover;
pub mod load_sensor;
pub mod pulley;
pub mod rope;
pub mod winch;

#[cfg(test)]
mod test_support;

pub use error::*;
pub use handover::*;
pub use load_sensor::*;
pub use pulley::*;
pub use rope::*;
pub use winch::*;
