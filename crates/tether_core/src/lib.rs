//! Core types shared by the tether crates.
//!
//! This crate provides the foundational types used across the workspace:
//! - Transform, look rotations and GPU instance data for rope nodes
//! - Fixed-step clock for the host simulation loop
//! - Capability traits the host physics backend implements

pub mod backend;
pub mod time;
pub mod transform;

pub use backend::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat3, Mat4, Quat, Vec3};
