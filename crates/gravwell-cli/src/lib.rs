//! Headless frame driver for the gravwell particle simulation.
//!
//! Shared by the `gravwell` binary and its tests.

pub mod config;
pub mod seed;
pub mod sim;

pub use config::{BackendKind, DriverConfig, TransferMode, WindowSize};
pub use seed::{Particles, seed_particles};
pub use sim::{FrameStats, MouseButton, RunSummary, SimContext, graphics_context, run};
