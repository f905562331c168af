//! Kernel modules for gravwell.
//!
//! Each module pairs a WGSL program with a host implementation of the same
//! entry point, plus the load and exec strategies an
//! [`Executor`](gravwell_runtime::Executor) forwards to.
//!
//! - [`Gravity`] - particles pulled toward a pointer
//! - [`Echo`] - writes its parameter into a buffer

pub mod echo;
pub mod gravity;
pub mod shaders;

pub use echo::{Echo, EchoPayload};
pub use gravity::{Gravity, GravityParams, GravityPayload, Particle, TransferPolicy};
