//! Backend-agnostic vocabulary for the gravwell interop pipeline.
//!
//! This crate holds the types every other gravwell crate speaks:
//! - Errors with decoded device codes (`Error`, `ErrorCode`)
//! - Element types shared with kernels (`Float4`)
//! - Synchronization events and per-frame event slots (`Event`, `FrameEvents`)
//! - Opaque backend handles (`NativeBuffer`, `MemId`, `ProgramId`, `KernelId`)
//! - Build options and program sources (`BuildOptions`, `ProgramSource`)
//! - Host memory sharing and host kernel arguments (`HostVec`, `HostArgs`)
//! - Shared buffer ownership epochs (`Owner`)

pub mod error;
pub mod event;
pub mod handles;
pub mod host;
pub mod options;
pub mod ownership;
pub mod program;
pub mod types;

pub use error::{Error, ErrorCode, Result};
pub use event::{Event, EventKind, EventStatus, FrameEvents};
pub use handles::{KernelId, MemAccess, MemId, NativeBuffer, ProgramId};
pub use host::{HostArg, HostArgs, HostKernelFn, HostRegion, HostVec};
pub use options::{BuildOptions, DefineValue};
pub use ownership::Owner;
pub use program::{BuildInfo, BuildStatus, HostEntry, ProgramSource};
pub use types::Float4;
