//! Shared-buffer interop runtime for gravwell.
//!
//! Couples a compute kernel with a graphics rasterizer that share device
//! memory. The pieces:
//!
//! 1. **Backends** - one joint compute/graphics device behind [`Backend`]:
//!    [`WgpuDevice`] for real hardware, [`HostDevice`] as the reference
//!    implementation that runs kernels on the host
//! 2. **Shared buffers** - vertex buffers compute may borrow ([`SharedBuffer`])
//! 3. **Bundles** - device, queue, program and kernel for one workload
//!    ([`DeviceBundle`])
//! 4. **Execution** - [`Executor`] forwards to a [`KernelModule`]'s load and
//!    exec strategies
//!
//! # Example
//!
//! ```no_run
//! use gravwell_runtime::GraphicsContext;
//!
//! #[pollster::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gfx = GraphicsContext::wgpu().await?;
//!     let share = gfx.share();
//!     // Build an Executor for a kernel module against `share`...
//!     Ok(())
//! }
//! ```

mod backend;
mod bundle;
mod executor;
mod graphics;
mod host;
mod module;
mod queue;
mod shared_buffer;
mod wgpu_backend;

pub use backend::{Backend, BufferInit, DeviceClass, DeviceInfo, KernelArg, PlatformInfo};
pub use bundle::{ComputeBuffer, DeviceBundle, Kernel};
pub use executor::Executor;
pub use graphics::{ContextShare, GraphicsContext};
pub use host::{Command, Executed, HostDevice};
pub use module::KernelModule;
pub use queue::{Acquired, CommandQueue};
pub use shared_buffer::SharedBuffer;
pub use wgpu_backend::WgpuDevice;

pub use gravwell_core::{Error, Result};
