//! The device seam.
//!
//! A [`Backend`] is one joint compute/graphics device: it owns graphics-native
//! buffers, compute-side memory objects, programs, kernels and an in-order
//! command queue. Everything above this trait speaks handles and events only.

use gravwell_core::{
    BuildInfo, BuildOptions, Event, EventStatus, HostRegion, KernelId, MemAccess, MemId,
    NativeBuffer, ProgramId, ProgramSource, Result,
};
use std::fmt;
use std::sync::Arc;

/// Device class as reported by platform enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Gpu,
    Cpu,
    Other,
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub class: DeviceClass,
}

#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub name: String,
    pub devices: Vec<DeviceInfo>,
}

/// Initial contents of a plain compute buffer.
#[derive(Debug, Clone)]
pub enum BufferInit {
    /// Uninitialized device memory; filled later by an enqueued write.
    Empty,
    /// The buffer references host memory directly (zero-copy).
    UseHost(Arc<dyn HostRegion>),
}

/// A kernel argument.
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    Mem(MemId),
    Value(&'a [u8]),
}

/// One joint compute/graphics device.
///
/// All methods take `&self`; implementations serialize access internally.
/// Every `enqueue_*` returns the event of the command it enqueued and only
/// starts that command after every event in `wait` has completed.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Platforms and their devices, in enumeration order.
    fn platforms(&self) -> Result<Vec<PlatformInfo>>;

    // Graphics side.

    /// Allocate a vertex buffer holding `contents`.
    fn create_graphics_buffer(&self, label: &str, contents: &[u8]) -> Result<NativeBuffer>;

    fn destroy_graphics_buffer(&self, buffer: NativeBuffer);

    /// Read a vertex buffer through the graphics side. Fails while compute owns it.
    fn read_graphics_buffer(&self, buffer: NativeBuffer) -> Result<Vec<u8>>;

    /// Block until all submitted graphics work is complete and visible.
    fn graphics_finish(&self) -> Result<()>;

    // Compute side.

    /// Build `source` with `options`. A failure returns [`gravwell_core::Error::Build`]
    /// carrying the build log.
    fn build_program(
        &self,
        source: &ProgramSource,
        options: &BuildOptions,
    ) -> Result<(ProgramId, BuildInfo)>;

    fn create_kernel(&self, program: ProgramId, entry: &str) -> Result<KernelId>;

    /// Compute view over a graphics buffer.
    fn create_from_graphics(&self, buffer: NativeBuffer, access: MemAccess) -> Result<MemId>;

    /// Plain compute buffer of `size` bytes.
    fn create_buffer(&self, size: usize, access: MemAccess, init: BufferInit) -> Result<MemId>;

    fn release_mem(&self, mem: MemId);

    fn set_arg(&self, kernel: KernelId, index: u32, arg: KernelArg<'_>) -> Result<()>;

    // Queue.

    fn enqueue_write(&self, mem: MemId, data: &[u8], wait: &[Event]) -> Result<Event>;

    /// Hand graphics-backed views over to compute.
    fn enqueue_acquire(&self, mems: &[MemId], wait: &[Event]) -> Result<Event>;

    /// Run `kernel` over a 1-D range of `global` work items.
    fn enqueue_dispatch(&self, kernel: KernelId, global: usize, wait: &[Event]) -> Result<Event>;

    /// Hand graphics-backed views back to graphics.
    fn enqueue_release(&self, mems: &[MemId], wait: &[Event]) -> Result<Event>;

    /// Submit everything enqueued so far without blocking.
    fn flush(&self) -> Result<()>;

    /// Block until every enqueued command has completed.
    fn finish(&self) -> Result<()>;

    /// Block until every event in `events` has completed.
    fn wait(&self, events: &[Event]) -> Result<()>;

    fn event_status(&self, event: Event) -> Result<EventStatus>;
}
