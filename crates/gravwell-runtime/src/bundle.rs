//! Device context bundle: every device-bound resource one compute workload
//! needs, created once and owned by its executor.

use crate::backend::{Backend, BufferInit, DeviceClass, KernelArg};
use crate::graphics::ContextShare;
use crate::module::KernelModule;
use crate::queue::CommandQueue;
use crate::shared_buffer::SharedBuffer;
use bytemuck::Pod;
use gravwell_core::{
    BuildInfo, BuildOptions, BuildStatus, Error, KernelId, MemAccess, MemId, ProgramId, Result,
};
use std::sync::Arc;

/// Compute-side memory object. Released on drop.
#[derive(Debug)]
pub struct ComputeBuffer {
    backend: Arc<dyn Backend>,
    id: MemId,
    size: usize,
}

impl ComputeBuffer {
    /// Backend handle, for binding and enqueueing.
    pub fn id(&self) -> MemId {
        self.id
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for ComputeBuffer {
    fn drop(&mut self) {
        self.backend.release_mem(self.id);
    }
}

/// A kernel resolved from the bundle's program.
#[derive(Debug)]
pub struct Kernel {
    backend: Arc<dyn Backend>,
    id: KernelId,
    entry: &'static str,
}

impl Kernel {
    /// Backend handle of the kernel.
    pub fn id(&self) -> KernelId {
        self.id
    }

    /// Entry point name the kernel was created from.
    pub fn entry(&self) -> &'static str {
        self.entry
    }

    /// Bind a buffer to parameter slot `index`.
    pub fn set_buffer(&self, index: u32, buffer: &ComputeBuffer) -> Result<()> {
        self.backend.set_arg(self.id, index, KernelArg::Mem(buffer.id))
    }

    /// Bind a by-value argument to parameter slot `index`.
    pub fn set_value<T: Pod>(&self, index: u32, value: &T) -> Result<()> {
        self.backend
            .set_arg(self.id, index, KernelArg::Value(bytemuck::bytes_of(value)))
    }
}

/// Compute context, queue, program and kernel for one kernel module.
#[derive(Debug)]
pub struct DeviceBundle {
    backend: Arc<dyn Backend>,
    queue: CommandQueue,
    program: ProgramId,
    kernel: Kernel,
    device_index: usize,
    platform: String,
    device: String,
    build: BuildInfo,
}

impl DeviceBundle {
    /// Select a device, build `module`'s program and resolve its entry point.
    ///
    /// Takes the first platform and its first GPU-class device; there is no
    /// fallback.
    ///
    /// # Errors
    /// [`Error::Platform`] if enumeration fails or yields nothing,
    /// [`Error::NoDevice`] if the platform has no GPU device,
    /// [`Error::Build`] if the program does not build, and a device error if
    /// the entry point cannot be resolved.
    pub fn build<K: KernelModule>(share: &ContextShare, module: &K) -> Result<Self> {
        let backend = Arc::clone(share.backend());

        let platforms = backend.platforms()?;
        let platform = platforms
            .into_iter()
            .next()
            .ok_or_else(|| Error::Platform(format!("{} reports no platforms", backend.name())))?;
        let (device_index, device) = platform
            .devices
            .iter()
            .enumerate()
            .find(|(_, d)| d.class == DeviceClass::Gpu)
            .ok_or_else(|| Error::NoDevice {
                platform: platform.name.clone(),
            })?;
        tracing::info!(
            platform = %platform.name,
            device = %device.name,
            backend = backend.name(),
            "selected compute device"
        );

        let options_text = module.build_options();
        let source = module.source();
        let options = BuildOptions::parse(&options_text).map_err(|e| Error::Build {
            program: source.label.to_string(),
            log: e.to_string(),
        });
        let built = options.and_then(|options| backend.build_program(&source, &options));
        let (program, build) = match built {
            Ok(built) => built,
            Err(e) => {
                if let Error::Build { log, .. } = &e {
                    tracing::error!(
                        program = source.label,
                        status = %BuildStatus::Error,
                        options = %options_text,
                        "build failed:\n{log}"
                    );
                }
                return Err(e);
            }
        };
        tracing::info!(
            program = source.label,
            status = %build.status,
            options = %build.options,
            "program built"
        );
        tracing::debug!(program = source.label, "build log:\n{}", build.log);

        let entry = module.entry_point();
        let kernel = backend.create_kernel(program, entry)?;

        Ok(Self {
            queue: CommandQueue::new(Arc::clone(&backend)),
            kernel: Kernel {
                backend: Arc::clone(&backend),
                id: kernel,
                entry,
            },
            backend,
            program,
            device_index,
            platform: platform.name.clone(),
            device: device.name.clone(),
            build,
        })
    }

    /// The bundle's in-order command queue.
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// The kernel for the module's entry point.
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// The built program the kernel was resolved from.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Index of the selected device within its platform.
    pub fn device_index(&self) -> usize {
        self.device_index
    }

    /// Name of the platform the device was taken from.
    pub fn platform_name(&self) -> &str {
        &self.platform
    }

    /// Name of the selected device.
    pub fn device_name(&self) -> &str {
        &self.device
    }

    /// Options and log of the successful build.
    pub fn build_info(&self) -> &BuildInfo {
        &self.build
    }

    /// Block until pending graphics work is complete and visible.
    pub fn graphics_finish(&self) -> Result<()> {
        self.backend.graphics_finish()
    }

    /// Compute view over a shared buffer.
    pub fn create_from_graphics<T: Pod>(
        &self,
        buffer: &SharedBuffer<T>,
        access: MemAccess,
    ) -> Result<ComputeBuffer> {
        let id = self.backend.create_from_graphics(buffer.handle(), access)?;
        Ok(ComputeBuffer {
            backend: Arc::clone(&self.backend),
            id,
            size: buffer.len() * std::mem::size_of::<T>(),
        })
    }

    /// Plain compute buffer of `size` bytes.
    pub fn create_buffer(
        &self,
        size: usize,
        access: MemAccess,
        init: BufferInit,
    ) -> Result<ComputeBuffer> {
        let id = self.backend.create_buffer(size, access, init)?;
        Ok(ComputeBuffer {
            backend: Arc::clone(&self.backend),
            id,
            size,
        })
    }
}
