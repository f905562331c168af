//! The graphics side of the shared device.

use crate::backend::Backend;
use crate::host::HostDevice;
use crate::wgpu_backend::WgpuDevice;
use gravwell_core::Result;
use std::sync::Arc;

/// The current graphics context.
///
/// Owns the device the rasterizer draws with. A compute context can only be
/// created against it through [`GraphicsContext::share`].
#[derive(Debug, Clone)]
pub struct GraphicsContext {
    backend: Arc<dyn Backend>,
}

/// Handles a compute context must be bound to so that it shares memory with
/// the graphics context it came from.
#[derive(Debug, Clone)]
pub struct ContextShare {
    backend: Arc<dyn Backend>,
}

impl ContextShare {
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

impl GraphicsContext {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Graphics context on the reference host device.
    pub fn host() -> (Self, Arc<HostDevice>) {
        let host = Arc::new(HostDevice::new());
        (Self::new(Arc::clone(&host) as Arc<dyn Backend>), host)
    }

    /// Graphics context on the default wgpu adapter.
    pub async fn wgpu() -> Result<Self> {
        let device = WgpuDevice::new().await?;
        tracing::info!(
            adapter = %device.adapter_info().name,
            backend = ?device.adapter_info().backend,
            "graphics context ready"
        );
        Ok(Self::new(Arc::new(device)))
    }

    pub fn share(&self) -> ContextShare {
        ContextShare {
            backend: Arc::clone(&self.backend),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Block until all pending graphics work is complete.
    pub fn finish(&self) -> Result<()> {
        self.backend.graphics_finish()
    }
}
