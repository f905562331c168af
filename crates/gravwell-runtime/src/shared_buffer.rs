//! Graphics-native buffers shared with compute.

use crate::backend::Backend;
use crate::graphics::GraphicsContext;
use bytemuck::Pod;
use gravwell_core::{NativeBuffer, Result};
use std::marker::PhantomData;
use std::sync::Arc;

/// A vertex buffer of `T` that compute may borrow through acquire/release.
///
/// The native handle is valid for as long as this value lives; dropping it
/// frees the graphics resource. Not `Clone`: there is exactly one owner.
#[derive(Debug)]
pub struct SharedBuffer<T> {
    backend: Arc<dyn Backend>,
    handle: NativeBuffer,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> SharedBuffer<T> {
    /// Allocate a buffer holding `data` and upload it once.
    pub fn new(gfx: &GraphicsContext, label: &str, data: &[T]) -> Result<Self> {
        let backend = Arc::clone(gfx.backend());
        let handle = backend.create_graphics_buffer(label, bytemuck::cast_slice(data))?;
        tracing::debug!(%handle, label, len = data.len(), "shared buffer created");
        Ok(Self {
            backend,
            handle,
            len: data.len(),
            _marker: PhantomData,
        })
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn handle(&self) -> NativeBuffer {
        self.handle
    }

    /// Read the contents through the graphics side.
    ///
    /// Fails with `INVALID_GRAPHICS_OBJECT` while compute owns the buffer.
    pub fn read(&self) -> Result<Vec<T>> {
        let bytes = self.backend.read_graphics_buffer(self.handle)?;
        Ok(bytemuck::pod_collect_to_vec(&bytes))
    }
}

impl<T> Drop for SharedBuffer<T> {
    fn drop(&mut self) {
        self.backend.destroy_graphics_buffer(self.handle);
    }
}
