//! Host-side memory shared with the device, and the argument table host
//! kernels run against.

use crate::{Error, ErrorCode, Result};
use bytemuck::Pod;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Host memory a device buffer may reference directly.
pub trait HostRegion: Send + Sync + fmt::Debug {
    /// Size in bytes.
    fn byte_len(&self) -> usize;

    /// Snapshot of the current contents.
    fn read_bytes(&self) -> Vec<u8>;

    /// Overwrite the contents; `bytes` must be exactly `byte_len()` long.
    fn write_bytes(&self, bytes: &[u8]) -> Result<()>;
}

/// Shared, growable host vector.
///
/// Cloning shares the allocation: the payload holding one clone and the
/// injector holding another see the same elements. Writers must stay out of
/// the device's transfer window (from buffer creation under zero-copy, or from
/// the upload enqueue, until the frame's release completes). This is a caller
/// precondition; the lock only keeps individual accesses memory-safe.
#[derive(Debug)]
pub struct HostVec<T> {
    inner: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for HostVec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Pod + Send + Sync + fmt::Debug> HostVec<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    /// `len` zeroed elements.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![T::zeroed(); len])
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles share one allocation.
    pub fn ptr_eq(&self, other: &HostVec<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Type-erased view for backends.
    pub fn region(&self) -> Arc<dyn HostRegion> {
        Arc::clone(&self.inner) as Arc<dyn HostRegion>
    }
}

impl<T: Pod + Send + Sync + fmt::Debug> HostRegion for RwLock<Vec<T>> {
    fn byte_len(&self) -> usize {
        self.read().unwrap_or_else(PoisonError::into_inner).len() * std::mem::size_of::<T>()
    }

    fn read_bytes(&self) -> Vec<u8> {
        let guard = self.read().unwrap_or_else(PoisonError::into_inner);
        bytemuck::cast_slice(guard.as_slice()).to_vec()
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.write().unwrap_or_else(PoisonError::into_inner);
        let dst: &mut [u8] = bytemuck::cast_slice_mut(guard.as_mut_slice());
        if dst.len() != bytes.len() {
            return Err(Error::device("write_host_region", ErrorCode::InvalidHostPtr));
        }
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

/// One bound kernel argument as a host kernel sees it.
#[derive(Debug, Clone)]
pub enum HostArg {
    /// Buffer contents, copied in before the dispatch and written back after.
    Buffer(Vec<u8>),
    /// By-value argument bytes.
    Value(Vec<u8>),
}

/// Argument table for one host dispatch, indexed by parameter slot.
#[derive(Debug, Default)]
pub struct HostArgs {
    slots: Vec<Option<HostArg>>,
}

/// Host implementation of a kernel: called once per global id.
pub type HostKernelFn = fn(usize, &mut HostArgs) -> Result<()>;

impl HostArgs {
    pub fn new(slots: Vec<Option<HostArg>>) -> Self {
        Self { slots }
    }

    pub fn into_slots(self) -> Vec<Option<HostArg>> {
        self.slots
    }

    fn buffer(&self, slot: usize) -> Result<&Vec<u8>> {
        match self.slots.get(slot) {
            Some(Some(HostArg::Buffer(bytes))) => Ok(bytes),
            Some(Some(HostArg::Value(_))) => {
                Err(Error::device("host_kernel", ErrorCode::InvalidArgValue))
            }
            _ => Err(Error::device("host_kernel", ErrorCode::KernelArgsNotSet)),
        }
    }

    /// Number of `T` elements in the buffer bound at `slot`.
    pub fn len<T: Pod>(&self, slot: usize) -> Result<usize> {
        Ok(self.buffer(slot)?.len() / std::mem::size_of::<T>())
    }

    /// Read element `index` of the buffer at `slot`.
    pub fn load<T: Pod>(&self, slot: usize, index: usize) -> Result<T> {
        let bytes = self.buffer(slot)?;
        let size = std::mem::size_of::<T>();
        let start = index * size;
        bytes
            .get(start..start + size)
            .map(bytemuck::pod_read_unaligned)
            .ok_or_else(|| Error::device("host_kernel", ErrorCode::ExecutionFailure))
    }

    /// Write element `index` of the buffer at `slot`.
    pub fn store<T: Pod>(&mut self, slot: usize, index: usize, value: T) -> Result<()> {
        let size = std::mem::size_of::<T>();
        let start = index * size;
        match self.slots.get_mut(slot) {
            Some(Some(HostArg::Buffer(bytes))) => {
                let dst = bytes
                    .get_mut(start..start + size)
                    .ok_or_else(|| Error::device("host_kernel", ErrorCode::ExecutionFailure))?;
                dst.copy_from_slice(bytemuck::bytes_of(&value));
                Ok(())
            }
            Some(Some(HostArg::Value(_))) => {
                Err(Error::device("host_kernel", ErrorCode::InvalidArgValue))
            }
            _ => Err(Error::device("host_kernel", ErrorCode::KernelArgsNotSet)),
        }
    }

    /// By-value argument at `slot`.
    pub fn value<T: Pod>(&self, slot: usize) -> Result<T> {
        match self.slots.get(slot) {
            Some(Some(HostArg::Value(bytes))) if bytes.len() == std::mem::size_of::<T>() => {
                Ok(bytemuck::pod_read_unaligned(bytes))
            }
            Some(Some(HostArg::Value(_))) => Err(Error::device("host_kernel", ErrorCode::InvalidArgSize)),
            Some(Some(HostArg::Buffer(_))) => {
                Err(Error::device("host_kernel", ErrorCode::InvalidArgValue))
            }
            _ => Err(Error::device("host_kernel", ErrorCode::KernelArgsNotSet)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Float4;

    #[test]
    fn test_host_vec_clones_share_storage() {
        let a = HostVec::new(vec![Float4::ZERO; 2]);
        let b = a.clone();
        b.write()[1] = Float4::point(1.0, 2.0, 3.0);
        assert_eq!(a.read()[1], Float4::point(1.0, 2.0, 3.0));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_region_round_trips_bytes() {
        let v = HostVec::new(vec![1.0f32, 2.0]);
        let region = v.region();
        assert_eq!(region.byte_len(), 8);
        region.write_bytes(bytemuck::cast_slice(&[5.0f32, 6.0])).unwrap();
        assert_eq!(*v.read(), vec![5.0, 6.0]);
        assert!(region.write_bytes(&[0u8; 4]).is_err());
    }

    #[test]
    fn test_args_load_store_and_value() {
        let mut args = HostArgs::new(vec![
            Some(HostArg::Buffer(bytemuck::cast_slice(&[Float4::ZERO; 3]).to_vec())),
            None,
            Some(HostArg::Value(bytemuck::bytes_of(&Float4::point(1.0, 0.0, 0.0)).to_vec())),
        ]);
        assert_eq!(args.len::<Float4>(0).unwrap(), 3);
        args.store(0, 2, Float4::new(9.0, 8.0, 7.0, 6.0)).unwrap();
        assert_eq!(args.load::<Float4>(0, 2).unwrap().x, 9.0);
        assert_eq!(args.value::<Float4>(2).unwrap().x, 1.0);

        let unbound = args.load::<Float4>(1, 0).unwrap_err();
        assert_eq!(unbound.code(), Some(ErrorCode::KernelArgsNotSet));
        assert!(args.load::<Float4>(0, 3).is_err());
        assert!(args.value::<f32>(2).is_err());
    }
}
