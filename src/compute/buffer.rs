use std::marker::PhantomData;
use std::sync::Arc;

use crate::utils::Handle;

use super::device::{Device, DeviceBuffer};
use super::element::Element;
use super::error::{ComputeError, Result};
use super::structs::{BufferAllocInfo, StorageMode};

/// Owns one device buffer allocation; freed exactly once when the last
/// alias drops it.
#[derive(Debug)]
pub(crate) struct RawBuffer {
    device: Device,
    handle: Handle<DeviceBuffer>,
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        let _ = self.device.destroy_buffer(self.handle);
    }
}

/// A typed, fixed-length device-resident buffer.
///
/// [`alias`](Buffer::alias) produces a second handle to the same device
/// memory; writes through either are visible through both. Host data
/// moves in through [`write_from`](Buffer::write_from) and out through
/// [`get_data`](Buffer::get_data).
#[derive(Debug)]
pub struct Buffer<T: Element> {
    raw: Option<Arc<RawBuffer>>,
    length: Option<usize>,
    storage: StorageMode,
    freed: bool,
    _marker: PhantomData<T>,
}

impl<T: Element> Default for Buffer<T> {
    /// An uninitialized buffer; every accessor fails until it is
    /// replaced by a real one.
    fn default() -> Self {
        Self {
            raw: None,
            length: None,
            storage: StorageMode::Shared,
            freed: false,
            _marker: PhantomData,
        }
    }
}

impl<T: Element> Buffer<T> {
    /// Allocate `length` elements of device memory in the given storage
    /// mode. Compound element types are texture-only and rejected here.
    pub fn new(device: &Device, length: usize, storage: StorageMode) -> Result<Self> {
        Self::check_components()?;

        let handle = device.make_buffer(&BufferAllocInfo {
            debug_name: "buffer",
            byte_size: length * std::mem::size_of::<T>(),
            storage,
        })?;

        Ok(Self {
            raw: Some(Arc::new(RawBuffer {
                device: device.clone(),
                handle,
            })),
            length: Some(length),
            storage,
            freed: false,
            _marker: PhantomData,
        })
    }

    /// Shorthand for [`StorageMode::Shared`] allocation.
    pub fn shared(device: &Device, length: usize) -> Result<Self> {
        Self::new(device, length, StorageMode::Shared)
    }

    fn check_components() -> Result<()> {
        if T::COMPONENTS != 1 {
            return Err(ComputeError::Component {
                components: T::COMPONENTS,
            });
        }
        Ok(())
    }

    fn check_freed(&self) -> Result<()> {
        if self.freed {
            return Err(ComputeError::Free);
        }
        Ok(())
    }

    fn raw(&self) -> Result<&Arc<RawBuffer>> {
        self.check_freed()?;
        self.raw.as_ref().ok_or(ComputeError::Init)
    }

    fn check_index(&self, index: usize) -> Result<usize> {
        let len = self.length.ok_or(ComputeError::Init)?;
        if index >= len {
            return Err(ComputeError::Index { index, len });
        }
        Ok(len)
    }

    /// Copy `data` into device memory. The slice must cover the whole
    /// buffer. Under [`StorageMode::Managed`] the written range is
    /// flushed so the device sees it.
    pub fn write_from(&mut self, data: &[T]) -> Result<()> {
        let raw = self.raw()?;
        let length = self.length.ok_or(ComputeError::Init)?;
        if data.len() != length {
            return Err(ComputeError::Size {
                expected: length,
                got: data.len(),
            });
        }

        let bytes = bytemuck::cast_slice(data);
        raw.device.write_buffer(raw.handle, 0, bytes)?;
        if self.storage == StorageMode::Managed {
            raw.device.flush_buffer(raw.handle, 0, bytes.len())?;
        }
        Ok(())
    }

    /// Read one element back from device memory.
    pub fn get(&self, index: usize) -> Result<T> {
        let raw = self.raw()?;
        self.check_index(index)?;

        let mut value = T::zeroed();
        raw.device.read_buffer(
            raw.handle,
            index * std::mem::size_of::<T>(),
            bytemuck::bytes_of_mut(&mut value),
        )?;
        Ok(value)
    }

    /// Write one element into device memory.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let raw = self.raw()?;
        self.check_index(index)?;

        let offset = index * std::mem::size_of::<T>();
        raw.device
            .write_buffer(raw.handle, offset, bytemuck::bytes_of(&value))?;
        if self.storage == StorageMode::Managed {
            raw.device
                .flush_buffer(raw.handle, offset, std::mem::size_of::<T>())?;
        }
        Ok(())
    }

    /// Host-side copy of the full contents.
    pub fn get_data(&self) -> Result<Vec<T>> {
        let raw = self.raw()?;
        let length = self.length.ok_or(ComputeError::Init)?;

        let mut data = vec![T::zeroed(); length];
        raw.device
            .read_buffer(raw.handle, 0, bytemuck::cast_slice_mut(&mut data))?;
        Ok(data)
    }

    /// A second handle to the same device memory. Mutation through one
    /// alias is visible through the other; the allocation is released
    /// when the last alias drops or frees it.
    pub fn alias(&self) -> Buffer<T> {
        Buffer {
            raw: self.raw.clone(),
            length: self.length,
            storage: self.storage,
            freed: self.freed,
            _marker: PhantomData,
        }
    }

    /// Release this handle's share of the device resource. Idempotent;
    /// later accessors report [`ComputeError::Free`], even on a handle
    /// that was never initialized.
    pub fn free(&mut self) {
        self.raw = None;
        self.freed = true;
    }

    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn item_size(&self) -> usize {
        std::mem::size_of::<T>()
    }

    pub fn storage_mode(&self) -> StorageMode {
        self.storage
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }

    pub(crate) fn device_handle(&self) -> Option<Handle<DeviceBuffer>> {
        self.raw.as_ref().map(|raw| raw.handle)
    }
}
