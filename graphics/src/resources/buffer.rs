//! GPU buffer resource.

use crate::backend::DeviceBuffer;

/// Where the bytes of a [`GpuBuffer`] live.
#[derive(Debug)]
pub enum BufferStorage {
    /// Device-resident buffer object.
    Device(DeviceBuffer),
    /// Host memory drawn through client-side arrays. Stored as words so typed
    /// views of it are aligned.
    Host(Vec<u32>),
}

/// A draw buffer of a fixed byte size.
///
/// Consumers bind device buffers by handle and host buffers by pointer; the
/// layout is identical either way.
#[derive(Debug)]
pub struct GpuBuffer {
    size: usize,
    storage: BufferStorage,
}

impl GpuBuffer {
    pub(crate) fn device(buffer: DeviceBuffer, size: usize) -> Self {
        Self {
            size,
            storage: BufferStorage::Device(buffer),
        }
    }

    /// Allocate zeroed host memory, or `None` when the allocator refuses.
    pub(crate) fn try_host(size: usize) -> Option<Self> {
        let words = size.div_ceil(4);
        let mut data = Vec::new();
        data.try_reserve_exact(words).ok()?;
        data.resize(words, 0);
        Some(Self {
            size,
            storage: BufferStorage::Host(data),
        })
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_device(&self) -> bool {
        matches!(self.storage, BufferStorage::Device(_))
    }

    pub fn storage(&self) -> &BufferStorage {
        &self.storage
    }

    pub fn device_buffer(&self) -> Option<&DeviceBuffer> {
        match &self.storage {
            BufferStorage::Device(buffer) => Some(buffer),
            BufferStorage::Host(_) => None,
        }
    }

    /// Bytes of a host buffer.
    pub fn host_bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            BufferStorage::Host(words) => Some(&bytemuck::cast_slice(words)[..self.size]),
            BufferStorage::Device(_) => None,
        }
    }

    pub(crate) fn host_bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            BufferStorage::Host(words) => Some(&mut bytemuck::cast_slice_mut(words)[..self.size]),
            BufferStorage::Device(_) => None,
        }
    }

    pub(crate) fn into_storage(self) -> BufferStorage {
        self.storage
    }
}

static_assertions::assert_impl_all!(GpuBuffer: Send, Sync);
