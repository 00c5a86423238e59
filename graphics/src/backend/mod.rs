//! GPU backend abstraction layer.
//!
//! Draw buffers only need a small slice of a graphics API: create a buffer of
//! a given size, map it and write bytes, and destroy it again. The
//! [`GpuBackend`] trait captures exactly that, so the buffer pool and the
//! draw objects never talk to a concrete API.
//!
//! # Available Backends
//!
//! - `dummy`: keeps buffer contents in host memory and can simulate
//!   allocation and mapping failures

pub mod dummy;
mod error;

use std::sync::Arc;

pub use dummy::DummyBackend;
pub use error::BackendError;

use crate::types::BufferDescriptor;

/// Handle to a device-resident buffer.
///
/// Handles are plain ids; destroying one goes through
/// [`GpuBackend::destroy_buffer`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DeviceBuffer {
    id: u64,
    size: u64,
}

impl DeviceBuffer {
    /// Wrap a backend-assigned id. Only backends create handles.
    pub fn new(id: u64, size: u64) -> Self {
        Self { id, size }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Whether device buffers can be created at all. When `false` every draw
    /// buffer lives in host memory.
    fn supports_device_buffers(&self) -> bool;

    /// Create a buffer resource.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<DeviceBuffer, BackendError>;

    /// Map `buffer`, copy `data` to its start and unmap it.
    fn write_buffer(&self, buffer: &DeviceBuffer, data: &[u8]) -> Result<(), BackendError>;

    /// Read data from a buffer.
    fn read_buffer(&self, buffer: &DeviceBuffer) -> Result<Vec<u8>, BackendError>;

    /// Destroy a buffer. Must only be called from the owning context.
    fn destroy_buffer(&self, buffer: DeviceBuffer);
}

/// Selects and creates the appropriate backend based on available features.
pub fn create_backend() -> Arc<dyn GpuBackend> {
    log::info!("Using dummy backend");
    Arc::new(DummyBackend::new())
}
