//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. Buffer contents are kept in host
//! memory so tests can read them back, and failures can be injected to drive
//! the pool's retry and fallback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{BackendError, DeviceBuffer, GpuBackend};
use crate::types::BufferDescriptor;

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    device_buffers: AtomicBool,
    next_id: AtomicU64,
    storage: Mutex<HashMap<u64, Vec<u8>>>,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    fail_creates: AtomicUsize,
    fail_maps: AtomicUsize,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            device_buffers: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            storage: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
            fail_creates: AtomicUsize::new(0),
            fail_maps: AtomicUsize::new(0),
        }
    }

    /// A backend without device buffers, forcing host arrays everywhere.
    pub fn host_only() -> Self {
        let backend = Self::new();
        backend.device_buffers.store(false, Ordering::Relaxed);
        backend
    }

    /// Fail the next `count` buffer creations.
    pub fn fail_next_creates(&self, count: usize) {
        self.fail_creates.store(count, Ordering::Relaxed);
    }

    /// Fail the next `count` buffer writes as if mapping had failed.
    pub fn fail_next_maps(&self, count: usize) {
        self.fail_maps.store(count, Ordering::Relaxed);
    }

    /// Device buffers created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Device buffers destroyed so far.
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::Relaxed)
    }

    /// Device buffers currently alive.
    pub fn live(&self) -> usize {
        self.storage.lock().len()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn supports_device_buffers(&self) -> bool {
        self.device_buffers.load(Ordering::Relaxed)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<DeviceBuffer, BackendError> {
        if !self.supports_device_buffers() {
            return Err(BackendError::ResourceCreationFailed(
                "device buffers disabled".into(),
            ));
        }
        if Self::take_failure(&self.fail_creates) {
            return Err(BackendError::OutOfMemory);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "DummyBackend: creating buffer {:?} #{id} (size: {})",
            descriptor.label,
            descriptor.size
        );
        self.storage
            .lock()
            .insert(id, vec![0; descriptor.size as usize]);
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(DeviceBuffer::new(id, descriptor.size))
    }

    fn write_buffer(&self, buffer: &DeviceBuffer, data: &[u8]) -> Result<(), BackendError> {
        if Self::take_failure(&self.fail_maps) {
            return Err(BackendError::MapFailed(format!("buffer #{}", buffer.id())));
        }
        let mut storage = self.storage.lock();
        let bytes = storage
            .get_mut(&buffer.id())
            .ok_or(BackendError::UnknownBuffer(buffer.id()))?;
        if data.len() > bytes.len() {
            return Err(BackendError::InvalidParameter(format!(
                "{} bytes do not fit buffer #{} of {} bytes",
                data.len(),
                buffer.id(),
                bytes.len()
            )));
        }
        log::trace!("DummyBackend: write_buffer #{} len={}", buffer.id(), data.len());
        bytes[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &DeviceBuffer) -> Result<Vec<u8>, BackendError> {
        self.storage
            .lock()
            .get(&buffer.id())
            .cloned()
            .ok_or(BackendError::UnknownBuffer(buffer.id()))
    }

    fn destroy_buffer(&self, buffer: DeviceBuffer) {
        log::trace!("DummyBackend: destroying buffer #{}", buffer.id());
        if self.storage.lock().remove(&buffer.id()).is_some() {
            self.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    #[test]
    fn test_write_and_read_back() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(8, BufferUsage::VERTEX))
            .unwrap();
        backend.write_buffer(&buffer, &[1, 2, 3]).unwrap();
        assert_eq!(backend.read_buffer(&buffer).unwrap(), vec![1, 2, 3, 0, 0, 0, 0, 0]);
        backend.destroy_buffer(buffer);
        assert_eq!(backend.live(), 0);
        assert_eq!(backend.destroyed(), 1);
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let backend = DummyBackend::new();
        backend.fail_next_creates(1);
        let desc = BufferDescriptor::new(4, BufferUsage::INDEX);
        assert_eq!(backend.create_buffer(&desc), Err(BackendError::OutOfMemory));
        let buffer = backend.create_buffer(&desc).unwrap();

        backend.fail_next_maps(1);
        assert!(matches!(
            backend.write_buffer(&buffer, &[0; 4]),
            Err(BackendError::MapFailed(_))
        ));
        assert!(backend.write_buffer(&buffer, &[0; 4]).is_ok());
        assert_eq!(backend.created(), 1);
    }

    #[test]
    fn test_host_only_refuses_device_buffers() {
        let backend = DummyBackend::host_only();
        assert!(!backend.supports_device_buffers());
        assert!(
            backend
                .create_buffer(&BufferDescriptor::new(4, BufferUsage::VERTEX))
                .is_err()
        );
    }
}
