//! Pool of recently released draw buffers.
//!
//! Rebuilding draw objects tends to request the same sizes again, so released
//! buffers are parked here instead of being destroyed. A request takes an
//! exact size match if one exists, otherwise the smallest pooled buffer that
//! is larger than the request but less than twice its size.
//!
//! # Buffer lifecycle
//!
//! ```text
//! acquire ──► Allocated ──release──► Free ──evict──► Destroyed
//!                ▲                    │
//!                └──────acquire───────┘
//! ```
//!
//! Device buffers may only be destroyed on the pool's main thread. A release
//! from any other thread never destroys anything: when the pool is full the
//! buffer is parked as [`EntryState::PendingDestruction`] and the pool grows
//! instead. The next release or [`BufferPool::free_unused`] on the main thread
//! shrinks it back.
//!
//! All pool state sits behind one mutex.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use super::buffer::{BufferStorage, GpuBuffer};
use crate::backend::GpuBackend;
use crate::types::{BufferDescriptor, BufferKind, BufferUsage};

/// Default number of buffers kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// Usage requested for every pooled device buffer, so any buffer can serve any
/// [`BufferKind`] on reuse.
const POOL_USAGE: BufferUsage = BufferUsage::VERTEX
    .union(BufferUsage::INDEX)
    .union(BufferUsage::MAP_WRITE);

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Buffers kept for reuse before the oldest are destroyed.
    pub capacity: usize,
    /// Prefer device buffers over host arrays when the backend has them.
    pub prefer_device: bool,
    /// Thread allowed to destroy device buffers. Defaults to the thread that
    /// creates the pool.
    pub main_thread: Option<ThreadId>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            prefer_device: true,
            main_thread: None,
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_prefer_device(mut self, prefer_device: bool) -> Self {
        self.prefer_device = prefer_device;
        self
    }

    pub fn with_main_thread(mut self, main_thread: ThreadId) -> Self {
        self.main_thread = Some(main_thread);
        self
    }
}

/// State of a buffer parked in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Available for reuse within the pool's capacity.
    Free,
    /// Available for reuse, but over capacity and waiting for the main thread
    /// to destroy it.
    PendingDestruction,
}

/// Snapshot of the pool's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub free: usize,
    pub pending_destruction: usize,
    /// Current slot count, grown past the capacity by off-thread releases.
    pub slots: usize,
}

#[derive(Debug)]
struct PoolEntry {
    buffer: GpuBuffer,
    state: EntryState,
}

/// Pooled buffers, most recently released first.
struct PoolState {
    entries: VecDeque<PoolEntry>,
    slots: usize,
}

/// A pool of released [`GpuBuffer`]s shared by every draw object.
pub struct BufferPool {
    backend: Arc<dyn GpuBackend>,
    config: PoolConfig,
    main_thread: ThreadId,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Create a pool over `backend`.
    pub fn new(backend: Arc<dyn GpuBackend>, config: PoolConfig) -> Self {
        let main_thread = config.main_thread.unwrap_or_else(|| thread::current().id());
        let slots = config.capacity;
        Self {
            backend,
            config,
            main_thread,
            state: Mutex::new(PoolState {
                entries: VecDeque::with_capacity(slots),
                slots,
            }),
        }
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether the calling thread may destroy device buffers.
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.main_thread
    }

    /// Whether fresh buffers are created on the device.
    pub fn uses_device(&self) -> bool {
        self.config.prefer_device && self.backend.supports_device_buffers()
    }

    /// Get a buffer of at least `size` bytes, reusing a pooled one if
    /// possible. Returns `None` for a zero size or when allocation fails.
    pub fn acquire(&self, size: usize) -> Option<GpuBuffer> {
        if size == 0 {
            return None;
        }
        let device = self.uses_device();
        self.state.lock().alloc(self, size, device, None)
    }

    /// Like [`acquire`](Self::acquire), but always in host memory.
    pub fn acquire_host(&self, size: usize) -> Option<GpuBuffer> {
        if size == 0 {
            return None;
        }
        self.state.lock().alloc(self, size, false, None)
    }

    /// Hand a buffer back for reuse.
    pub fn release(&self, buffer: GpuBuffer) {
        self.state.lock().release(self, buffer);
    }

    /// Obtain a buffer for `kind` and fill it with `data`.
    ///
    /// A device buffer whose mapping fails is released, the oldest pooled
    /// buffer is evicted and the allocation retried. Once the pool has nothing
    /// left to evict the data goes to host memory instead. `None` means
    /// neither worked and the attribute is unavailable.
    pub fn setup(&self, kind: BufferKind, data: &[u8]) -> Option<GpuBuffer> {
        let size = data.len();
        if size == 0 {
            return None;
        }
        let mut state = self.state.lock();
        let mut use_device = self.uses_device();

        let mut buffer = state.alloc(self, size, use_device, Some(kind));
        if buffer.is_none() && use_device {
            log::warn!("{}: device allocation of {size} bytes failed", kind.label());
            use_device = false;
        }

        if use_device {
            while let Some(current) = buffer.as_ref().and_then(GpuBuffer::device_buffer) {
                match self.backend.write_buffer(current, data) {
                    Ok(()) => break,
                    Err(err) => {
                        log::warn!("{}: {err}, evicting and retrying", kind.label());
                        buffer = state.try_realloc(self, buffer.take(), size, true);
                    }
                }
            }
            if buffer.is_none() {
                log::warn!("{}: falling back to host memory", kind.label());
                use_device = false;
            }
        }

        if !use_device {
            if buffer.as_ref().is_none_or(GpuBuffer::is_device) {
                buffer = state.try_realloc(self, buffer.take(), size, false);
            }
            match buffer.as_mut().and_then(GpuBuffer::host_bytes_mut) {
                Some(bytes) => bytes[..size].copy_from_slice(data),
                None => log::warn!("{}: no memory for {size} bytes, skipping", kind.label()),
            }
        }
        buffer
    }

    /// Destroy every pooled buffer that the calling thread is allowed to.
    ///
    /// Off the main thread only host buffers go; device buffers stay as
    /// pending destruction.
    pub fn free_unused(&self) {
        let on_main = self.is_main_thread();
        let mut state = self.state.lock();
        if on_main {
            while state.evict_last(self) {}
            state.slots = self.config.capacity;
        } else {
            let entries = std::mem::take(&mut state.entries);
            for mut entry in entries {
                if entry.buffer.is_device() {
                    entry.state = EntryState::PendingDestruction;
                    state.entries.push_back(entry);
                } else {
                    destroy(self.backend.as_ref(), entry.buffer);
                }
            }
        }
    }

    /// Tear the pool down, destroying everything it holds.
    pub fn clear(&self) {
        if !self.is_main_thread() {
            log::warn!("buffer pool cleared off the main thread, device buffers kept");
        }
        self.free_unused();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let pending = state
            .entries
            .iter()
            .filter(|e| e.state == EntryState::PendingDestruction)
            .count();
        PoolStats {
            free: state.entries.len() - pending,
            pending_destruction: pending,
            slots: state.slots,
        }
    }

    /// Sizes of the pooled buffers, most recently released first.
    pub fn pooled_sizes(&self) -> Vec<usize> {
        self.state.lock().entries.iter().map(|e| e.buffer.size()).collect()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        let backend = Arc::clone(&self.backend);
        for entry in self.state.get_mut().entries.drain(..) {
            destroy(backend.as_ref(), entry.buffer);
        }
    }
}

static_assertions::assert_impl_all!(BufferPool: Send, Sync);

fn destroy(backend: &dyn GpuBackend, buffer: GpuBuffer) {
    match buffer.into_storage() {
        BufferStorage::Device(handle) => backend.destroy_buffer(handle),
        BufferStorage::Host(_) => {}
    }
}

impl PoolState {
    /// Take the best pooled match for `size` or allocate a fresh buffer.
    fn alloc(
        &mut self,
        pool: &BufferPool,
        size: usize,
        device: bool,
        kind: Option<BufferKind>,
    ) -> Option<GpuBuffer> {
        let mut best: Option<usize> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.buffer.is_device() != device {
                continue;
            }
            let bufsize = entry.buffer.size();
            if bufsize == size {
                best = Some(i);
                break;
            }
            // Smaller buffers cannot hold the data, twice as large wastes memory.
            if bufsize > size
                && size > bufsize / 2
                && best.is_none_or(|b| self.entries[b].buffer.size() > bufsize)
            {
                best = Some(i);
            }
        }
        if let Some(entry) = best.and_then(|i| self.entries.remove(i)) {
            log::trace!("reusing pooled buffer of {} bytes for {size}", entry.buffer.size());
            return Some(entry.buffer);
        }

        if device {
            let label = kind.map_or("pooled", BufferKind::label);
            let descriptor = BufferDescriptor::new(size as u64, POOL_USAGE).with_label(label);
            return match pool.backend.create_buffer(&descriptor) {
                Ok(handle) => Some(GpuBuffer::device(handle, size)),
                Err(err) => {
                    log::debug!("device buffer creation failed: {err}");
                    None
                }
            };
        }

        loop {
            if let Some(buffer) = GpuBuffer::try_host(size) {
                return Some(buffer);
            }
            if !self.evict_last(pool) {
                return None;
            }
        }
    }

    fn release(&mut self, pool: &BufferPool, buffer: GpuBuffer) {
        let capacity = pool.config.capacity;
        let state = if pool.is_main_thread() {
            while self.entries.len() >= capacity && self.evict_last(pool) {}
            self.entries.iter_mut().for_each(|e| e.state = EntryState::Free);
            self.slots = capacity;
            EntryState::Free
        } else {
            if self.entries.len() >= self.slots {
                self.slots += capacity;
            }
            if self.entries.len() >= capacity {
                EntryState::PendingDestruction
            } else {
                EntryState::Free
            }
        };
        self.entries.push_front(PoolEntry { buffer, state });
    }

    /// Destroy the oldest pooled buffer. Returns `false` when the pool is empty.
    fn evict_last(&mut self, pool: &BufferPool) -> bool {
        match self.entries.pop_back() {
            Some(entry) => {
                log::trace!("evicting pooled buffer of {} bytes", entry.buffer.size());
                destroy(pool.backend.as_ref(), entry.buffer);
                true
            }
            None => false,
        }
    }

    /// Give `buffer` back, make room and allocate again.
    ///
    /// Retrying a device allocation needs something left to evict, otherwise
    /// it would fail the same way.
    fn try_realloc(
        &mut self,
        pool: &BufferPool,
        buffer: Option<GpuBuffer>,
        size: usize,
        device: bool,
    ) -> Option<GpuBuffer> {
        if let Some(buffer) = buffer {
            self.release(pool, buffer);
        }
        self.evict_last(pool);
        if device && !self.evict_last(pool) {
            return None;
        }
        self.alloc(pool, size, device, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn pool_with(config: PoolConfig) -> (Arc<DummyBackend>, BufferPool) {
        let backend = Arc::new(DummyBackend::new());
        let pool = BufferPool::new(backend.clone(), config);
        (backend, pool)
    }

    #[test]
    fn test_zero_size_is_none() {
        let (_, pool) = pool_with(PoolConfig::default());
        assert!(pool.acquire(0).is_none());
        assert!(pool.setup(BufferKind::Vertex, &[]).is_none());
    }

    #[test]
    fn test_exact_match_is_reused() {
        let (backend, pool) = pool_with(PoolConfig::default());
        let buffer = pool.acquire(256).unwrap();
        pool.release(buffer);
        let again = pool.acquire(256).unwrap();
        assert_eq!(again.size(), 256);
        assert_eq!(backend.created(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_best_fit_prefers_smallest_candidate() {
        let (_, pool) = pool_with(PoolConfig::default());
        let buffers: Vec<_> = [190, 120, 150].map(|size| pool.acquire(size).unwrap()).into();
        for buffer in buffers {
            pool.release(buffer);
        }
        let got = pool.acquire(100).unwrap();
        assert_eq!(got.size(), 120);
        assert_eq!(pool.pooled_sizes(), vec![150, 190]);
    }

    #[test]
    fn test_oversized_buffer_is_not_reused() {
        let (backend, pool) = pool_with(PoolConfig::default());
        let big = pool.acquire(200).unwrap();
        pool.release(big);
        let small = pool.acquire(100).unwrap();
        assert_eq!(small.size(), 100);
        assert_eq!(backend.created(), 2);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_device_and_host_entries_do_not_mix() {
        let (_, pool) = pool_with(PoolConfig::default());
        let host = pool.acquire_host(64).unwrap();
        pool.release(host);
        let device = pool.acquire(64).unwrap();
        assert!(device.is_device());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_main_thread_release_caps_pool() {
        let (backend, pool) = pool_with(PoolConfig::default().with_capacity(2));
        let buffers: Vec<_> = (1..=3).map(|i| pool.acquire(i * 64).unwrap()).collect();
        for buffer in buffers {
            pool.release(buffer);
        }
        assert_eq!(pool.len(), 2);
        assert_eq!(backend.destroyed(), 1);
        // Most recent first, the oldest was evicted.
        assert_eq!(pool.pooled_sizes(), vec![192, 128]);
    }

    #[test]
    fn test_off_thread_release_defers_destruction() {
        let (backend, pool) = pool_with(PoolConfig::default().with_capacity(2));
        let pool = Arc::new(pool);
        let buffers: Vec<_> = (1..=5).map(|i| pool.acquire(i * 64).unwrap()).collect();

        let worker = Arc::clone(&pool);
        thread::spawn(move || {
            assert!(!worker.is_main_thread());
            for buffer in buffers {
                worker.release(buffer);
            }
        })
        .join()
        .unwrap();

        assert_eq!(backend.destroyed(), 0);
        let stats = pool.stats();
        assert_eq!(stats.free, 2);
        assert_eq!(stats.pending_destruction, 3);
        assert_eq!(stats.slots, 6);

        pool.free_unused();
        assert_eq!(pool.len(), 0);
        assert_eq!(backend.destroyed(), 5);
        assert_eq!(pool.stats().slots, 2);
    }

    #[test]
    fn test_setup_uploads_to_device() {
        let (backend, pool) = pool_with(PoolConfig::default());
        let buffer = pool.setup(BufferKind::Triangles, &[1, 2, 3, 4]).unwrap();
        let handle = buffer.device_buffer().unwrap();
        assert_eq!(backend.read_buffer(handle).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_setup_falls_back_to_host_on_map_failure() {
        let (backend, pool) = pool_with(PoolConfig::default());
        backend.fail_next_maps(1);
        let buffer = pool.setup(BufferKind::Vertex, &[9; 12]).unwrap();
        assert!(!buffer.is_device());
        assert_eq!(buffer.host_bytes().unwrap(), &[9; 12]);
        // The unmappable buffer was evicted, not leaked.
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn test_setup_retries_after_eviction() {
        let (backend, pool) = pool_with(PoolConfig::default());
        let buffers = [40, 48].map(|size| pool.acquire(size).unwrap());
        for buffer in buffers {
            pool.release(buffer);
        }
        backend.fail_next_maps(1);
        let buffer = pool.setup(BufferKind::Uv, &[5; 32]).unwrap();
        assert!(buffer.is_device());
        assert_eq!(backend.read_buffer(buffer.device_buffer().unwrap()).unwrap(), vec![5; 32]);
    }

    #[test]
    fn test_host_preference_skips_device() {
        let (backend, pool) = pool_with(PoolConfig::default().with_prefer_device(false));
        let buffer = pool.setup(BufferKind::Color, &[7; 6]).unwrap();
        assert_eq!(buffer.host_bytes().unwrap(), &[7; 6]);
        assert_eq!(backend.created(), 0);
    }

    #[test]
    fn test_drop_destroys_pooled_buffers() {
        let (backend, pool) = pool_with(PoolConfig::default());
        let buffer = pool.acquire(32).unwrap();
        pool.release(buffer);
        drop(pool);
        assert_eq!(backend.live(), 0);
    }
}
