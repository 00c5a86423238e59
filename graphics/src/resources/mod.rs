//! GPU resources.
//!
//! - [`GpuBuffer`] - a draw buffer living on the device or in host memory
//! - [`BufferPool`] - recently released buffers kept for reuse
//!
//! Buffers are plain owned values. Whoever holds one owns the allocation
//! until it is handed back to the pool.

mod buffer;
mod pool;

pub use buffer::{BufferStorage, GpuBuffer};
pub use pool::{BufferPool, DEFAULT_POOL_CAPACITY, EntryState, PoolConfig, PoolStats};
