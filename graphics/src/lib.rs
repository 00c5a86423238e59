//! # Subsurf Graphics
//!
//! Draw buffers for subdivided meshes.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`DrawObject`] - point layout and material regions of one mesh
//! - [`DrawMesh`] - a mesh whose draw buffers are built on first use
//! - [`BufferPool`] - released buffers kept around for reuse
//! - [`GpuBackend`] - trait for the graphics API the buffers live in, with a
//!   [`DummyBackend`] for testing
//!
//! ## Example
//!
//! ```ignore
//! use subsurf_graphics::{BufferKind, BufferPool, DrawMesh, PoolConfig, backend};
//!
//! let pool = Arc::new(BufferPool::new(backend::create_backend(), PoolConfig::new()));
//! let mut draw = DrawMesh::new(Arc::new(subsurf_mesh), pool);
//! let positions = draw.buffer(BufferKind::Vertex);
//! ```

pub mod backend;
pub mod draw;
pub mod error;
pub mod resources;
pub mod types;

pub use backend::{BackendError, DummyBackend, GpuBackend};
pub use draw::{DrawMesh, DrawObject, DrawSource, MaterialRegion};
pub use error::DrawError;
pub use resources::{BufferPool, GpuBuffer, PoolConfig};
pub use types::{BufferDescriptor, BufferKind, BufferUsage, ComponentType};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
pub fn init() {
    log::info!("Subsurf Graphics v{} initialized", VERSION);
}
