//! Draw buffers for subdivided meshes.
//!
//! A [`DrawObject`] fixes the point layout of a mesh: four points per quad,
//! material regions in the triangle buffer and loose points for vertices no
//! quad touches. Buffers of each [`BufferKind`](crate::types::BufferKind) are
//! packed by [`builder`] and uploaded through a
//! [`BufferPool`](crate::resources::BufferPool).

pub mod builder;
mod mesh;
mod object;
mod source;

pub use builder::build_buffer;
pub use mesh::DrawMesh;
pub use object::{DrawObject, MaterialRegion};
pub use source::DrawSource;
