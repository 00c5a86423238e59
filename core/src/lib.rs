//! # Subsurf Core
//!
//! Catmull-Clark subdivision of polygon meshes and flattening of the result
//! into plain mesh arrays.
//!
//! The pipeline runs leaves first:
//!
//! - [`engine`] refines a synced control cage into per-element samples
//! - [`topology`] numbers those samples in one flat index space
//! - [`materialize`] emits vertex, edge, quad and loop arrays with
//!   interpolated attribute layers
//! - [`derived`] wraps the result behind the [`DerivedMesh`] trait
//! - [`modifier`] ties it together with engine caching per evaluation mode

pub mod cache;
pub mod derived;
pub mod engine;
pub mod error;
pub mod handle;
pub mod materialize;
pub mod math;
pub mod mesh;
pub mod modifier;
pub mod scratch;
pub mod settings;
pub mod sync;
pub mod topology;
pub mod uv;
pub mod weights;

pub use derived::{ArrayMesh, DerivedMesh, DerivedOutput, Domain, SubsurfMesh};
pub use engine::{CcgKey, SubdivEngine};
pub use error::{Result, SubsurfError};
pub use mesh::BaseMesh;
pub use modifier::{SubsurfModifier, limit_positions};
pub use settings::{EvalMode, SubsurfFlags, SubsurfSettings};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version.
pub fn init() {
    log::info!("Subsurf Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
