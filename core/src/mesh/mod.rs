//! Polygon mesh types.
//!
//! - [`BaseMesh`] - the coarse control mesh handed to subdivision
//! - [`CustomData`] - named per-element attribute layers
//! - [`UvVertMap`] - per-vertex UV island grouping
//! - Element records ([`MeshVert`], [`MeshEdge`], [`MeshPoly`], [`MeshLoop`])
//!   shared with materialized meshes
//! - Generators for common control cages

mod base;
mod custom_data;
pub mod generators;
mod types;
mod uv_map;

pub use base::{BaseMesh, CornerGrids};
pub use custom_data::{CustomData, Layer, LayerData, LayerKind};
pub use types::{
    EdgeFlags, FlagMat, LoopTri, MeshEdge, MeshLoop, MeshPoly, MeshVert, PolyFlags, VertFlags,
};
pub use uv_map::{STD_UV_CONNECT_LIMIT, UvMapVert, UvVertMap};
