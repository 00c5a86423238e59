//! Meshes produced by evaluation.
//!
//! [`DerivedMesh`] is the read interface shared by the two backends:
//!
//! - [`ArrayMesh`] - plain arrays, used when no subdivision happens
//! - [`SubsurfMesh`] - flattened output of the subdivision engine, keeping
//!   the engine around for grid access
//!
//! [`DerivedOutput`] is the closed set handed out by the modifier.

mod array;
mod subsurf;

use std::sync::Arc;

use fixedbitset::FixedBitSet;

pub use array::ArrayMesh;
pub use subsurf::{MaterializeOptions, SubsurfMesh};

use crate::engine::CcgKey;
use crate::handle::ORIGINDEX_NONE;
use crate::math::{Vec3, minmax_v3, normal_short_to_float, normalize_or_zero};
use crate::mesh::{CustomData, FlagMat, LoopTri, MeshEdge, MeshLoop, MeshPoly, MeshVert};

/// Element kind of an original-index layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Vert,
    Edge,
    Poly,
}

/// Read access to an evaluated mesh.
pub trait DerivedMesh: Send + Sync {
    fn verts(&self) -> &[MeshVert];
    fn edges(&self) -> &[MeshEdge];
    fn polys(&self) -> &[MeshPoly];
    /// Loop array, built on first access where needed.
    fn loops(&self) -> Arc<Vec<MeshLoop>>;
    fn looptris(&self) -> Arc<Vec<LoopTri>>;

    fn vert_data(&self) -> &CustomData;
    fn edge_data(&self) -> &CustomData;
    fn poly_data(&self) -> &CustomData;
    fn loop_data(&self) -> &CustomData;

    /// Original index per element, [`ORIGINDEX_NONE`] for synthetic ones.
    fn orig_index(&self, domain: Domain) -> Arc<Vec<i32>>;

    /// Material slots in use.
    fn totmat(&self) -> usize;

    /// UV layer painted for material `mat`, `None` for the active layer.
    fn paint_uv_slot(&self, _mat: usize) -> Option<usize> {
        None
    }

    fn num_verts(&self) -> usize {
        self.verts().len()
    }

    fn num_edges(&self) -> usize {
        self.edges().len()
    }

    fn num_polys(&self) -> usize {
        self.polys().len()
    }

    fn num_loops(&self) -> usize {
        self.polys().last().map_or(0, |p| p.loops().end)
    }

    fn vert(&self, index: usize) -> Option<MeshVert> {
        self.verts().get(index).copied()
    }

    fn edge(&self, index: usize) -> Option<MeshEdge> {
        self.edges().get(index).copied()
    }

    fn poly(&self, index: usize) -> Option<MeshPoly> {
        self.polys().get(index).copied()
    }

    fn vert_co(&self, index: usize) -> Option<Vec3> {
        self.vert(index).map(|v| Vec3::from(v.co))
    }

    fn vert_no(&self, index: usize) -> Option<Vec3> {
        self.vert(index).map(|v| normal_short_to_float(v.no))
    }

    fn vert_cos(&self) -> Vec<[f32; 3]> {
        self.verts().iter().map(|v| v.co).collect()
    }

    /// Bounds of every vertex, `None` for an empty mesh.
    fn min_max(&self) -> Option<(Vec3, Vec3)> {
        let first = Vec3::from(self.verts().first()?.co);
        let (mut min, mut max) = (first, first);
        for v in self.verts() {
            minmax_v3(&Vec3::from(v.co), &mut min, &mut max);
        }
        Some((min, max))
    }

    /// Base polygon of every polygon, `None` when polygons are not split.
    fn reverse_face_map(&self) -> Option<&[u32]> {
        None
    }

    /// Visit vertices that carry an original index.
    fn for_each_mapped_vert(&self, f: &mut dyn FnMut(usize, Vec3, Vec3)) {
        let orig = self.orig_index(Domain::Vert);
        for (v, &o) in self.verts().iter().zip(orig.iter()) {
            if o != ORIGINDEX_NONE {
                f(o as usize, Vec3::from(v.co), normal_short_to_float(v.no));
            }
        }
    }

    /// Visit edges that carry an original index, with both end positions.
    fn for_each_mapped_edge(&self, f: &mut dyn FnMut(usize, Vec3, Vec3)) {
        let orig = self.orig_index(Domain::Edge);
        let verts = self.verts();
        for (e, &o) in self.edges().iter().zip(orig.iter()) {
            if o != ORIGINDEX_NONE {
                f(
                    o as usize,
                    Vec3::from(verts[e.v1 as usize].co),
                    Vec3::from(verts[e.v2 as usize].co),
                );
            }
        }
    }

    /// Visit loops with their vertex and polygon original indices
    /// ([`ORIGINDEX_NONE`] when absent) and vertex position.
    fn for_each_mapped_loop(&self, f: &mut dyn FnMut(i32, i32, Vec3)) {
        let loops = self.loops();
        let vert_orig = self.orig_index(Domain::Vert);
        let poly_orig = self.orig_index(Domain::Poly);
        let verts = self.verts();
        for (p, poly) in self.polys().iter().enumerate() {
            for l in &loops[poly.loops()] {
                f(
                    vert_orig[l.v as usize],
                    poly_orig[p],
                    Vec3::from(verts[l.v as usize].co),
                );
            }
        }
    }

    /// Visit polygons that carry an original index with their center and
    /// normal.
    fn for_each_mapped_face_center(&self, f: &mut dyn FnMut(usize, Vec3, Vec3)) {
        let loops = self.loops();
        let orig = self.orig_index(Domain::Poly);
        let verts = self.verts();
        for (poly, &o) in self.polys().iter().zip(orig.iter()) {
            if o == ORIGINDEX_NONE {
                continue;
            }
            let corners: Vec<Vec3> = loops[poly.loops()]
                .iter()
                .map(|l| Vec3::from(verts[l.v as usize].co))
                .collect();
            let center = corners.iter().sum::<Vec3>() / corners.len().max(1) as f32;
            // Newell normal.
            let mut normal = Vec3::zeros();
            for (i, a) in corners.iter().enumerate() {
                let b = corners[(i + 1) % corners.len()];
                normal += (a - center).cross(&(b - center));
            }
            normalize_or_zero(&mut normal);
            f(o as usize, center, normal);
        }
    }

    // ------------------------------------------------------------------
    // Grids
    // ------------------------------------------------------------------

    /// Number of face-corner grids, zero for meshes without grids.
    fn num_grids(&self) -> usize {
        0
    }

    fn grid_size(&self) -> usize {
        0
    }

    fn grid_key(&self) -> Option<CcgKey> {
        None
    }

    /// Samples of grid `grid`, row-major in the [`CcgKey`] layout.
    fn grid_data(&self, _grid: usize) -> Option<&[f32]> {
        None
    }

    /// First grid of every face.
    fn grid_offset(&self) -> &[usize] {
        &[]
    }

    /// Shading flag and material per face.
    fn grid_flag_mats(&self) -> &[FlagMat] {
        &[]
    }

    fn grid_hidden(&self, _grid: usize) -> Option<&FixedBitSet> {
        None
    }
}

/// The evaluated mesh handed out by the modifier.
#[derive(Debug, Clone)]
pub enum DerivedOutput {
    Subsurf(Arc<SubsurfMesh>),
    Array(Arc<ArrayMesh>),
}

impl DerivedOutput {
    pub fn as_mesh(&self) -> &dyn DerivedMesh {
        match self {
            Self::Subsurf(mesh) => mesh.as_ref(),
            Self::Array(mesh) => mesh.as_ref(),
        }
    }

    pub fn as_subsurf(&self) -> Option<&Arc<SubsurfMesh>> {
        match self {
            Self::Subsurf(mesh) => Some(mesh),
            Self::Array(_) => None,
        }
    }
}

/// Fan triangulation of every polygon, quads split along `0-2`.
pub(crate) fn fan_looptris(polys: &[MeshPoly]) -> Vec<LoopTri> {
    let mut tris = Vec::new();
    for (p, poly) in polys.iter().enumerate() {
        let start = poly.loopstart;
        for i in 1..poly.totloop.saturating_sub(1) {
            tris.push(LoopTri {
                tri: [start, start + i, start + i + 1],
                poly: p as u32,
            });
        }
    }
    tris
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators;

    #[test]
    fn test_array_mesh_defaults() {
        let mesh = ArrayMesh::new(generators::cube(2.0));
        let (min, max) = mesh.min_max().unwrap();
        assert_eq!(min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(max, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(mesh.num_grids(), 0);
        assert_eq!(mesh.looptris().len(), 12);

        let mut centers = 0;
        mesh.for_each_mapped_face_center(&mut |_, center, normal| {
            centers += 1;
            // Outward facing: the normal points away from the origin.
            assert!(center.dot(&normal) > 0.0);
        });
        assert_eq!(centers, 6);
    }
}
