//! Plain-array derived mesh.

use std::sync::Arc;

use super::{DerivedMesh, Domain, fan_looptris};
use crate::cache::LazyCache;
use crate::mesh::{BaseMesh, CustomData, LoopTri, MeshEdge, MeshLoop, MeshPoly, MeshVert};

/// A derived mesh that is just a copy of its input arrays.
#[derive(Debug)]
pub struct ArrayMesh {
    mesh: BaseMesh,
    loops: LazyCache<Vec<MeshLoop>>,
    looptris: LazyCache<Vec<LoopTri>>,
    orig: [LazyCache<Vec<i32>>; 3],
}

impl ArrayMesh {
    pub fn new(mesh: BaseMesh) -> Self {
        Self {
            mesh,
            loops: LazyCache::new(),
            looptris: LazyCache::new(),
            orig: Default::default(),
        }
    }

    pub fn mesh(&self) -> &BaseMesh {
        &self.mesh
    }

    pub fn into_mesh(self) -> BaseMesh {
        self.mesh
    }
}

impl DerivedMesh for ArrayMesh {
    fn verts(&self) -> &[MeshVert] {
        &self.mesh.verts
    }

    fn edges(&self) -> &[MeshEdge] {
        &self.mesh.edges
    }

    fn polys(&self) -> &[MeshPoly] {
        &self.mesh.polys
    }

    fn loops(&self) -> Arc<Vec<MeshLoop>> {
        self.loops.get_or_init(|| self.mesh.loops.clone())
    }

    fn looptris(&self) -> Arc<Vec<LoopTri>> {
        self.looptris.get_or_init(|| fan_looptris(&self.mesh.polys))
    }

    fn vert_data(&self) -> &CustomData {
        &self.mesh.vdata
    }

    fn edge_data(&self) -> &CustomData {
        &self.mesh.edata
    }

    fn poly_data(&self) -> &CustomData {
        &self.mesh.pdata
    }

    fn loop_data(&self) -> &CustomData {
        &self.mesh.ldata
    }

    fn orig_index(&self, domain: Domain) -> Arc<Vec<i32>> {
        let mesh = &self.mesh;
        match domain {
            Domain::Vert => self.orig[0].get_or_init(|| (0..mesh.verts.len()).map(|i| mesh.vert_orig(i)).collect()),
            Domain::Edge => self.orig[1].get_or_init(|| (0..mesh.edges.len()).map(|i| mesh.edge_orig(i)).collect()),
            Domain::Poly => self.orig[2].get_or_init(|| (0..mesh.polys.len()).map(|i| mesh.poly_orig(i)).collect()),
        }
    }

    fn totmat(&self) -> usize {
        self.mesh.totmat.max(1)
    }

    fn paint_uv_slot(&self, mat: usize) -> Option<usize> {
        self.mesh.paint_uv_slots.get(mat).copied().flatten()
    }

    fn num_loops(&self) -> usize {
        self.mesh.loops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators;

    #[test]
    fn test_orig_index_falls_back_to_identity() {
        let mut base = generators::unit_quad();
        base.vert_origindex = Some(vec![7, 7, 8, 9]);
        let mesh = ArrayMesh::new(base);
        assert_eq!(*mesh.orig_index(Domain::Vert), vec![7, 7, 8, 9]);
        assert_eq!(*mesh.orig_index(Domain::Edge), vec![0, 1, 2, 3]);
        assert!(Arc::ptr_eq(&mesh.orig_index(Domain::Poly), &mesh.orig_index(Domain::Poly)));
    }
}
