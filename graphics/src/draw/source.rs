//! What a draw object is built from.

use std::ops::Range;

use subsurf_core::SubsurfMesh;
use subsurf_core::derived::DerivedMesh;
use subsurf_core::math::Vec3;

/// A quad-tessellated mesh that draw buffers can be packed from.
///
/// Quads are the mesh's polygons, four loops each, grouped by the base face
/// they were subdivided from. Corners are reported in point order
/// `a, b, c, d`, which is loop order `0, 3, 2, 1`.
pub trait DrawSource: Send + Sync {
    /// The flattened mesh holding loops, edges and attribute layers.
    fn mesh(&self) -> &dyn DerivedMesh;

    /// Base faces, in draw order.
    fn num_faces(&self) -> usize;

    /// Quad (polygon) indices owned by base face `face`.
    fn face_quads(&self, face: usize) -> Range<usize>;

    /// Positions of the four corners of `quad`.
    fn quad_corners(&self, quad: usize) -> [Vec3; 4];

    /// Smooth per-corner normals of `quad`, if the source has them.
    fn quad_normals(&self, _quad: usize) -> Option<[Vec3; 4]> {
        None
    }

    fn num_quads(&self) -> usize {
        self.mesh().num_polys()
    }
}

/// Records of grid cell `quad` in `a, b, c, d` order.
fn cell_records(mesh: &SubsurfMesh, quad: usize) -> Option<[&[f32]; 4]> {
    let loc = mesh.maps().locate_face(quad)?;
    let engine = mesh.engine();
    let at = |x, y| engine.face_grid_elem(loc.face, loc.s, x, y);
    let (x, y) = (loc.x, loc.y);
    Some([at(x, y), at(x + 1, y), at(x + 1, y + 1), at(x, y + 1)])
}

impl DrawSource for SubsurfMesh {
    fn mesh(&self) -> &dyn DerivedMesh {
        self
    }

    fn num_faces(&self) -> usize {
        self.maps().faces.len()
    }

    fn face_quads(&self, face: usize) -> Range<usize> {
        let cells = self.maps().grid_size() - 1;
        self.maps().faces.get(face).map_or(0..0, |entry| {
            entry.start_face..entry.start_face + entry.valence * cells * cells
        })
    }

    fn quad_corners(&self, quad: usize) -> [Vec3; 4] {
        let key = self.engine().key();
        match cell_records(self, quad) {
            Some(records) => records.map(|r| key.co(r)),
            None => [Vec3::zeros(); 4],
        }
    }

    fn quad_normals(&self, quad: usize) -> Option<[Vec3; 4]> {
        let key = self.engine().key();
        if !key.has_normals {
            return None;
        }
        cell_records(self, quad).map(|records| records.map(|r| key.no(r)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use subsurf_core::derived::MaterializeOptions;
    use subsurf_core::mesh::generators;
    use subsurf_core::sync::sync_from_base;
    use subsurf_core::{SubdivEngine, SubsurfFlags};

    use super::*;

    fn quad_mesh(flags: SubsurfFlags) -> SubsurfMesh {
        let base = generators::unit_quad();
        let mut engine = SubdivEngine::new(2, 3, flags);
        sync_from_base(&mut engine, &base, None, false).unwrap();
        SubsurfMesh::build(&mut Arc::new(engine), &base, MaterializeOptions::default()).unwrap()
    }

    #[test]
    fn test_corners_match_loop_vertices() {
        let mesh = quad_mesh(SubsurfFlags::CALC_NORMALS);
        let loops = mesh.loops();
        for quad in 0..mesh.num_quads() {
            let corners = mesh.quad_corners(quad);
            for (k, l) in [0, 3, 2, 1].into_iter().enumerate() {
                let v = loops[quad * 4 + l].v as usize;
                assert!((corners[k] - Vec3::from(mesh.verts()[v].co)).norm() < 1e-6);
            }
        }
    }

    #[test]
    fn test_face_quads_cover_all_polys() {
        let mesh = quad_mesh(SubsurfFlags::empty());
        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(mesh.face_quads(0), 0..16);
        assert_eq!(mesh.face_quads(1), 0..0);
    }

    #[test]
    fn test_normals_only_when_stored() {
        assert!(quad_mesh(SubsurfFlags::empty()).quad_normals(0).is_none());
        let normals = quad_mesh(SubsurfFlags::CALC_NORMALS).quad_normals(0).unwrap();
        for n in normals {
            assert!((n.norm() - 1.0).abs() < 1e-4);
        }
    }
}
