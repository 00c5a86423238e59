//! Feeding a base mesh into a [`SubdivEngine`].

use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::SubdivEngine;
use crate::error::{Result, SubsurfError};
use crate::mesh::BaseMesh;

static TOPOLOGY_ERROR_REPORTED: AtomicBool = AtomicBool::new(false);

/// Log a topology failure the first time one happens in this process.
///
/// Returns whether this call produced the log line.
pub fn report_topology_error(err: &SubsurfError) -> bool {
    if !matches!(err, SubsurfError::TopologyInconsistency { .. }) {
        return false;
    }
    let first = !TOPOLOGY_ERROR_REPORTED.swap(true, Ordering::Relaxed);
    if first {
        log::error!("unrecoverable error in subdivision, mesh is inconsistent: {err}");
    }
    first
}

/// Sync every vertex, edge and polygon of `base` into `engine`.
///
/// Engine keys are the base indices. `vert_cos` overrides the vertex
/// positions. With `flat` every edge gets full crease, otherwise the stored
/// crease byte is scaled to the refinement depth.
///
/// On a topology error the engine keeps its previous state.
pub fn sync_from_base(
    engine: &mut SubdivEngine,
    base: &BaseMesh,
    vert_cos: Option<&[[f32; 3]]>,
    flat: bool,
) -> Result<()> {
    let crease_factor = engine.depth() as f32;
    let mut sync = engine.begin_sync();

    for (i, v) in base.verts.iter().enumerate() {
        let co = vert_cos.and_then(|cos| cos.get(i)).unwrap_or(&v.co);
        sync.sync_vert(i as i32, co, false);
    }
    for (i, e) in base.edges.iter().enumerate() {
        let crease = if flat {
            crease_factor
        } else {
            e.crease as f32 * crease_factor / 255.0
        };
        sync.sync_edge(i as i32, e.v1 as i32, e.v2 as i32, crease)?;
    }
    for p in 0..base.polys.len() {
        let verts: Vec<i32> = base.poly_verts(p).map(|v| v as i32).collect();
        if let Err(err) = sync.sync_face(p as i32, &verts) {
            report_topology_error(&err);
            return Err(err);
        }
    }
    sync.finish().inspect_err(|err| {
        report_topology_error(err);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshLoop, generators};
    use crate::settings::SubsurfFlags;

    #[test]
    fn test_sync_cube() {
        let base = generators::cube(2.0);
        let mut engine = SubdivEngine::new(2, 3, SubsurfFlags::empty());
        sync_from_base(&mut engine, &base, None, false).unwrap();
        assert_eq!(engine.num_verts(), 8);
        assert_eq!(engine.num_edges(), 12);
        assert_eq!(engine.num_faces(), 6);
    }

    #[test]
    fn test_flat_sync_uses_full_crease() {
        let base = generators::unit_quad();
        let mut engine = SubdivEngine::new(3, 3, SubsurfFlags::SIMPLE_SUBDIV);
        sync_from_base(&mut engine, &base, None, true).unwrap();
        assert!(engine.edge_ids().all(|e| engine.edge_crease(e) == 3.0));
    }

    #[test]
    fn test_inconsistent_loops_abort() {
        let mut base = generators::unit_quad();
        // Polygon now jumps across the diagonal, which has no edge.
        base.loops[1] = MeshLoop { v: 2, e: 1 };
        base.loops[2] = MeshLoop { v: 1, e: 2 };
        let mut engine = SubdivEngine::new(1, 3, SubsurfFlags::empty());
        let err = sync_from_base(&mut engine, &base, None, false).unwrap_err();
        assert!(matches!(err, SubsurfError::TopologyInconsistency { face: 0, .. }));
        assert!(!engine.is_synced());
        assert!(!report_topology_error(&err));
    }
}
