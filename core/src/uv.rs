//! UV re-interpolation through a UV-space subdivision engine.
//!
//! Bilinear interpolation of loop UVs ignores the smoothing the geometry
//! receives, so UV layers are instead subdivided on their own: every UV
//! island corner becomes an engine vertex carrying its 2D coordinate, and the
//! engine is refined at the same depth as the geometry. Vertices on a UV seam,
//! or welded by a mirror, are kept on their island boundary.

use std::collections::HashSet;

use crate::engine::SubdivEngine;
use crate::error::Result;
use crate::mesh::{BaseMesh, CustomData, STD_UV_CONNECT_LIMIT, UvVertMap, VertFlags};
use crate::settings::SubsurfFlags;

/// Build and sync a throwaway UV engine for UV layer `n` of `base`.
///
/// Vertex keys are the loop index of each island group's first corner, edge
/// keys the loop index of the corner the edge starts at. Returns `None` when
/// the layer is absent or the mesh has no polygons.
pub fn sync_from_uv(geometry: &SubdivEngine, base: &BaseMesh, n: usize) -> Result<Option<SubdivEngine>> {
    let Some(uvs) = base.ldata.uv(n) else {
        return Ok(None);
    };
    if base.polys.is_empty() {
        return Ok(None);
    }
    let vmap = UvVertMap::build(base, uvs, [STD_UV_CONNECT_LIMIT; 2], true);
    let crease_factor = geometry.depth() as f32;
    let loop_key = |m: &crate::mesh::UvMapVert| (base.polys[m.poly as usize].loopstart + m.corner) as i32;

    let mut engine = SubdivEngine::new(geometry.depth(), 2, SubsurfFlags::USE_ARENA);
    let mut sync = engine.begin_sync();

    for (i, vert) in base.verts.iter().enumerate() {
        let groups = vmap.vert(i);
        if groups.is_empty() {
            continue;
        }
        let seam = vmap.separate_count(i) > 1 || vert.flag.contains(VertFlags::MERGED);
        for head in groups.iter().filter(|m| m.separate) {
            let key = loop_key(head);
            sync.sync_vert(key, &uvs[key as usize], seam);
        }
    }

    let face_keys = |p: usize| -> Vec<i32> {
        let poly = &base.polys[p];
        base.loops[poly.loops()]
            .iter()
            .enumerate()
            .map(|(corner, l)| {
                vmap.group_head(l.v as usize, p as u32, corner as u32)
                    .map_or(-1, |head| loop_key(&head))
            })
            .collect()
    };

    let mut seen = HashSet::new();
    for (p, poly) in base.polys.iter().enumerate() {
        let keys = face_keys(p);
        let corners = &base.loops[poly.loops()];
        let count = keys.len();
        for j in 0..count {
            let prev = (j + count - 1) % count;
            let (k0, k1) = (keys[prev], keys[j]);
            if !seen.insert((k0.min(k1), k0.max(k1))) {
                continue;
            }
            let (m0, m1) = (corners[prev].v, corners[j].v);
            let merged = (base.verts[m0 as usize].flag & base.verts[m1 as usize].flag).contains(VertFlags::MERGED);
            let crease = if merged {
                crease_factor
            } else {
                geometry
                    .find_vert(m0 as i32)
                    .zip(geometry.find_vert(m1 as i32))
                    .and_then(|(a, b)| geometry.find_edge(a, b))
                    .map_or(0.0, |e| geometry.edge_crease(e))
            };
            sync.sync_edge((poly.loopstart as usize + prev) as i32, k0, k1, crease)?;
        }
    }

    for p in 0..base.polys.len() {
        sync.sync_face(p as i32, &face_keys(p))?;
    }
    sync.finish()?;
    Ok(Some(engine))
}

/// Overwrite UV layer `n` of the materialized loop data with UV-engine
/// samples, quad corners in `(x,y), (x,y+1), (x+1,y+1), (x+1,y)` order.
pub fn set_subsurf_uv(geometry: &SubdivEngine, base: &BaseMesh, n: usize, ldata: &mut CustomData) -> Result<()> {
    let Some(uv_engine) = sync_from_uv(geometry, base, n)? else {
        return Ok(());
    };
    let Some(out) = ldata.uv_mut(n) else {
        return Ok(());
    };
    let gs = uv_engine.grid_size();
    let key = *uv_engine.key();
    let mut at = 0;
    for f in uv_engine.face_ids() {
        for s in 0..uv_engine.face_num_verts(f) {
            let grid = uv_engine.face_grid_data(f, s);
            let uv = |x, y| {
                let e = key.grid_elem(grid, x, y);
                [e[0], e[1]]
            };
            for y in 0..gs - 1 {
                for x in 0..gs - 1 {
                    if at + 4 > out.len() {
                        log::warn!("uv layer {n} shorter than subdivided loops, stopping");
                        return Ok(());
                    }
                    out[at] = uv(x, y);
                    out[at + 1] = uv(x, y + 1);
                    out[at + 2] = uv(x + 1, y + 1);
                    out[at + 3] = uv(x + 1, y);
                    at += 4;
                }
            }
        }
    }
    log::trace!("resynced uv layer {n}, {} loops", at);
    Ok(())
}
