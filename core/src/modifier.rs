//! The subdivision modifier: engine caching and evaluation entry points.

use std::sync::Arc;

use crate::derived::{ArrayMesh, DerivedOutput, MaterializeOptions, SubsurfMesh};
use crate::engine::SubdivEngine;
use crate::error::Result;
use crate::math::Vec3;
use crate::mesh::BaseMesh;
use crate::settings::{EvalMode, SubsurfFlags, SubsurfSettings};
use crate::sync::sync_from_base;

/// Flags that decide whether a cached engine can be reused.
const REUSE_MASK: SubsurfFlags = SubsurfFlags::USE_AGING
    .union(SubsurfFlags::SIMPLE_SUBDIV)
    .union(SubsurfFlags::CALC_NORMALS)
    .union(SubsurfFlags::ALLOC_MASK);

/// Subdivision modifier state: the viewport and edit engine caches.
#[derive(Debug, Default)]
pub struct SubsurfModifier {
    mcache: Option<Arc<SubdivEngine>>,
    emcache: Option<Arc<SubdivEngine>>,
}

impl SubsurfModifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `base` for `mode`.
    ///
    /// Levels are clamped to at least one, except that a render level of
    /// zero returns the input unchanged. `vert_cos` overrides the base vertex
    /// positions. On a topology error the caches keep their last good state.
    pub fn make_derived(
        &mut self,
        base: &BaseMesh,
        vert_cos: Option<&[[f32; 3]]>,
        settings: &SubsurfSettings,
        mode: EvalMode,
    ) -> Result<DerivedOutput> {
        let levels = settings.levels_for(mode);
        if levels == 0 && mode == EvalMode::Render {
            log::debug!("zero render levels, passing mesh through");
            return Ok(DerivedOutput::Array(Arc::new(ArrayMesh::new(base.clone()))));
        }
        let levels = levels.max(1);
        let depth = levels + 1;
        let simple = settings.is_simple;
        let flags = settings.engine_flags();
        let shared = flags & (SubsurfFlags::SIMPLE_SUBDIV | SubsurfFlags::USE_AGING);
        let fresh = (flags & SubsurfFlags::SIMPLE_SUBDIV) | SubsurfFlags::USE_ARENA | SubsurfFlags::CALC_NORMALS;
        let options = MaterializeOptions {
            draw_interior_edges: settings.draw_interior_edges,
            use_subsurf_uv: settings.use_subsurf_uv,
        };

        let mesh = match mode {
            EvalMode::Edit => {
                let engine = cached_engine(&mut self.emcache, depth, shared | SubsurfFlags::CALC_NORMALS);
                evaluate(engine, base, vert_cos, simple, options)?
            }
            EvalMode::Render => {
                let mut engine = Arc::new(SubdivEngine::new(depth, 3, fresh));
                evaluate(&mut engine, base, vert_cos, simple, options)?
            }
            EvalMode::Viewport => {
                self.emcache = None;
                if settings.use_incremental_cache {
                    let engine = cached_engine(&mut self.mcache, depth, shared | SubsurfFlags::CALC_NORMALS);
                    evaluate(engine, base, vert_cos, simple, options)?
                } else {
                    let mut engine = Arc::new(SubdivEngine::new(depth, 3, fresh | (flags & SubsurfFlags::ALLOC_MASK)));
                    let mesh = evaluate(&mut engine, base, vert_cos, simple, options)?;
                    self.mcache = Some(engine);
                    mesh
                }
            }
        };
        log::debug!(
            "subdivided {} polys into {} quads at level {levels}",
            base.polys.len(),
            mesh.arrays().polys.len()
        );
        Ok(DerivedOutput::Subsurf(Arc::new(mesh)))
    }

    /// Drop both engine caches.
    pub fn release(&mut self) {
        self.mcache = None;
        self.emcache = None;
    }

    pub fn viewport_cache(&self) -> Option<&Arc<SubdivEngine>> {
        self.mcache.as_ref()
    }

    pub fn edit_cache(&self) -> Option<&Arc<SubdivEngine>> {
        self.emcache.as_ref()
    }
}

/// Reuse the cached engine when its depth and layout flags match, otherwise
/// replace it.
fn cached_engine(slot: &mut Option<Arc<SubdivEngine>>, depth: u32, flags: SubsurfFlags) -> &mut Arc<SubdivEngine> {
    let reusable = slot
        .as_ref()
        .is_some_and(|e| e.depth() == depth && (e.flags() & REUSE_MASK) == (flags & REUSE_MASK));
    if !reusable {
        log::trace!("new cached engine at depth {depth}");
        *slot = Some(Arc::new(SubdivEngine::new(depth, 3, flags)));
    }
    slot.get_or_insert_with(|| Arc::new(SubdivEngine::new(depth, 3, flags)))
}

fn evaluate(
    engine: &mut Arc<SubdivEngine>,
    base: &BaseMesh,
    vert_cos: Option<&[[f32; 3]]>,
    simple: bool,
    options: MaterializeOptions,
) -> Result<SubsurfMesh> {
    sync_from_base(Arc::make_mut(engine), base, vert_cos, simple)?;
    SubsurfMesh::build(engine, base, options)
}

/// Limit-surface positions of the base vertices.
///
/// Uses a single refinement step; boundary vertices get an ad-hoc face-sum
/// correction rather than the exact boundary limit.
pub fn limit_positions(base: &BaseMesh) -> Result<Vec<[f32; 3]>> {
    let mut engine = SubdivEngine::new(1, 3, SubsurfFlags::USE_ARENA);
    sync_from_base(&mut engine, base, None, false)?;
    let key = *engine.key();
    let mut out: Vec<[f32; 3]> = base.verts.iter().map(|v| v.co).collect();

    for v in engine.vert_ids() {
        let n = engine.vert_num_edges(v);
        if n == 0 {
            continue;
        }
        let num_faces = engine.vert_num_faces(v);
        let edge_sum: Vec3 = engine.vert_edges(v).iter().map(|&e| key.co(engine.edge_elem(e, 1))).sum();
        let mut face_sum: Vec3 = engine.vert_faces(v).iter().map(|&f| key.co(engine.face_center_data(f))).sum();
        if num_faces != 0 && num_faces != n {
            face_sum *= n as f32 / num_faces as f32;
        }
        let co = key.co(engine.vert_data(v));
        let n = n as f32;
        let p = (co * n * n + edge_sum * 4.0 + face_sum) / (n * (n + 5.0));
        out[engine.vert_key(v) as usize] = [p.x, p.y, p.z];
    }
    Ok(out)
}
