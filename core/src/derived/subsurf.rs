//! Derived mesh backed by the subdivision engine.

use std::collections::HashMap;
use std::sync::Arc;

use fixedbitset::FixedBitSet;

use super::{DerivedMesh, Domain};
use crate::cache::LazyCache;
use crate::engine::{CcgKey, SubdivEngine};
use crate::error::{Result, SubsurfError};
use crate::handle::{FaceId, ORIGINDEX_NONE};
use crate::materialize::{Materialized, Materializer};
use crate::math::{Vec3, normal_float_to_short};
use crate::mesh::{
    BaseMesh, CustomData, EdgeFlags, FlagMat, LayerKind, LoopTri, MeshEdge, MeshLoop, MeshPoly, MeshVert,
    VertFlags,
};
use crate::sync::report_topology_error;
use crate::topology::{EdgeLocation, TopologyMaps, VertLocation};
use crate::uv;

/// Options applied while flattening an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterializeOptions {
    pub draw_interior_edges: bool,
    /// Re-interpolate every UV layer through a UV-space engine.
    pub use_subsurf_uv: bool,
}

/// Flattened subdivision result plus the engine it came from.
#[derive(Debug)]
pub struct SubsurfMesh {
    engine: Arc<SubdivEngine>,
    maps: TopologyMaps,
    arrays: Materialized,
    totmat: usize,
    paint_uv_slots: Vec<Option<usize>>,
    draw_interior_edges: bool,

    grid_faces: Vec<(FaceId, usize)>,
    grid_offset: Vec<usize>,
    grid_hidden: Vec<Option<FixedBitSet>>,

    edge_hash: LazyCache<HashMap<(u32, u32), u32>>,
    loops: LazyCache<Vec<MeshLoop>>,
    looptris: LazyCache<Vec<LoopTri>>,
    orig_verts: LazyCache<Vec<i32>>,
    orig_edges: LazyCache<Vec<i32>>,
    orig_polys: LazyCache<Vec<i32>>,
}

impl SubsurfMesh {
    /// Flatten a synced engine.
    ///
    /// User data is written into the engine, so a shared engine is cloned
    /// first. Fails without touching `engine` when its topology is
    /// inconsistent. Loops are resolved here, so a quad side without a
    /// flattened edge fails the build instead of surfacing later.
    pub fn build(engine: &mut Arc<SubdivEngine>, base: &BaseMesh, options: MaterializeOptions) -> Result<Self> {
        TopologyMaps::validate(engine).inspect_err(|err| {
            report_topology_error(err);
        })?;
        let ss = Arc::make_mut(engine);
        let maps = TopologyMaps::build(ss, base)?;
        let mut arrays = Materializer::new(maps.grid_size())
            .with_draw_interior_edges(options.draw_interior_edges)
            .run(ss, &maps, base);

        if options.use_subsurf_uv {
            for n in 0..base.ldata.count(LayerKind::Uv) {
                if let Err(err) = uv::set_subsurf_uv(ss, base, n, &mut arrays.ldata) {
                    report_topology_error(&err);
                    log::warn!("keeping interpolated uvs for layer {n}: {err}");
                }
            }
        }

        let mut grid_faces = Vec::new();
        let mut grid_offset = Vec::with_capacity(maps.faces.len());
        for entry in &maps.faces {
            grid_offset.push(grid_faces.len());
            grid_faces.extend((0..entry.valence).map(|s| (entry.face, s)));
        }
        let grid_hidden = match &base.corner_grids {
            Some(cg) => maps
                .faces
                .iter()
                .flat_map(|entry| base.polys[ss.face_key(entry.face) as usize].loops())
                .map(|l| cg.hidden.get(l).cloned().flatten())
                .collect(),
            None => vec![None; grid_faces.len()],
        };

        let mesh = Self {
            engine: Arc::clone(engine),
            maps,
            arrays,
            totmat: base.totmat.max(1),
            paint_uv_slots: base.paint_uv_slots.clone(),
            draw_interior_edges: options.draw_interior_edges,
            grid_faces,
            grid_offset,
            grid_hidden,
            edge_hash: LazyCache::new(),
            loops: LazyCache::new(),
            looptris: LazyCache::new(),
            orig_verts: LazyCache::new(),
            orig_edges: LazyCache::new(),
            orig_polys: LazyCache::new(),
        };
        let loops = mesh.quad_loops().inspect_err(|err| {
            report_topology_error(err);
        })?;
        mesh.loops.get_or_init(|| loops);
        Ok(mesh)
    }

    pub fn engine(&self) -> &Arc<SubdivEngine> {
        &self.engine
    }

    pub fn maps(&self) -> &TopologyMaps {
        &self.maps
    }

    pub fn arrays(&self) -> &Materialized {
        &self.arrays
    }

    /// Vertex-pair to edge index lookup over the flattened edges.
    pub fn edge_hash(&self) -> Arc<HashMap<(u32, u32), u32>> {
        self.edge_hash.get_or_init(|| {
            self.arrays
                .edges
                .iter()
                .enumerate()
                .map(|(i, e)| ((e.v1.min(e.v2), e.v1.max(e.v2)), i as u32))
                .collect()
        })
    }

    /// Flattened vertex indices of every quad, in loop order.
    pub fn quad_verts(&self) -> impl Iterator<Item = [u32; 4]> + '_ {
        let gs = self.maps.grid_size();
        let engine = self.engine.as_ref();
        self.maps.faces.iter().flat_map(move |entry| {
            let f = entry.face;
            (0..entry.valence).flat_map(move |s| {
                (0..gs - 1).flat_map(move |y| {
                    (0..gs - 1).map(move |x| {
                        let at = |x, y| self.maps.face_vert_index(engine, f, s, x, y) as u32;
                        [at(x, y), at(x, y + 1), at(x + 1, y + 1), at(x + 1, y)]
                    })
                })
            })
        })
    }

    /// One loop per quad corner, pointing at the edge to the next corner.
    fn quad_loops(&self) -> Result<Vec<MeshLoop>> {
        let hash = self.edge_hash();
        let quads_per_grid = (self.maps.grid_size() - 1).pow(2);
        let mut loops = Vec::with_capacity(self.maps.total_loops());
        for (quad, corners) in self.quad_verts().enumerate() {
            for k in 0..4 {
                let (a, b) = (corners[k], corners[(k + 1) % 4]);
                let Some(&e) = hash.get(&(a.min(b), a.max(b))) else {
                    let face = self.grid_faces[quad / quads_per_grid].0;
                    return Err(SubsurfError::topology(
                        self.engine.face_key(face),
                        format!("no edge between flattened vertices {a} and {b}"),
                    ));
                };
                loops.push(MeshLoop { v: a, e });
            }
        }
        Ok(loops)
    }

    /// Mark flattened vertices hidden where the base mesh's corner grids are.
    pub fn copy_grid_hidden(&self, base: &BaseMesh, verts: &mut [MeshVert]) {
        let Some(cg) = &base.corner_grids else {
            return;
        };
        self.for_each_corner_sample(base, cg.grid_size(), |loop_index, offset, vert| {
            if let Some(hidden) = cg.hidden.get(loop_index).and_then(Option::as_ref)
                && hidden.contains(offset)
                && let Some(v) = verts.get_mut(vert)
            {
                v.flag |= VertFlags::HIDDEN;
            }
        });
    }

    /// Copy the base mesh's per-corner paint masks onto flattened vertices.
    pub fn copy_grid_paint_mask(&self, base: &BaseMesh, mask: &mut [f32]) {
        let Some(cg) = &base.corner_grids else {
            return;
        };
        self.for_each_corner_sample(base, cg.grid_size(), |loop_index, offset, vert| {
            if let Some(&value) = cg.paint_mask.get(loop_index).and_then(|m| m.get(offset))
                && let Some(slot) = mask.get_mut(vert)
            {
                *slot = value;
            }
        });
    }

    fn for_each_corner_sample(&self, base: &BaseMesh, corner_size: usize, mut f: impl FnMut(usize, usize, usize)) {
        let gs = self.maps.grid_size();
        let factor = ((corner_size - 1) / (gs - 1)).max(1);
        for entry in &self.maps.faces {
            let poly = &base.polys[self.engine.face_key(entry.face) as usize];
            for (s, loop_index) in poly.loops().enumerate().take(entry.valence) {
                for y in 0..gs {
                    for x in 0..gs {
                        let vert = self.maps.face_vert_index(&self.engine, entry.face, s, x, y);
                        let offset = (y * factor) * corner_size + x * factor;
                        f(loop_index, offset, vert);
                    }
                }
            }
        }
    }

    fn record_vert(&self, record: &[f32], flag: VertFlags) -> MeshVert {
        let key = self.engine.key();
        let mut v = MeshVert::new([record[0], record[1], record[2]]);
        if key.has_normals {
            v.no = normal_float_to_short(&key.no(record));
        }
        v.flag = flag;
        v
    }
}

impl DerivedMesh for SubsurfMesh {
    fn verts(&self) -> &[MeshVert] {
        &self.arrays.verts
    }

    fn edges(&self) -> &[MeshEdge] {
        &self.arrays.edges
    }

    fn polys(&self) -> &[MeshPoly] {
        &self.arrays.polys
    }

    fn loops(&self) -> Arc<Vec<MeshLoop>> {
        // Filled by `build`, which fails when a quad side has no edge.
        self.loops.get_or_init(Vec::new)
    }

    fn looptris(&self) -> Arc<Vec<LoopTri>> {
        self.looptris.get_or_init(|| {
            let mut tris = Vec::with_capacity(self.arrays.polys.len() * 2);
            for (p, poly) in self.arrays.polys.iter().enumerate() {
                let l = poly.loopstart;
                let poly = p as u32;
                tris.push(LoopTri { tri: [l, l + 3, l + 2], poly });
                tris.push(LoopTri { tri: [l, l + 2, l + 1], poly });
            }
            tris
        })
    }

    fn vert_data(&self) -> &CustomData {
        &self.arrays.vdata
    }

    fn edge_data(&self) -> &CustomData {
        &self.arrays.edata
    }

    fn poly_data(&self) -> &CustomData {
        &self.arrays.pdata
    }

    fn loop_data(&self) -> &CustomData {
        &self.arrays.ldata
    }

    fn orig_index(&self, domain: Domain) -> Arc<Vec<i32>> {
        let engine = &self.engine;
        let maps = &self.maps;
        match domain {
            Domain::Vert => self.orig_verts.get_or_init(|| {
                let mut orig = vec![ORIGINDEX_NONE; maps.total_verts];
                for entry in &maps.verts {
                    orig[entry.start_vert] = engine.vert_user(entry.vert).orig;
                }
                orig
            }),
            Domain::Edge => self.orig_edges.get_or_init(|| {
                let mut orig = vec![ORIGINDEX_NONE; maps.total_edges];
                let count = maps.edge_size() - 1;
                for entry in &maps.edges {
                    let o = engine.edge_user(entry.edge).orig;
                    orig[entry.start_edge..entry.start_edge + count].fill(o);
                }
                orig
            }),
            Domain::Poly => self.orig_polys.get_or_init(|| {
                let mut orig = vec![ORIGINDEX_NONE; maps.total_faces];
                let cells = (maps.grid_size() - 1) * (maps.grid_size() - 1);
                for entry in &maps.faces {
                    let o = engine.face_user(entry.face).orig;
                    let end = entry.start_face + entry.valence * cells;
                    orig[entry.start_face..end].fill(o);
                }
                orig
            }),
        }
    }

    fn totmat(&self) -> usize {
        self.totmat
    }

    fn paint_uv_slot(&self, mat: usize) -> Option<usize> {
        self.paint_uv_slots.get(mat).copied().flatten()
    }

    fn num_loops(&self) -> usize {
        self.maps.total_loops()
    }

    /// Resolved through the index maps straight from the engine samples.
    fn vert(&self, index: usize) -> Option<MeshVert> {
        let engine = &self.engine;
        let gs = self.maps.grid_size();
        let v = match self.maps.locate_vert(index)? {
            VertLocation::FaceCenter { face } => self.record_vert(engine.face_center_data(face), VertFlags::empty()),
            VertLocation::FaceRing { face, s, x } => {
                self.record_vert(engine.face_grid_elem(face, s, x, 0), VertFlags::empty())
            }
            VertLocation::FaceInterior { face, s, x, y } => {
                self.record_vert(engine.face_grid_elem(face, s, x, y), VertFlags::empty())
            }
            VertLocation::EdgeInterior { edge, x } => {
                debug_assert!(x < 2 * gs - 2);
                self.record_vert(engine.edge_elem(edge, x), VertFlags::empty())
            }
            VertLocation::Vert { .. } => return self.arrays.verts.get(index).copied(),
        };
        Some(v)
    }

    fn edge(&self, index: usize) -> Option<MeshEdge> {
        let engine = &self.engine;
        let maps = &self.maps;
        let interior = if self.draw_interior_edges {
            EdgeFlags::EDGEDRAW | EdgeFlags::EDGERENDER
        } else {
            EdgeFlags::empty()
        };
        let (v1, v2, flag) = match maps.locate_edge(index)? {
            EdgeLocation::FaceRing { face, s, x } => (
                maps.face_vert_index(engine, face, s, x, 0),
                maps.face_vert_index(engine, face, s, x + 1, 0),
                interior,
            ),
            EdgeLocation::FaceInner { face, s, x, y, vertical: true } => (
                maps.face_vert_index(engine, face, s, x, y),
                maps.face_vert_index(engine, face, s, x, y + 1),
                interior,
            ),
            EdgeLocation::FaceInner { face, s, x, y, vertical: false } => (
                maps.face_vert_index(engine, face, s, y, x),
                maps.face_vert_index(engine, face, s, y + 1, x),
                interior,
            ),
            EdgeLocation::Edge { edge, x } => (
                maps.edge_vert_index(engine, edge, x),
                maps.edge_vert_index(engine, edge, x + 1),
                self.arrays.edges.get(index)?.flag,
            ),
        };
        Some(MeshEdge {
            v1: v1 as u32,
            v2: v2 as u32,
            crease: 0,
            flag,
        })
    }

    fn poly(&self, index: usize) -> Option<MeshPoly> {
        let location = self.maps.locate_face(index)?;
        let face = self.maps.faces.get(location.face.index())?;
        let fm = self.arrays.flag_mats.get(location.face.index())?;
        debug_assert_eq!(face.face, location.face);
        Some(MeshPoly {
            loopstart: index as u32 * 4,
            totloop: 4,
            mat_nr: fm.mat_nr,
            flag: fm.flag,
        })
    }

    fn reverse_face_map(&self) -> Option<&[u32]> {
        Some(&self.arrays.reverse_face_map)
    }

    /// Face centers come straight from the engine.
    fn for_each_mapped_face_center(&self, f: &mut dyn FnMut(usize, Vec3, Vec3)) {
        let key = self.engine.key();
        for face in self.engine.face_ids() {
            let orig = self.engine.face_user(face).orig;
            if orig == ORIGINDEX_NONE {
                continue;
            }
            let center = self.engine.face_center_data(face);
            f(orig as usize, key.co(center), key.no(center));
        }
    }

    fn num_grids(&self) -> usize {
        self.grid_faces.len()
    }

    fn grid_size(&self) -> usize {
        self.maps.grid_size()
    }

    fn grid_key(&self) -> Option<CcgKey> {
        Some(*self.engine.key())
    }

    fn grid_data(&self, grid: usize) -> Option<&[f32]> {
        let &(face, s) = self.grid_faces.get(grid)?;
        Some(self.engine.face_grid_data(face, s))
    }

    fn grid_offset(&self) -> &[usize] {
        &self.grid_offset
    }

    fn grid_flag_mats(&self) -> &[FlagMat] {
        &self.arrays.flag_mats
    }

    fn grid_hidden(&self, grid: usize) -> Option<&FixedBitSet> {
        self.grid_hidden.get(grid)?.as_ref()
    }
}

static_assertions::assert_impl_all!(SubsurfMesh: Send, Sync);
