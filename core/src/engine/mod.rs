//! The subdivision engine: a synced control cage plus its uniformly refined
//! samples.
//!
//! Callers feed the cage through a [`SyncSession`] and read back, per
//! element, the top-level samples:
//!
//! - one record per vertex,
//! - `edge_size` records per edge, running from `v0` to `v1`,
//! - one `grid_size × grid_size` grid per face corner.
//!
//! Grid `S` of a face has its `(0, 0)` sample on the face center. Its
//! `x = grid_size - 1` column lies along face edge `S` (midpoint at `y = 0`,
//! vertex `S` at `y = grid_size - 1`) and its `y = grid_size - 1` row along
//! face edge `S - 1`.

mod key;
mod refine;

use std::collections::HashMap;

pub use key::CcgKey;

use crate::error::{Result, SubsurfError};
use crate::handle::{EdgeId, FaceId, UserData, VertexId};
use crate::settings::SubsurfFlags;

#[derive(Debug, Clone)]
pub(crate) struct Vert {
    pub key: i32,
    pub data: Vec<f32>,
    pub seam: bool,
    pub edges: Vec<EdgeId>,
    pub faces: Vec<FaceId>,
    pub user: UserData,
}

#[derive(Debug, Clone)]
pub(crate) struct Edge {
    pub key: i32,
    pub v: [VertexId; 2],
    pub crease: f32,
    pub faces: Vec<FaceId>,
    pub user: UserData,
}

#[derive(Debug, Clone)]
pub(crate) struct Face {
    pub key: i32,
    pub verts: Vec<VertexId>,
    /// Edge `k` joins `verts[k]` and `verts[k + 1]`.
    pub edges: Vec<EdgeId>,
    pub user: UserData,
}

/// Uniform Catmull-Clark subdivision of a synced cage.
#[derive(Debug, Clone)]
pub struct SubdivEngine {
    key: CcgKey,
    flags: SubsurfFlags,
    verts: Vec<Vert>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    vert_lookup: HashMap<i32, VertexId>,
    edge_lookup: HashMap<(VertexId, VertexId), EdgeId>,
    samples: refine::Samples,
    generation: u32,
    synced: bool,
}

impl SubdivEngine {
    /// Engine refining `depth` times over records of `num_layers` floats.
    ///
    /// Normals are only computed when `CALC_NORMALS` is set and the records
    /// carry at least a 3D position.
    pub fn new(depth: u32, num_layers: usize, flags: SubsurfFlags) -> Self {
        let has_normals = flags.contains(SubsurfFlags::CALC_NORMALS) && num_layers >= 3;
        let has_mask = flags.contains(SubsurfFlags::ALLOC_MASK);
        Self {
            key: CcgKey::new(depth.max(1), num_layers, has_mask, has_normals),
            flags,
            verts: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            vert_lookup: HashMap::new(),
            edge_lookup: HashMap::new(),
            samples: refine::Samples::default(),
            generation: 0,
            synced: false,
        }
    }

    pub fn key(&self) -> &CcgKey {
        &self.key
    }

    pub fn flags(&self) -> SubsurfFlags {
        self.flags
    }

    /// Refinement depth.
    pub fn depth(&self) -> u32 {
        self.key.level
    }

    pub fn grid_size(&self) -> usize {
        self.key.grid_size
    }

    pub fn edge_size(&self) -> usize {
        2 * self.key.grid_size - 1
    }

    /// Whether a sync has completed since the engine was created.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Number of completed syncs.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn num_verts(&self) -> usize {
        self.verts.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn vert_ids(&self) -> impl ExactSizeIterator<Item = VertexId> + use<> {
        (0..self.verts.len()).map(VertexId::new)
    }

    pub fn edge_ids(&self) -> impl ExactSizeIterator<Item = EdgeId> + use<> {
        (0..self.edges.len()).map(EdgeId::new)
    }

    pub fn face_ids(&self) -> impl ExactSizeIterator<Item = FaceId> + use<> {
        (0..self.faces.len()).map(FaceId::new)
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Vertex synced under `key`.
    pub fn find_vert(&self, key: i32) -> Option<VertexId> {
        self.vert_lookup.get(&key).copied()
    }

    pub fn vert_key(&self, v: VertexId) -> i32 {
        self.verts[v.index()].key
    }

    pub fn vert_is_seam(&self, v: VertexId) -> bool {
        self.verts[v.index()].seam
    }

    pub fn vert_num_edges(&self, v: VertexId) -> usize {
        self.verts[v.index()].edges.len()
    }

    pub fn vert_num_faces(&self, v: VertexId) -> usize {
        self.verts[v.index()].faces.len()
    }

    pub fn vert_edges(&self, v: VertexId) -> &[EdgeId] {
        &self.verts[v.index()].edges
    }

    pub fn vert_faces(&self, v: VertexId) -> &[FaceId] {
        &self.verts[v.index()].faces
    }

    pub fn edge_key(&self, e: EdgeId) -> i32 {
        self.edges[e.index()].key
    }

    /// Canonical endpoints of an edge, `[v0, v1]`.
    pub fn edge_verts(&self, e: EdgeId) -> [VertexId; 2] {
        self.edges[e.index()].v
    }

    pub fn edge_crease(&self, e: EdgeId) -> f32 {
        self.edges[e.index()].crease
    }

    pub fn edge_num_faces(&self, e: EdgeId) -> usize {
        self.edges[e.index()].faces.len()
    }

    pub fn edge_faces(&self, e: EdgeId) -> &[FaceId] {
        &self.edges[e.index()].faces
    }

    /// Edge between two vertices, in either direction.
    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        self.edge_lookup.get(&(a.min(b), a.max(b))).copied()
    }

    pub fn face_key(&self, f: FaceId) -> i32 {
        self.faces[f.index()].key
    }

    pub fn face_num_verts(&self, f: FaceId) -> usize {
        self.faces[f.index()].verts.len()
    }

    pub fn face_vert(&self, f: FaceId, s: usize) -> VertexId {
        self.faces[f.index()].verts[s]
    }

    pub fn face_verts(&self, f: FaceId) -> &[VertexId] {
        &self.faces[f.index()].verts
    }

    /// Face edge `s`, joining face verts `s` and `s + 1`.
    pub fn face_edge(&self, f: FaceId, s: usize) -> EdgeId {
        self.faces[f.index()].edges[s]
    }

    // ------------------------------------------------------------------
    // User data
    // ------------------------------------------------------------------

    pub fn vert_user(&self, v: VertexId) -> &UserData {
        &self.verts[v.index()].user
    }

    pub fn vert_user_mut(&mut self, v: VertexId) -> &mut UserData {
        &mut self.verts[v.index()].user
    }

    pub fn edge_user(&self, e: EdgeId) -> &UserData {
        &self.edges[e.index()].user
    }

    pub fn edge_user_mut(&mut self, e: EdgeId) -> &mut UserData {
        &mut self.edges[e.index()].user
    }

    pub fn face_user(&self, f: FaceId) -> &UserData {
        &self.faces[f.index()].user
    }

    pub fn face_user_mut(&mut self, f: FaceId) -> &mut UserData {
        &mut self.faces[f.index()].user
    }

    // ------------------------------------------------------------------
    // Samples
    // ------------------------------------------------------------------

    /// Synced (unrefined) data of a vertex.
    pub fn vert_input(&self, v: VertexId) -> &[f32] {
        &self.verts[v.index()].data
    }

    /// Limit record of a base vertex.
    pub fn vert_data(&self, v: VertexId) -> &[f32] {
        let size = self.key.elem_size;
        &self.samples.vert[v.index() * size..(v.index() + 1) * size]
    }

    /// All `edge_size` records of an edge, from `v0` to `v1`.
    pub fn edge_data(&self, e: EdgeId) -> &[f32] {
        let len = self.edge_size() * self.key.elem_size;
        &self.samples.edge[e.index() * len..(e.index() + 1) * len]
    }

    /// Record `x` along an edge.
    pub fn edge_elem(&self, e: EdgeId, x: usize) -> &[f32] {
        let size = self.key.elem_size;
        &self.edge_data(e)[x * size..(x + 1) * size]
    }

    /// Every grid of a face, corner by corner.
    pub fn face_data(&self, f: FaceId) -> &[f32] {
        let start = self.samples.face_start[f.index()];
        let len = self.faces[f.index()].verts.len() * self.grid_len();
        &self.samples.face[start..start + len]
    }

    /// Grid of face corner `s`, row-major.
    pub fn face_grid_data(&self, f: FaceId, s: usize) -> &[f32] {
        let len = self.grid_len();
        &self.face_data(f)[s * len..(s + 1) * len]
    }

    pub fn face_grid_data_mut(&mut self, f: FaceId, s: usize) -> &mut [f32] {
        let len = self.grid_len();
        let start = self.samples.face_start[f.index()] + s * len;
        &mut self.samples.face[start..start + len]
    }

    /// Record `(x, y)` of face corner grid `s`.
    pub fn face_grid_elem(&self, f: FaceId, s: usize, x: usize, y: usize) -> &[f32] {
        self.key.grid_elem(self.face_grid_data(f, s), x, y)
    }

    /// Face center record, shared by every corner grid.
    pub fn face_center_data(&self, f: FaceId) -> &[f32] {
        &self.face_grid_data(f, 0)[..self.key.elem_size]
    }

    fn grid_len(&self) -> usize {
        self.key.grid_area * self.key.elem_size
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Start feeding the cage. Nothing changes until [`SyncSession::finish`].
    pub fn begin_sync(&mut self) -> SyncSession<'_> {
        log::trace!("begin sync, generation {}", self.generation);
        SyncSession {
            engine: self,
            verts: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            vert_lookup: HashMap::new(),
            edge_lookup: HashMap::new(),
        }
    }

    fn topology_matches(&self, verts: &[Vert], edges: &[Edge], faces: &[Face]) -> bool {
        self.synced
            && self.verts.len() == verts.len()
            && self.edges.len() == edges.len()
            && self.faces.len() == faces.len()
            && self.verts.iter().zip(verts).all(|(a, b)| a.key == b.key && a.seam == b.seam)
            && self
                .edges
                .iter()
                .zip(edges)
                .all(|(a, b)| a.key == b.key && a.v == b.v && a.crease == b.crease)
            && self
                .faces
                .iter()
                .zip(faces)
                .all(|(a, b)| a.key == b.key && a.verts == b.verts)
    }
}

/// One pass of feeding a cage into a [`SubdivEngine`].
///
/// Elements are collected on the side; the engine is only updated by
/// [`finish`](Self::finish). Dropping an unfinished session leaves the engine
/// as it was.
pub struct SyncSession<'a> {
    engine: &'a mut SubdivEngine,
    verts: Vec<Vert>,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    vert_lookup: HashMap<i32, VertexId>,
    edge_lookup: HashMap<(VertexId, VertexId), EdgeId>,
}

impl SyncSession<'_> {
    /// Add a vertex. `data` is truncated or zero-padded to the record's data
    /// layers. Re-syncing a key overwrites its data.
    pub fn sync_vert(&mut self, key: i32, data: &[f32], seam: bool) -> VertexId {
        let size = self.engine.key.interp_size();
        let mut record = vec![0.0; size];
        let n = data.len().min(size);
        record[..n].copy_from_slice(&data[..n]);

        if let Some(&id) = self.vert_lookup.get(&key) {
            let v = &mut self.verts[id.index()];
            v.data = record;
            v.seam = seam;
            return id;
        }
        let id = VertexId::new(self.verts.len());
        self.verts.push(Vert {
            key,
            data: record,
            seam,
            edges: Vec::new(),
            faces: Vec::new(),
            user: UserData::default(),
        });
        self.vert_lookup.insert(key, id);
        id
    }

    /// Add an edge between two synced vertex keys.
    pub fn sync_edge(&mut self, key: i32, v0: i32, v1: i32, crease: f32) -> Result<EdgeId> {
        let a = self.lookup_vert(v0, || format!("edge {key} references unknown vertex {v0}"))?;
        let b = self.lookup_vert(v1, || format!("edge {key} references unknown vertex {v1}"))?;
        let crease = crease.clamp(0.0, self.engine.key.level as f32);
        let pair = (a.min(b), a.max(b));
        if let Some(&id) = self.edge_lookup.get(&pair) {
            self.edges[id.index()].crease = crease;
            return Ok(id);
        }
        let id = EdgeId::new(self.edges.len());
        self.edges.push(Edge {
            key,
            v: [a, b],
            crease,
            faces: Vec::new(),
            user: UserData::default(),
        });
        self.verts[a.index()].edges.push(id);
        if a != b {
            self.verts[b.index()].edges.push(id);
        }
        self.edge_lookup.insert(pair, id);
        Ok(id)
    }

    /// Add a face over synced vertex keys, in winding order.
    ///
    /// Every pair of consecutive vertices must already be joined by a synced
    /// edge. Faces with fewer than three vertices are skipped.
    pub fn sync_face(&mut self, key: i32, vert_keys: &[i32]) -> Result<Option<FaceId>> {
        if vert_keys.len() < 3 {
            log::warn!("skipping face {key} with {} vertices", vert_keys.len());
            return Ok(None);
        }
        let verts = vert_keys
            .iter()
            .map(|&k| self.lookup_vert(k, || format!("unknown vertex {k}")))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| relabel(e, key))?;
        let n = verts.len();
        let mut edges = Vec::with_capacity(n);
        for s in 0..n {
            let (a, b) = (verts[s], verts[(s + 1) % n]);
            let e = self.edge_lookup.get(&(a.min(b), a.max(b))).copied().ok_or_else(|| {
                SubsurfError::topology(
                    key,
                    format!("no edge between vertices {} and {}", vert_keys[s], vert_keys[(s + 1) % n]),
                )
            })?;
            edges.push(e);
        }

        let id = FaceId::new(self.faces.len());
        for &v in &verts {
            let faces = &mut self.verts[v.index()].faces;
            if !faces.contains(&id) {
                faces.push(id);
            }
        }
        for &e in &edges {
            self.edges[e.index()].faces.push(id);
        }
        self.faces.push(Face {
            key,
            verts,
            edges,
            user: UserData::default(),
        });
        Ok(Some(id))
    }

    /// Number of vertices synced so far.
    pub fn num_verts(&self) -> usize {
        self.verts.len()
    }

    fn lookup_vert(&self, key: i32, reason: impl FnOnce() -> String) -> Result<VertexId> {
        self.vert_lookup
            .get(&key)
            .copied()
            .ok_or_else(|| SubsurfError::topology(-1, reason()))
    }

    /// End the sync: swap the new cage in and refine it.
    ///
    /// When the topology matches the previous sync the existing user data is
    /// kept; with aging, only elements whose data changed get the new
    /// generation stamped. A failed refinement leaves the previous cage and
    /// samples in place.
    pub fn finish(self) -> Result<()> {
        let SyncSession {
            engine,
            mut verts,
            mut edges,
            mut faces,
            vert_lookup,
            edge_lookup,
        } = self;
        let generation = engine.generation + 1;
        let aging = engine.flags.contains(SubsurfFlags::USE_AGING);
        let reuse = engine.topology_matches(&verts, &edges, &faces);

        if reuse {
            let mut changed = 0usize;
            for (new, old) in verts.iter_mut().zip(&engine.verts) {
                new.user = old.user;
                if new.data != old.data {
                    changed += 1;
                    if aging {
                        new.user.age = Some(generation);
                    }
                }
            }
            for (new, old) in edges.iter_mut().zip(&engine.edges) {
                new.user = old.user;
            }
            for (new, old) in faces.iter_mut().zip(&engine.faces) {
                new.user = old.user;
            }
            log::trace!("incremental sync, {changed} vertices changed");
        } else {
            let stamp = aging.then_some(generation);
            verts.iter_mut().for_each(|v| v.user.age = stamp);
            edges.iter_mut().for_each(|e| e.user.age = stamp);
            faces.iter_mut().for_each(|f| f.user.age = stamp);
        }

        engine.samples = refine::refine(&verts, &edges, &faces, &engine.key)?;
        engine.verts = verts;
        engine.edges = edges;
        engine.faces = faces;
        engine.vert_lookup = vert_lookup;
        engine.edge_lookup = edge_lookup;
        engine.generation = generation;
        engine.synced = true;
        log::debug!(
            "synced {} verts, {} edges, {} faces at depth {}",
            engine.verts.len(),
            engine.edges.len(),
            engine.faces.len(),
            engine.key.level
        );
        Ok(())
    }
}

fn relabel(err: SubsurfError, face: i32) -> SubsurfError {
    match err {
        SubsurfError::TopologyInconsistency { reason, .. } => SubsurfError::topology(face, reason),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_engine(depth: u32) -> SubdivEngine {
        let mut engine = SubdivEngine::new(depth, 3, SubsurfFlags::CALC_NORMALS);
        let mut sync = engine.begin_sync();
        let co = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        for (i, c) in co.iter().enumerate() {
            sync.sync_vert(i as i32, c, false);
        }
        for i in 0..4 {
            sync.sync_edge(i, i, (i + 1) % 4, 0.0).unwrap();
        }
        sync.sync_face(0, &[0, 1, 2, 3]).unwrap();
        sync.finish().unwrap();
        engine
    }

    #[test]
    fn test_sizes_follow_depth() {
        let engine = quad_engine(2);
        assert_eq!(engine.grid_size(), 3);
        assert_eq!(engine.edge_size(), 5);
        assert_eq!(engine.face_data(FaceId::new(0)).len(), 4 * 9 * engine.key().elem_size);
    }

    #[test]
    fn test_face_center_and_grid_corner() {
        let engine = quad_engine(2);
        let f = FaceId::new(0);
        let center = engine.key().co(engine.face_center_data(f));
        assert!((center - crate::math::Vec3::new(0.5, 0.5, 0.0)).norm() < 1e-6);

        // Grid corner (gs-1, gs-1) is the limit of face vertex S.
        let gs = engine.grid_size();
        for s in 0..4 {
            let corner = engine.face_grid_elem(f, s, gs - 1, gs - 1);
            let v = engine.vert_data(engine.face_vert(f, s));
            assert_eq!(corner, v);
        }
    }

    #[test]
    fn test_shared_spokes_between_grids() {
        let engine = quad_engine(3);
        let f = FaceId::new(0);
        let gs = engine.grid_size();
        for s in 0..4 {
            let next = (s + 1) % 4;
            for i in 0..gs {
                assert_eq!(engine.face_grid_elem(f, s, i, 0), engine.face_grid_elem(f, next, 0, i));
            }
        }
    }

    #[test]
    fn test_edge_strip_matches_grid_boundary() {
        let engine = quad_engine(2);
        let f = FaceId::new(0);
        let gs = engine.grid_size();
        let e = engine.face_edge(f, 0);
        // Face 0 walks edge 0 from v0 to v1, the grid column runs from the
        // midpoint (y = 0) back towards face vertex 0.
        for y in 0..gs {
            assert_eq!(engine.face_grid_elem(f, 0, gs - 1, y), engine.edge_elem(e, gs - 1 - y));
        }
    }

    #[test]
    fn test_normals_face_up() {
        let engine = quad_engine(2);
        let key = *engine.key();
        let n = key.no(engine.face_center_data(FaceId::new(0)));
        assert!((n.z.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_missing_edge_is_topology_error() {
        let mut engine = SubdivEngine::new(1, 3, SubsurfFlags::empty());
        let mut sync = engine.begin_sync();
        for i in 0..3 {
            sync.sync_vert(i, &[i as f32, 0.0, 0.0], false);
        }
        sync.sync_edge(0, 0, 1, 0.0).unwrap();
        let err = sync.sync_face(7, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, SubsurfError::TopologyInconsistency { face: 7, .. }));
        drop(sync);
        assert!(!engine.is_synced());
    }

    #[test]
    fn test_degenerate_face_skipped() {
        let mut engine = SubdivEngine::new(1, 3, SubsurfFlags::empty());
        let mut sync = engine.begin_sync();
        sync.sync_vert(0, &[0.0; 3], false);
        sync.sync_vert(1, &[1.0, 0.0, 0.0], false);
        sync.sync_edge(0, 0, 1, 0.0).unwrap();
        assert_eq!(sync.sync_face(0, &[0, 1]).unwrap(), None);
        sync.finish().unwrap();
        assert_eq!(engine.num_faces(), 0);
        assert_eq!(engine.edge_num_faces(EdgeId::new(0)), 0);
    }

    #[test]
    fn test_aging_stamps_changed_vertices_only() {
        let mut engine = SubdivEngine::new(1, 3, SubsurfFlags::USE_AGING);
        for (generation, x) in [(1, 0.0), (2, 5.0)] {
            let mut sync = engine.begin_sync();
            sync.sync_vert(0, &[x, 0.0, 0.0], false);
            sync.sync_vert(1, &[1.0, 0.0, 0.0], false);
            sync.sync_edge(0, 0, 1, 0.0).unwrap();
            sync.finish().unwrap();
            assert_eq!(engine.generation(), generation);
        }
        assert_eq!(engine.vert_user(VertexId::new(0)).age, Some(2));
        assert_eq!(engine.vert_user(VertexId::new(1)).age, Some(1));
    }
}
