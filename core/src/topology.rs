//! Index maps from engine elements to the flattened output numbering.
//!
//! Flattened vertices come in three runs: every face's own samples (center,
//! ring spokes, interior), then the interior samples of every edge, then one
//! vertex per base vertex. Edges and quads follow the same face-then-edge
//! order. Each map entry records where its element's run starts; entries are
//! sorted by start so "which element owns index N" is a binary search.

use crate::engine::SubdivEngine;
use crate::error::{Result, SubsurfError};
use crate::handle::{EdgeId, FaceId, VertexId};
use crate::mesh::BaseMesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceMapEntry {
    pub face: FaceId,
    pub valence: usize,
    pub start_vert: usize,
    pub start_edge: usize,
    /// First quad, also `start_loop / 4`.
    pub start_face: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeMapEntry {
    pub edge: EdgeId,
    pub start_vert: usize,
    pub start_edge: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertMapEntry {
    pub vert: VertexId,
    pub start_vert: usize,
}

/// What a flattened vertex index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertLocation {
    FaceCenter { face: FaceId },
    /// Spoke `s` at `(x, 0)`, `0 < x < grid_size - 1`.
    FaceRing { face: FaceId, s: usize, x: usize },
    FaceInterior { face: FaceId, s: usize, x: usize, y: usize },
    /// Sample `x` along an edge, `0 < x < edge_size - 1`.
    EdgeInterior { edge: EdgeId, x: usize },
    Vert { vert: VertexId },
}

/// What a flattened edge index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeLocation {
    /// Spoke segment `x → x+1` on grid `s`'s `y = 0` line.
    FaceRing { face: FaceId, s: usize, x: usize },
    /// Inner segment: `(x, y) → (x, y+1)` when `vertical`, else
    /// `(y, x) → (y+1, x)`.
    FaceInner { face: FaceId, s: usize, x: usize, y: usize, vertical: bool },
    /// Sub-edge `x → x+1` of a base edge.
    Edge { edge: EdgeId, x: usize },
}

/// A flattened quad: grid cell `(x, y)` of corner `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceLocation {
    pub face: FaceId,
    pub s: usize,
    pub x: usize,
    pub y: usize,
}

/// Start offsets of every engine element in the flattened mesh.
#[derive(Debug, Clone, Default)]
pub struct TopologyMaps {
    grid_size: usize,
    edge_size: usize,
    pub faces: Vec<FaceMapEntry>,
    pub edges: Vec<EdgeMapEntry>,
    pub verts: Vec<VertMapEntry>,
    /// First vertex owned by an edge.
    pub edge_vert_base: usize,
    /// First vertex owned by a base vertex.
    pub vert_base: usize,
    /// First edge owned by a base edge.
    pub edge_edge_base: usize,
    pub total_verts: usize,
    pub total_edges: usize,
    pub total_faces: usize,
}

impl TopologyMaps {
    /// Lay out the flattened numbering and stash start and original indices in
    /// the engine's user data.
    ///
    /// Engine keys are base-mesh indices; origins are looked up through `base`.
    pub fn build(engine: &mut SubdivEngine, base: &BaseMesh) -> Result<Self> {
        Self::validate(engine)?;

        let gs = engine.grid_size();
        let es = engine.edge_size();
        let side = gs - 2;
        let side_edges = gs - 1;
        let inner_edges = 2 * (side_edges - 1) * side_edges;
        let mut maps = Self {
            grid_size: gs,
            edge_size: es,
            ..Default::default()
        };

        let (mut vert, mut edge, mut face) = (0usize, 0usize, 0usize);
        for f in engine.face_ids() {
            let n = engine.face_num_verts(f);
            let key = engine.face_key(f) as usize;
            let user = engine.face_user_mut(f);
            user.start = vert as i32;
            user.orig = base.poly_orig(key);
            maps.faces.push(FaceMapEntry {
                face: f,
                valence: n,
                start_vert: vert,
                start_edge: edge,
                start_face: face,
            });
            vert += 1 + n * side + n * side * side;
            edge += n * (side_edges + inner_edges);
            face += n * side_edges * side_edges;
        }

        maps.edge_vert_base = vert;
        maps.edge_edge_base = edge;
        for e in engine.edge_ids() {
            let key = engine.edge_key(e) as usize;
            let user = engine.edge_user_mut(e);
            user.start = vert as i32;
            user.orig = base.edge_orig(key);
            maps.edges.push(EdgeMapEntry {
                edge: e,
                start_vert: vert,
                start_edge: edge,
            });
            vert += es - 2;
            edge += es - 1;
        }

        maps.vert_base = vert;
        for v in engine.vert_ids() {
            let key = engine.vert_key(v) as usize;
            let user = engine.vert_user_mut(v);
            user.start = vert as i32;
            user.orig = base.vert_orig(key);
            maps.verts.push(VertMapEntry {
                vert: v,
                start_vert: vert,
            });
            vert += 1;
        }

        maps.total_verts = vert;
        maps.total_edges = edge;
        maps.total_faces = face;
        log::trace!(
            "topology maps: {} verts, {} edges, {} faces",
            maps.total_verts,
            maps.total_edges,
            maps.total_faces
        );
        Ok(maps)
    }

    /// Every face edge must join the face's consecutive vertices.
    pub fn validate(engine: &SubdivEngine) -> Result<()> {
        for f in engine.face_ids() {
            let n = engine.face_num_verts(f);
            for s in 0..n {
                let [a, b] = engine.edge_verts(engine.face_edge(f, s));
                let (p, q) = (engine.face_vert(f, s), engine.face_vert(f, (s + 1) % n));
                if !((a == p && b == q) || (a == q && b == p)) {
                    return Err(SubsurfError::topology(
                        engine.face_key(f),
                        format!("edge {s} does not join face vertices {s} and {}", (s + 1) % n),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn edge_size(&self) -> usize {
        self.edge_size
    }

    pub fn total_loops(&self) -> usize {
        self.total_faces * 4
    }

    // ------------------------------------------------------------------
    // Index resolution
    // ------------------------------------------------------------------

    /// Flattened index of sample `x` along edge `e`, counted from `v0`.
    pub fn edge_vert_index(&self, engine: &SubdivEngine, e: EdgeId, x: usize) -> usize {
        let [v0, v1] = engine.edge_verts(e);
        if x == 0 {
            engine.vert_user(v0).start as usize
        } else if x == self.edge_size - 1 {
            engine.vert_user(v1).start as usize
        } else {
            engine.edge_user(e).start as usize + x - 1
        }
    }

    /// Flattened index of sample `(x, y)` of grid `s` of face `f`.
    ///
    /// Samples on the face boundary resolve through the owning edge, mirrored
    /// when the face walks the edge against its canonical direction, so
    /// neighbouring faces agree on shared indices.
    pub fn face_vert_index(&self, engine: &SubdivEngine, f: FaceId, s: usize, x: usize, y: usize) -> usize {
        let gs = self.grid_size;
        let n = engine.face_num_verts(f);
        let face_base = engine.face_user(f).start as usize;
        let side = gs - 2;

        if x == gs - 1 && y == gs - 1 {
            return engine.vert_user(engine.face_vert(f, s)).start as usize;
        }
        if x == gs - 1 || y == gs - 1 {
            // On edge `s` (x border) or edge `s - 1` (y border), at distance
            // `t` from face vertex `s` towards the edge midpoint.
            let (edge_s, t) = if x == gs - 1 {
                (s, gs - 1 - y)
            } else {
                ((s + n - 1) % n, gs - 1 - x)
            };
            let e = engine.face_edge(f, edge_s);
            let v = engine.face_vert(f, s);
            let edge_base = engine.edge_user(e).start as usize;
            return if engine.edge_verts(e)[0] == v {
                edge_base + t - 1
            } else {
                edge_base + (self.edge_size - 3) - (t - 1)
            };
        }
        if x == 0 && y == 0 {
            face_base
        } else if y == 0 {
            face_base + 1 + side * s + (x - 1)
        } else if x == 0 {
            face_base + 1 + side * ((s + n - 1) % n) + (y - 1)
        } else {
            face_base + 1 + side * n + s * side * side + (y - 1) * side + (x - 1)
        }
    }

    // ------------------------------------------------------------------
    // Reverse lookup
    // ------------------------------------------------------------------

    pub fn locate_vert(&self, index: usize) -> Option<VertLocation> {
        if index >= self.total_verts {
            return None;
        }
        let gs = self.grid_size;
        let side = gs - 2;
        if index < self.edge_vert_base {
            let entry = self.faces[self.faces.partition_point(|e| e.start_vert <= index) - 1];
            let offset = index - entry.start_vert;
            let face = entry.face;
            if offset == 0 {
                return Some(VertLocation::FaceCenter { face });
            }
            let offset = offset - 1;
            let ring = side * entry.valence;
            if offset < ring {
                return Some(VertLocation::FaceRing {
                    face,
                    s: offset / side,
                    x: offset % side + 1,
                });
            }
            let offset = offset - ring;
            let area = side * side;
            let s = offset / area;
            let rem = offset % area;
            return Some(VertLocation::FaceInterior {
                face,
                s,
                x: rem % side + 1,
                y: rem / side + 1,
            });
        }
        if index < self.vert_base {
            let entry = self.edges[self.edges.partition_point(|e| e.start_vert <= index) - 1];
            return Some(VertLocation::EdgeInterior {
                edge: entry.edge,
                x: index - entry.start_vert + 1,
            });
        }
        Some(VertLocation::Vert {
            vert: self.verts[index - self.vert_base].vert,
        })
    }

    pub fn locate_edge(&self, index: usize) -> Option<EdgeLocation> {
        if index >= self.total_edges {
            return None;
        }
        let gs = self.grid_size;
        if index < self.edge_edge_base {
            let entry = self.faces[self.faces.partition_point(|e| e.start_edge <= index) - 1];
            let per_grid = (gs - 1) + 2 * (gs - 2) * (gs - 1);
            let offset = index - entry.start_edge;
            let s = offset / per_grid;
            let rem = offset % per_grid;
            if rem < gs - 1 {
                return Some(EdgeLocation::FaceRing {
                    face: entry.face,
                    s,
                    x: rem,
                });
            }
            let rem = rem - (gs - 1);
            let pair = rem / 2;
            return Some(EdgeLocation::FaceInner {
                face: entry.face,
                s,
                x: pair / (gs - 1) + 1,
                y: pair % (gs - 1),
                vertical: rem % 2 == 0,
            });
        }
        let entry = self.edges[self.edges.partition_point(|e| e.start_edge <= index) - 1];
        Some(EdgeLocation::Edge {
            edge: entry.edge,
            x: index - entry.start_edge,
        })
    }

    pub fn locate_face(&self, index: usize) -> Option<FaceLocation> {
        if index >= self.total_faces {
            return None;
        }
        let cells = self.grid_size - 1;
        let entry = self.faces[self.faces.partition_point(|e| e.start_face <= index) - 1];
        let offset = index - entry.start_face;
        let s = offset / (cells * cells);
        let rem = offset % (cells * cells);
        Some(FaceLocation {
            face: entry.face,
            s,
            x: rem % cells,
            y: rem / cells,
        })
    }
}
