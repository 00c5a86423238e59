//! The coarse control mesh fed into subdivision.

use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use super::custom_data::CustomData;
use super::types::{EdgeFlags, MeshEdge, MeshLoop, MeshPoly, MeshVert};
use crate::error::{Result, SubsurfError};

/// Per-corner multires grid data carried by a base mesh.
///
/// Each base loop owns one `grid_size × grid_size` grid of hidden bits and
/// paint-mask values at its own resolution `level`.
#[derive(Debug, Clone, Default)]
pub struct CornerGrids {
    /// Subdivision level the stored grids were authored at.
    pub level: u32,
    /// Hidden samples per loop, `None` when nothing is hidden.
    pub hidden: Vec<Option<FixedBitSet>>,
    /// Paint-mask samples per loop, empty when absent.
    pub paint_mask: Vec<Vec<f32>>,
}

impl CornerGrids {
    /// Side length of the stored grids.
    pub fn grid_size(&self) -> usize {
        (1 << self.level) + 1
    }
}

/// A polygon mesh: vertices, edges, polygons, loops and attribute layers.
#[derive(Debug, Clone, Default)]
pub struct BaseMesh {
    pub verts: Vec<MeshVert>,
    pub edges: Vec<MeshEdge>,
    pub polys: Vec<MeshPoly>,
    pub loops: Vec<MeshLoop>,

    pub vdata: CustomData,
    pub edata: CustomData,
    pub pdata: CustomData,
    pub ldata: CustomData,

    /// Original indices, when this mesh was itself derived from another one.
    pub vert_origindex: Option<Vec<i32>>,
    pub edge_origindex: Option<Vec<i32>>,
    pub poly_origindex: Option<Vec<i32>>,

    /// Number of material slots.
    pub totmat: usize,
    /// UV layer used for texture painting per material slot (`None` uses the active layer).
    pub paint_uv_slots: Vec<Option<usize>>,

    pub corner_grids: Option<CornerGrids>,
}

impl BaseMesh {
    /// Build a mesh from positions and polygons given as vertex index lists.
    ///
    /// Edges are created for every polygon side, shared between polygons.
    pub fn from_polygons(positions: &[[f32; 3]], polygons: &[Vec<u32>]) -> Result<Self> {
        let mut mesh = Self {
            verts: positions.iter().map(|&co| MeshVert::new(co)).collect(),
            totmat: 1,
            ..Default::default()
        };
        let mut edge_lookup: HashMap<(u32, u32), u32> = HashMap::new();

        for poly in polygons {
            if poly.iter().any(|&v| v as usize >= positions.len()) {
                return Err(SubsurfError::InvalidMesh(format!(
                    "polygon {poly:?} references a vertex out of range"
                )));
            }
            let loopstart = mesh.loops.len() as u32;
            for (i, &v) in poly.iter().enumerate() {
                let next = poly[(i + 1) % poly.len()];
                let key = (v.min(next), v.max(next));
                let e = *edge_lookup.entry(key).or_insert_with(|| {
                    mesh.edges.push(MeshEdge::new(v, next));
                    (mesh.edges.len() - 1) as u32
                });
                mesh.loops.push(MeshLoop { v, e });
            }
            mesh.polys.push(MeshPoly {
                loopstart,
                totloop: poly.len() as u32,
                ..Default::default()
            });
        }
        Ok(mesh)
    }

    /// Append an edge not used by any polygon.
    pub fn add_loose_edge(&mut self, v1: u32, v2: u32) -> u32 {
        self.edges.push(MeshEdge::new(v1, v2).with_flag(EdgeFlags::LOOSEEDGE));
        (self.edges.len() - 1) as u32
    }

    /// Builder-style material assignment for one polygon.
    pub fn with_material(mut self, poly: usize, mat_nr: i16) -> Self {
        if let Some(p) = self.polys.get_mut(poly) {
            p.mat_nr = mat_nr;
            self.totmat = self.totmat.max(mat_nr as usize + 1);
        }
        self
    }

    /// Vertex indices of polygon `p`, in corner order.
    pub fn poly_verts(&self, p: usize) -> impl Iterator<Item = u32> + '_ {
        self.loops[self.polys[p].loops()].iter().map(|l| l.v)
    }

    /// Number of polygons using each edge.
    pub fn edge_face_counts(&self) -> Vec<u32> {
        let mut counts = vec![0; self.edges.len()];
        for l in &self.loops {
            counts[l.e as usize] += 1;
        }
        counts
    }

    /// Original index of vertex `i` (falls back to `i` itself).
    pub fn vert_orig(&self, i: usize) -> i32 {
        self.vert_origindex.as_ref().map_or(i as i32, |o| o[i])
    }

    /// Original index of edge `i` (falls back to `i` itself).
    pub fn edge_orig(&self, i: usize) -> i32 {
        self.edge_origindex.as_ref().map_or(i as i32, |o| o[i])
    }

    /// Original index of polygon `i` (falls back to `i` itself).
    pub fn poly_orig(&self, i: usize) -> i32 {
        self.poly_origindex.as_ref().map_or(i as i32, |o| o[i])
    }

    /// Check that every index points inside its array and layers are sized.
    pub fn validate(&self) -> Result<()> {
        let nv = self.verts.len() as u32;
        let ne = self.edges.len() as u32;
        if let Some((i, _)) = self
            .edges
            .iter()
            .enumerate()
            .find(|(_, e)| e.v1 >= nv || e.v2 >= nv || e.v1 == e.v2)
        {
            return Err(SubsurfError::InvalidMesh(format!("edge {i} is invalid")));
        }
        for (i, p) in self.polys.iter().enumerate() {
            if p.loops().end > self.loops.len() {
                return Err(SubsurfError::InvalidMesh(format!(
                    "polygon {i} loops run past the loop array"
                )));
            }
        }
        if let Some((i, _)) = self
            .loops
            .iter()
            .enumerate()
            .find(|(_, l)| l.v >= nv || l.e >= ne)
        {
            return Err(SubsurfError::InvalidMesh(format!("loop {i} is invalid")));
        }
        let sizes = [
            (&self.vdata, self.verts.len(), "vertex"),
            (&self.edata, self.edges.len(), "edge"),
            (&self.pdata, self.polys.len(), "polygon"),
            (&self.ldata, self.loops.len(), "loop"),
        ];
        for (data, len, domain) in sizes {
            if let Some(name) = data.check_len(len) {
                return Err(SubsurfError::InvalidMesh(format!(
                    "{domain} layer '{name}' does not match element count {len}"
                )));
            }
        }
        Ok(())
    }
}
