//! Flattening the refined engine into plain mesh arrays.
//!
//! Positions and normals come from the engine samples. Custom data is
//! interpolated here from the base mesh through the [`WeightTable`], so
//! attribute layers keep their exact base values at base vertices and blend
//! bilinearly across every corner grid.

use crate::engine::SubdivEngine;
use crate::handle::FaceId;
use crate::math::normal_float_to_short;
use crate::mesh::{BaseMesh, CustomData, EdgeFlags, FlagMat, MeshEdge, MeshPoly, MeshVert, VertFlags};
use crate::scratch::{FaceScratch, Scratch};
use crate::topology::TopologyMaps;
use crate::weights::WeightTable;

/// Output of one materialization pass.
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub verts: Vec<MeshVert>,
    pub edges: Vec<MeshEdge>,
    /// One quad per grid cell.
    pub polys: Vec<MeshPoly>,
    pub vdata: CustomData,
    pub edata: CustomData,
    pub pdata: CustomData,
    pub ldata: CustomData,
    /// Shading flag and material per engine face.
    pub flag_mats: Vec<FlagMat>,
    /// Base polygon of every quad.
    pub reverse_face_map: Vec<u32>,
}

/// Walks faces, edges and vertices in map order and emits flattened arrays.
#[derive(Debug)]
pub struct Materializer {
    weights: WeightTable,
    scratch: Scratch<FaceScratch>,
    draw_interior_edges: bool,
}

impl Materializer {
    pub fn new(grid_size: usize) -> Self {
        Self {
            weights: WeightTable::new(grid_size.saturating_sub(2)),
            scratch: Scratch::default(),
            draw_interior_edges: false,
        }
    }

    pub fn with_draw_interior_edges(mut self, enabled: bool) -> Self {
        self.draw_interior_edges = enabled;
        self
    }

    /// Weight tables built so far.
    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn run(&mut self, engine: &SubdivEngine, maps: &TopologyMaps, base: &BaseMesh) -> Materialized {
        let mut out = Materialized {
            verts: Vec::with_capacity(maps.total_verts),
            edges: Vec::with_capacity(maps.total_edges),
            polys: Vec::with_capacity(maps.total_faces),
            vdata: base.vdata.alloc_like(maps.total_verts),
            edata: base.edata.alloc_like(maps.total_edges),
            pdata: base.pdata.alloc_like(maps.total_faces),
            ldata: base.ldata.alloc_like(maps.total_loops()),
            flag_mats: Vec::with_capacity(maps.faces.len()),
            reverse_face_map: Vec::with_capacity(maps.total_faces),
        };
        self.emit_verts(engine, maps, base, &mut out);
        self.emit_edges(engine, maps, base, &mut out);
        self.emit_faces(engine, maps, base, &mut out);
        self.scratch.release();
        debug_assert_eq!(out.verts.len(), maps.total_verts);
        debug_assert_eq!(out.edges.len(), maps.total_edges);
        debug_assert_eq!(out.polys.len(), maps.total_faces);
        out
    }

    fn load_face(&mut self, engine: &SubdivEngine, base: &BaseMesh, f: FaceId) -> usize {
        let scratch = self.scratch.activate();
        let poly = &base.polys[engine.face_key(f) as usize];
        scratch.verts.extend(engine.face_verts(f).iter().map(|&v| engine.vert_key(v) as usize));
        scratch.loops.extend(poly.loops());
        scratch.handles.extend_from_slice(engine.face_verts(f));
        scratch.verts.len()
    }

    fn emit_verts(&mut self, engine: &SubdivEngine, maps: &TopologyMaps, base: &BaseMesh, out: &mut Materialized) {
        let key = *engine.key();
        let gs = maps.grid_size();
        let push = |out: &mut Materialized, record: &[f32], flag: VertFlags| {
            let mut v = MeshVert::new([record[0], record[1], record[2]]);
            if key.has_normals {
                v.no = normal_float_to_short(&key.no(record));
            }
            v.flag = flag;
            out.verts.push(v);
        };

        for entry in &maps.faces {
            let f = entry.face;
            let n = self.load_face(engine, base, f);
            let Self { weights, scratch, .. } = &mut *self;
            let corners = &scratch.inner().verts;

            let dst = out.verts.len();
            push(out, engine.face_center_data(f), VertFlags::empty());
            out.vdata.interp_from(&base.vdata, corners, weights.row(n, 0, 0, 0), dst);
            for s in 0..n {
                for x in 1..gs - 1 {
                    let dst = out.verts.len();
                    push(out, engine.face_grid_elem(f, s, x, 0), VertFlags::empty());
                    out.vdata.interp_from(&base.vdata, corners, weights.row(n, s, x, 0), dst);
                }
            }
            for s in 0..n {
                for y in 1..gs - 1 {
                    for x in 1..gs - 1 {
                        let dst = out.verts.len();
                        push(out, engine.face_grid_elem(f, s, x, y), VertFlags::empty());
                        out.vdata.interp_from(&base.vdata, corners, weights.row(n, s, x, y), dst);
                    }
                }
            }
        }

        let es = maps.edge_size();
        for entry in &maps.edges {
            let e = entry.edge;
            let [v0, v1] = engine.edge_verts(e);
            let ends = [engine.vert_key(v0) as usize, engine.vert_key(v1) as usize];
            for x in 1..es - 1 {
                let w1 = x as f32 / (es - 1) as f32;
                let dst = out.verts.len();
                push(out, engine.edge_elem(e, x), VertFlags::empty());
                out.vdata.interp_from(&base.vdata, &ends, &[1.0 - w1, w1], dst);
            }
        }

        for entry in &maps.verts {
            let index = engine.vert_key(entry.vert) as usize;
            let dst = out.verts.len();
            push(out, engine.vert_data(entry.vert), base.verts[index].flag);
            out.vdata.copy_from(&base.vdata, index, dst);
        }
    }

    fn emit_edges(&mut self, engine: &SubdivEngine, maps: &TopologyMaps, base: &BaseMesh, out: &mut Materialized) {
        let gs = maps.grid_size();
        let interior_flag = if self.draw_interior_edges {
            EdgeFlags::EDGEDRAW | EdgeFlags::EDGERENDER
        } else {
            EdgeFlags::empty()
        };
        let edge = |a: usize, b: usize, flag: EdgeFlags| MeshEdge {
            v1: a as u32,
            v2: b as u32,
            crease: 0,
            flag,
        };

        for entry in &maps.faces {
            let f = entry.face;
            let index = |s, x, y| maps.face_vert_index(engine, f, s, x, y);
            for s in 0..entry.valence {
                for x in 0..gs - 1 {
                    out.edges.push(edge(index(s, x, 0), index(s, x + 1, 0), interior_flag));
                }
                for x in 1..gs - 1 {
                    for y in 0..gs - 1 {
                        out.edges.push(edge(index(s, x, y), index(s, x, y + 1), interior_flag));
                        out.edges.push(edge(index(s, y, x), index(s, y + 1, x), interior_flag));
                    }
                }
            }
        }

        let es = maps.edge_size();
        for entry in &maps.edges {
            let e = entry.edge;
            let index = engine.edge_key(e) as usize;
            let mut flag = base.edges[index].flag & (EdgeFlags::SEAM | EdgeFlags::SHARP);
            flag |= EdgeFlags::EDGEDRAW | EdgeFlags::EDGERENDER;
            if engine.edge_num_faces(e) == 0 {
                flag |= EdgeFlags::LOOSEEDGE;
            }
            for x in 0..es - 1 {
                let dst = out.edges.len();
                out.edges.push(edge(
                    maps.edge_vert_index(engine, e, x),
                    maps.edge_vert_index(engine, e, x + 1),
                    flag,
                ));
                out.edata.copy_from(&base.edata, index, dst);
            }
        }
    }

    fn emit_faces(&mut self, engine: &SubdivEngine, maps: &TopologyMaps, base: &BaseMesh, out: &mut Materialized) {
        let gs = maps.grid_size();
        for entry in &maps.faces {
            let f = entry.face;
            let poly_index = engine.face_key(f) as usize;
            let base_poly = base.polys[poly_index];
            out.flag_mats.push(FlagMat {
                flag: base_poly.flag,
                mat_nr: base_poly.mat_nr,
            });

            let n = self.load_face(engine, base, f);
            let Self { weights, scratch, .. } = &mut *self;
            let corners = &scratch.inner().loops;
            for s in 0..n {
                for y in 0..gs - 1 {
                    for x in 0..gs - 1 {
                        let quad = out.polys.len();
                        let loopstart = quad * 4;
                        out.polys.push(MeshPoly {
                            loopstart: loopstart as u32,
                            totloop: 4,
                            mat_nr: base_poly.mat_nr,
                            flag: base_poly.flag,
                        });
                        out.pdata.copy_from(&base.pdata, poly_index, quad);
                        out.reverse_face_map.push(poly_index as u32);
                        let cells = [(x, y), (x, y + 1), (x + 1, y + 1), (x + 1, y)];
                        for (k, (cx, cy)) in cells.into_iter().enumerate() {
                            out.ldata
                                .interp_from(&base.ldata, corners, weights.row(n, s, cx, cy), loopstart + k);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{LayerData, generators};
    use crate::settings::SubsurfFlags;
    use crate::sync::sync_from_base;

    fn materialize(base: &BaseMesh, depth: u32) -> (SubdivEngine, TopologyMaps, Materialized) {
        let mut engine = SubdivEngine::new(depth, 3, SubsurfFlags::CALC_NORMALS);
        sync_from_base(&mut engine, base, None, false).unwrap();
        let maps = TopologyMaps::build(&mut engine, base).unwrap();
        let out = Materializer::new(maps.grid_size()).run(&engine, &maps, base);
        (engine, maps, out)
    }

    #[test]
    fn test_quad_layout() {
        let base = generators::unit_quad();
        let (_, maps, out) = materialize(&base, 2);
        assert_eq!(out.verts.len(), 25);
        assert_eq!(out.polys.len(), 16);
        // Four spokes of two segments plus four inner pairs per grid.
        assert_eq!(maps.edge_edge_base, 4 * (2 + 2 * 2));
        assert_eq!(out.edges.len(), maps.edge_edge_base + 4 * 4);
        assert!(out.reverse_face_map.iter().all(|&p| p == 0));
        assert!(out.polys.iter().all(|p| p.totloop == 4));
    }

    #[test]
    fn test_base_vertex_uvs_survive() {
        let base = generators::unit_quad();
        let (engine, maps, out) = materialize(&base, 2);
        let Some(LayerData::Uv(uvs)) = out.ldata.layer_named("UVMap").map(|l| &l.data) else {
            panic!("uv layer missing");
        };
        // Quad (s, gs-2, gs-2) has its third loop on base corner s.
        let gs = maps.grid_size();
        let cells = (gs - 1) * (gs - 1);
        for s in 0..4 {
            let quad = s * cells + (gs - 2) * (gs - 1) + (gs - 2);
            assert_eq!(uvs[quad * 4 + 2], base.ldata.uv(0).unwrap()[s]);
        }
        assert_eq!(engine.num_faces(), 1);
    }

    #[test]
    fn test_edge_flags() {
        let mut base = generators::unit_quad();
        base.edges[0].flag |= EdgeFlags::SEAM;
        let v = base.verts.len() as u32;
        base.verts.push(MeshVert::new([3.0, 0.0, 0.0]));
        base.add_loose_edge(1, v);
        let (_, maps, out) = materialize(&base, 1);
        assert!(out.edges[..maps.edge_edge_base].iter().all(|e| e.flag.is_empty()));
        let es = maps.edge_size();
        let first = &out.edges[maps.edge_edge_base];
        assert!(first.flag.contains(EdgeFlags::SEAM | EdgeFlags::EDGEDRAW));
        let loose = &out.edges[maps.edge_edge_base + 4 * (es - 1)];
        assert!(loose.flag.contains(EdgeFlags::LOOSEEDGE));
    }
}
