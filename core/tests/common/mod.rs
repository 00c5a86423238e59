//! Shared helpers for the core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use subsurf_core::derived::{MaterializeOptions, SubsurfMesh};
use subsurf_core::mesh::{BaseMesh, LayerData, VertFlags, generators};
use subsurf_core::sync::sync_from_base;
use subsurf_core::{SubdivEngine, SubsurfFlags};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Named control cages used across tests.
#[derive(Debug, Clone, Copy)]
pub enum Cage {
    UnitQuad,
    Cube,
    Pentagon,
    Plane3x2,
}

impl Cage {
    pub fn build(self) -> BaseMesh {
        match self {
            Cage::UnitQuad => generators::unit_quad(),
            Cage::Cube => generators::cube(2.0),
            Cage::Pentagon => generators::ngon(5),
            Cage::Plane3x2 => generators::plane_grid(3, 2, 3.0),
        }
    }
}

/// Sync `base` at user `level` and flatten it.
pub fn subdivide(base: &BaseMesh, level: u32) -> SubsurfMesh {
    let mut engine = SubdivEngine::new(level.max(1) + 1, 3, SubsurfFlags::CALC_NORMALS);
    sync_from_base(&mut engine, base, None, false).expect("sync");
    let mut engine = Arc::new(engine);
    SubsurfMesh::build(&mut engine, base, MaterializeOptions::default()).expect("materialize")
}

/// Flattened vertex count predicted from element counts alone.
pub fn expected_vert_count(base: &BaseMesh, level: u32) -> usize {
    let grid_size = (1usize << level) + 1;
    let edge_size = 2 * grid_size - 1;
    let side = grid_size - 2;
    let faces: usize = base
        .polys
        .iter()
        .map(|p| {
            let n = p.totloop as usize;
            1 + n * side + n * side * side
        })
        .sum();
    faces + base.edges.len() * (edge_size - 2) + base.verts.len()
}

/// Two quads side by side whose right half has mirrored UVs, with the shared
/// column welded as a mirror would leave it.
pub fn mirrored_pair() -> BaseMesh {
    let mut base = generators::plane_grid(2, 1, 2.0);
    let mirrored: Vec<[f32; 2]> = base
        .loops
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let co = base.verts[l.v as usize].co;
            let u = co[0] / 2.0;
            // Loops 4..8 belong to the right quad.
            if i >= 4 { [1.0 - u, co[1] / 2.0] } else { [u, co[1] / 2.0] }
        })
        .collect();
    base.ldata = Default::default();
    base.ldata.add_layer("UVMap", LayerData::Uv(mirrored));
    for v in [1, 4] {
        base.verts[v].flag |= VertFlags::MERGED;
    }
    base
}
