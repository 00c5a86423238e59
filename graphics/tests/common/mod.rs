//! Shared helpers for the draw buffer tests.

#![allow(dead_code)]

use std::sync::Arc;

use subsurf_core::derived::{MaterializeOptions, SubsurfMesh};
use subsurf_core::mesh::{BaseMesh, LayerData, PolyFlags, generators};
use subsurf_core::sync::sync_from_base;
use subsurf_core::{SubdivEngine, SubsurfFlags};
use subsurf_graphics::{BufferPool, DummyBackend, GpuBackend, GpuBuffer, PoolConfig};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sync `base` at user `level` and flatten it.
pub fn subdivide(base: &BaseMesh, level: u32) -> SubsurfMesh {
    let mut engine = SubdivEngine::new(level.max(1) + 1, 3, SubsurfFlags::CALC_NORMALS);
    sync_from_base(&mut engine, base, None, false).expect("sync");
    let mut engine = Arc::new(engine);
    SubsurfMesh::build(&mut engine, base, MaterializeOptions::default()).expect("materialize")
}

/// A pool over a fresh dummy backend, returned alongside the backend so tests
/// can inspect and sabotage it.
pub fn dummy_pool(config: PoolConfig) -> (Arc<DummyBackend>, Arc<BufferPool>) {
    let backend = Arc::new(DummyBackend::new());
    let pool = Arc::new(BufferPool::new(backend.clone(), config));
    (backend, pool)
}

/// Bytes held by `buffer`, cut to `len`.
pub fn contents(pool: &BufferPool, buffer: &GpuBuffer, len: usize) -> Vec<u8> {
    let mut bytes = match buffer.device_buffer() {
        Some(device) => pool.backend().read_buffer(device).expect("read back"),
        None => buffer.host_bytes().expect("host storage").to_vec(),
    };
    bytes.truncate(len);
    bytes
}

/// Two quads side by side, the right one using material `right_mat`.
pub fn two_materials(right_mat: i16, totmat: usize) -> BaseMesh {
    let mut base = generators::plane_grid(2, 1, 2.0);
    base.polys[1].mat_nr = right_mat;
    base.totmat = totmat;
    base
}

/// A cube with every face flagged smooth or flat.
pub fn shaded_cube(smooth: bool) -> BaseMesh {
    let mut base = generators::cube(2.0);
    for poly in &mut base.polys {
        poly.flag.set(PolyFlags::SMOOTH, smooth);
    }
    base
}

/// Add a constant colour layer named `name`.
pub fn add_color(base: &mut BaseMesh, name: &str, rgba: [u8; 4]) {
    let len = base.loops.len();
    base.ldata.add_layer(name, LayerData::Color(vec![rgba; len]));
}

/// The unit quad plus one vertex no edge or face uses.
pub fn quad_with_loose_vert() -> BaseMesh {
    let positions = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [3.0, 4.0, 5.0],
    ];
    BaseMesh::from_polygons(&positions, &[vec![0, 1, 2, 3]]).expect("valid cage")
}

pub fn as_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn as_u32(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn as_i16(bytes: &[u8]) -> Vec<i16> {
    bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect()
}
