//! Draw buffer layout and pooling, end to end over the dummy backend.

mod common;

use std::sync::Arc;

use rstest::rstest;
use subsurf_core::derived::DerivedMesh;
use subsurf_core::mesh::{LayerData, generators};
use subsurf_graphics::draw::builder::QUAD_POINT_LOOPS;
use subsurf_graphics::{BufferKind, BufferPool, DrawMesh, DrawObject, DrawSource, DummyBackend, PoolConfig};

use common::*;

/// Build `kind` for `mesh` and read the bytes back.
fn packed(mesh: &dyn DrawSource, pool: &Arc<BufferPool>, kind: BufferKind) -> Option<Vec<u8>> {
    let mut object = DrawObject::new(mesh, pool.clone());
    let len = subsurf_graphics::draw::build_buffer(mesh, &object, kind, None).ok()?.len();
    let buffer = object.setup(mesh, kind)?;
    Some(contents(pool, buffer, len))
}

// ---------------------------------------------------------------------------
// Pool reuse
// ---------------------------------------------------------------------------

#[rstest]
#[case::exact(1000, 1000, true)]
#[case::smaller_within_half(1000, 600, true)]
#[case::exactly_half(1000, 500, false)]
#[case::under_half(1000, 400, false)]
#[case::larger(1000, 1200, false)]
fn test_pool_reuse_window(#[case] pooled: usize, #[case] request: usize, #[case] reused: bool) {
    init_logging();
    let (backend, pool) = dummy_pool(PoolConfig::new());
    let buffer = pool.acquire(pooled).unwrap();
    pool.release(buffer);
    assert_eq!(backend.created(), 1);

    let buffer = pool.acquire(request).unwrap();
    assert!(buffer.size() >= request);
    assert_eq!(backend.created() == 1, reused);
    assert_eq!(pool.is_empty(), reused);
}

#[test]
fn test_pool_picks_smallest_fit() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let sizes = [900, 700, 1500];
    let buffers: Vec<_> = sizes.iter().map(|&s| pool.acquire(s).unwrap()).collect();
    for buffer in buffers {
        pool.release(buffer);
    }
    assert_eq!(pool.acquire(600).unwrap().size(), 700);
    assert_eq!(pool.acquire(800).unwrap().size(), 900);
}

#[test]
fn test_host_fallback_when_mapping_fails() {
    init_logging();
    let (backend, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&generators::unit_quad(), 1);
    backend.fail_next_maps(usize::MAX / 2);

    let mut object = DrawObject::new(&mesh, pool.clone());
    let buffer = object.setup(&mesh, BufferKind::Vertex).unwrap();
    assert!(!buffer.is_device());
    assert_eq!(backend.live(), 0);
}

#[test]
fn test_host_only_backend() {
    let backend = Arc::new(DummyBackend::host_only());
    let pool = Arc::new(BufferPool::new(backend.clone(), PoolConfig::new()));
    let mesh = subdivide(&generators::unit_quad(), 1);
    let bytes = packed(&mesh, &pool, BufferKind::Triangles).unwrap();
    assert_eq!(bytes.len(), 16 * 6 * 4);
    assert_eq!(backend.created(), 0);
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[test]
fn test_vertex_points_follow_quad_corners() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&generators::cube(2.0), 2);
    let positions = as_f32(&packed(&mesh, &pool, BufferKind::Vertex).unwrap());
    assert_eq!(positions.len(), mesh.num_polys() * 6 * 3);
    for quad in [0, 7, mesh.num_polys() - 1] {
        for (k, corner) in mesh.quad_corners(quad).iter().enumerate() {
            let at = quad * 12 + k * 3;
            assert_eq!(&positions[at..at + 3], corner.as_slice());
        }
    }
}

#[test]
fn test_edges_index_matching_points() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&generators::plane_grid(2, 2, 2.0), 1);
    let positions = as_f32(&packed(&mesh, &pool, BufferKind::Vertex).unwrap());
    let edges = as_u32(&packed(&mesh, &pool, BufferKind::Edge).unwrap());
    assert_eq!(edges.len(), mesh.num_edges() * 2);

    let verts = mesh.verts();
    for (e, pair) in mesh.edges().iter().zip(edges.chunks_exact(2)) {
        for (v, point) in [(e.v1, pair[0]), (e.v2, pair[1])] {
            let at = point as usize * 3;
            let co = verts[v as usize].co;
            for axis in 0..3 {
                assert!((positions[at + axis] - co[axis]).abs() < 1e-5);
            }
        }
    }
}

#[test]
fn test_loose_vertex_appended() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&quad_with_loose_vert(), 1);
    let object = DrawObject::new(&mesh, pool.clone());
    assert_eq!(object.tot_loose_point, 1);
    let loose = object.loose_verts()[0] as usize;
    assert_eq!(object.vert_points()[loose] as usize, object.tot_triangle_point);

    let positions = as_f32(&packed(&mesh, &pool, BufferKind::Vertex).unwrap());
    let at = object.tot_triangle_point * 3;
    assert_eq!(&positions[at..at + 3], &[3.0f32, 4.0, 5.0]);
}

#[test]
fn test_triangle_winding() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&generators::unit_quad(), 1);
    let tris = as_u32(&packed(&mesh, &pool, BufferKind::Triangles).unwrap());
    assert_eq!(&tris[..12], &[3, 2, 1, 3, 1, 0, 7, 6, 5, 7, 5, 4]);
}

#[rstest]
#[case::in_order(0, 1, 0, 64)]
#[case::swapped(1, 0, 64, 0)]
#[case::clamped(0, 9, 0, 64)]
fn test_material_regions(
    #[case] left: i16,
    #[case] right: i16,
    #[case] first_region_tl: u32,
    #[case] second_region_tl: u32,
) {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mut base = two_materials(right, 2);
    base.polys[0].mat_nr = left;
    let mesh = subdivide(&base, 1);

    let object = DrawObject::new(&mesh, pool.clone());
    let regions = object.materials();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].mat_nr, 0);
    assert_eq!(regions[1].start, 96);
    assert_eq!(regions[1].totloops, 64);

    let tris = as_u32(&packed(&mesh, &pool, BufferKind::Triangles).unwrap());
    assert_eq!(tris[5], first_region_tl);
    assert_eq!(tris[96 + 5], second_region_tl);
}

#[test]
fn test_unused_material_has_no_region() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&two_materials(2, 3), 1);
    let object = DrawObject::new(&mesh, pool);
    assert_eq!(object.materials().len(), 2);
    assert_eq!(object.materials()[1].mat_nr, 2);
    assert_eq!(object.region_of(1), None);
    assert_eq!(object.region_of(2), Some(1));
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[rstest]
#[case::flat(false)]
#[case::smooth(true)]
fn test_normals_by_shading(#[case] smooth: bool) {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&shaded_cube(smooth), 2);
    let normals = as_i16(&packed(&mesh, &pool, BufferKind::Normal).unwrap());

    let varying = normals
        .chunks_exact(16)
        .filter(|quad| (1..4).any(|k| quad[k * 4..k * 4 + 3] != quad[..3]))
        .count();
    if smooth {
        assert!(varying > 0);
    } else {
        assert_eq!(varying, 0);
    }
}

#[test]
fn test_custom_normals_win() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mut base = shaded_cube(true);
    let len = base.loops.len();
    base.ldata.add_layer("Normals", LayerData::Normal(vec![[1.0, 0.0, 0.0]; len]));
    let mesh = subdivide(&base, 1);

    let normals = as_i16(&packed(&mesh, &pool, BufferKind::Normal).unwrap());
    for n in normals.chunks_exact(4) {
        assert!(n[0] >= 32766);
        assert_eq!(&n[1..3], &[0, 0]);
    }
}

#[test]
fn test_color_layer_by_name() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mut base = generators::unit_quad();
    add_color(&mut base, "Col", [255, 0, 0, 255]);
    add_color(&mut base, "Paint", [0, 0, 255, 255]);
    let mesh = subdivide(&base, 1);
    let len = 16 * 6 * 3;

    let mut object = DrawObject::new(&mesh, pool.clone());
    let paint = contents(&pool, object.setup_color(&mesh, Some("Paint")).unwrap(), len);
    assert_eq!(&paint[..6], &[0, 0, 255, 0, 0, 255]);
    assert_eq!(object.color_layer(), Some("Paint"));

    let col = contents(&pool, object.setup_color(&mesh, None).unwrap(), len);
    assert_eq!(&col[..3], &[255, 0, 0]);
    assert!(object.setup_color(&mesh, Some("Missing")).is_none());
}

#[test]
fn test_dirty_colors_rebuild() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mut base = generators::unit_quad();
    add_color(&mut base, "Col", [10, 20, 30, 255]);
    let mesh = subdivide(&base, 1);

    let mut object = DrawObject::new(&mesh, pool.clone());
    assert!(object.setup(&mesh, BufferKind::Color).is_some());
    object.mark_colors_dirty();
    assert!(object.colors_dirty());
    assert!(object.setup(&mesh, BufferKind::Color).is_some());
    assert!(!object.colors_dirty());
}

#[test]
fn test_uv_buffers() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&generators::unit_quad(), 1);
    let uvs = mesh.loop_data().active_uv().unwrap().to_vec();

    let packed_uv = as_f32(&packed(&mesh, &pool, BufferKind::Uv).unwrap());
    let texpaint = as_f32(&packed(&mesh, &pool, BufferKind::UvTexPaint).unwrap());
    let uv_edges = as_f32(&packed(&mesh, &pool, BufferKind::UvEdge).unwrap());

    for quad in [0, 5, 15] {
        for (k, l) in QUAD_POINT_LOOPS.iter().enumerate() {
            let uv = uvs[quad * 4 + l];
            assert_eq!(&packed_uv[quad * 8 + k * 2..][..2], &uv);
            assert_eq!(&texpaint[quad * 16 + k * 4..][..4], &[uv[0], uv[1], uv[0], uv[1]]);
        }
        for i in 0..4 {
            let l = quad * 4 + i;
            let next = quad * 4 + (i + 1) % 4;
            assert_eq!(&uv_edges[l * 4..][..4], &[uvs[l][0], uvs[l][1], uvs[next][0], uvs[next][1]]);
        }
    }
}

#[test]
fn test_missing_uv_layer_skips_buffers() {
    let (_, pool) = dummy_pool(PoolConfig::new());
    let mesh = subdivide(&quad_with_loose_vert(), 1);
    let mut object = DrawObject::new(&mesh, pool);
    for kind in [BufferKind::Uv, BufferKind::UvTexPaint, BufferKind::UvEdge, BufferKind::Color] {
        assert!(object.setup(&mesh, kind).is_none(), "{kind:?}");
    }
    assert!(object.setup(&mesh, BufferKind::Vertex).is_some());
}

// ---------------------------------------------------------------------------
// Draw mesh
// ---------------------------------------------------------------------------

#[test]
fn test_draw_mesh_lifecycle() {
    let (backend, pool) = dummy_pool(PoolConfig::new());
    let mesh = Arc::new(subdivide(&generators::unit_quad(), 1));
    let mut draw = DrawMesh::new(mesh, pool.clone());
    assert!(!draw.has_object());

    assert!(draw.buffer(BufferKind::Vertex).is_some());
    assert!(draw.buffer(BufferKind::Triangles).is_some());
    assert!(draw.has_object());
    assert_eq!(backend.created(), 2);

    draw.replace_source(Arc::new(subdivide(&generators::unit_quad(), 1)));
    assert!(!draw.has_object());
    assert_eq!(pool.len(), 2);

    assert!(draw.buffer(BufferKind::Vertex).is_some());
    assert_eq!(backend.created(), 2);
}
