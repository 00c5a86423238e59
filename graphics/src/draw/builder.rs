//! Packing of draw buffers.
//!
//! Every per-point buffer walks the quads in order and writes four points per
//! quad in `a, b, c, d` order. Slots are reserved for
//! [`DrawObject::tot_triangle_point`] points, so each buffer kind is sized
//! the same way regardless of how many points a quad actually uses.

use subsurf_core::math::{Vec3, normal_float_to_short, quad_normal};
use subsurf_core::mesh::PolyFlags;

use super::object::DrawObject;
use super::source::DrawSource;
use crate::error::DrawError;
use crate::types::BufferKind;

/// Loop offset of each point of a quad.
pub const QUAD_POINT_LOOPS: [usize; 4] = [0, 3, 2, 1];

/// Pack the bytes of one buffer kind.
///
/// `color_layer` names the colour layer for [`BufferKind::Color`], `None`
/// takes the first one. Fails with [`DrawError::MissingLayer`] when the mesh
/// lacks the loop layer the kind is built from.
pub fn build_buffer(
    source: &dyn DrawSource,
    object: &DrawObject,
    kind: BufferKind,
    color_layer: Option<&str>,
) -> Result<Vec<u8>, DrawError> {
    let bytes = match kind {
        BufferKind::Vertex => bytemuck::cast_slice::<_, u8>(&pack_vertex(source, object)).to_vec(),
        BufferKind::Normal => bytemuck::cast_slice::<_, u8>(&pack_normal(source, object)).to_vec(),
        BufferKind::Color => pack_color(source, object, color_layer)?,
        BufferKind::Uv => bytemuck::cast_slice::<_, u8>(&pack_uv(source, object)?).to_vec(),
        BufferKind::UvTexPaint => bytemuck::cast_slice::<_, u8>(&pack_uv_texpaint(source, object)?).to_vec(),
        BufferKind::Edge => bytemuck::cast_slice::<_, u8>(&pack_edge(source, object)).to_vec(),
        BufferKind::UvEdge => bytemuck::cast_slice::<_, u8>(&pack_uv_edge(source, object)?).to_vec(),
        BufferKind::Triangles => bytemuck::cast_slice::<_, u8>(&pack_triangles(source, object)).to_vec(),
    };
    log::trace!("packed {} bytes of {kind:?}", bytes.len());
    Ok(bytes)
}

/// Positions of the quad points, then one point per loose vertex.
pub fn pack_vertex(source: &dyn DrawSource, object: &DrawObject) -> Vec<f32> {
    let mut out = vec![0.0; 3 * (object.tot_triangle_point + object.tot_loose_point)];
    for quad in 0..source.num_quads() {
        let corners = source.quad_corners(quad);
        for (k, corner) in corners.iter().enumerate() {
            let at = quad * 12 + k * 3;
            out[at..at + 3].copy_from_slice(corner.as_slice());
        }
    }
    let verts = source.mesh().verts();
    for (i, &v) in object.loose_verts().iter().enumerate() {
        let at = (object.tot_triangle_point + i) * 3;
        out[at..at + 3].copy_from_slice(&verts[v as usize].co);
    }
    out
}

/// Normals as shorts with a stride of four.
///
/// Custom loop normals win when present. Otherwise smooth quads use the
/// subdivided normals and flat quads repeat the quad's own normal.
pub fn pack_normal(source: &dyn DrawSource, object: &DrawObject) -> Vec<i16> {
    let mesh = source.mesh();
    let lnors = mesh.loop_data().normals();
    let polys = mesh.polys();
    let mut out = vec![0i16; 4 * object.tot_triangle_point];

    let mut put = |quad: usize, normals: [Vec3; 4]| {
        for (k, n) in normals.iter().enumerate() {
            let at = quad * 16 + k * 4;
            out[at..at + 3].copy_from_slice(&normal_float_to_short(n));
        }
    };

    for quad in 0..source.num_quads() {
        if let Some(ln) = lnors {
            put(quad, QUAD_POINT_LOOPS.map(|l| Vec3::from(ln[quad * 4 + l])));
            continue;
        }
        let smooth = polys[quad].flag.contains(PolyFlags::SMOOTH);
        match source.quad_normals(quad).filter(|_| smooth) {
            Some(normals) => put(quad, normals),
            None => {
                let [a, b, c, d] = source.quad_corners(quad);
                put(quad, [quad_normal(&a, &b, &c, &d); 4]);
            }
        }
    }
    out
}

/// RGB bytes of the named colour layer.
pub fn pack_color(
    source: &dyn DrawSource,
    object: &DrawObject,
    layer: Option<&str>,
) -> Result<Vec<u8>, DrawError> {
    let colors = source
        .mesh()
        .loop_data()
        .color(layer)
        .ok_or(DrawError::MissingLayer(BufferKind::Color))?;
    let mut out = vec![0u8; 3 * object.tot_triangle_point];
    for quad in 0..source.num_quads() {
        for (k, l) in QUAD_POINT_LOOPS.iter().enumerate() {
            let at = quad * 12 + k * 3;
            out[at..at + 3].copy_from_slice(&colors[quad * 4 + l][..3]);
        }
    }
    Ok(out)
}

/// Active UV layer.
pub fn pack_uv(source: &dyn DrawSource, object: &DrawObject) -> Result<Vec<f32>, DrawError> {
    let uvs = source
        .mesh()
        .loop_data()
        .active_uv()
        .ok_or(DrawError::MissingLayer(BufferKind::Uv))?;
    let mut out = vec![0.0; 2 * object.tot_triangle_point];
    for quad in 0..source.num_quads() {
        for (k, l) in QUAD_POINT_LOOPS.iter().enumerate() {
            let at = quad * 8 + k * 2;
            out[at..at + 2].copy_from_slice(&uvs[quad * 4 + l]);
        }
    }
    Ok(out)
}

/// Per point, the UV painted for the quad's material followed by the stencil
/// UV.
pub fn pack_uv_texpaint(source: &dyn DrawSource, object: &DrawObject) -> Result<Vec<f32>, DrawError> {
    let mesh = source.mesh();
    let ldata = mesh.loop_data();
    let active = ldata
        .active_uv()
        .ok_or(DrawError::MissingLayer(BufferKind::UvTexPaint))?;
    let stencil = ldata.stencil_uv().unwrap_or(active);
    let slots: Vec<&[[f32; 2]]> = (0..mesh.totmat().max(1))
        .map(|mat| mesh.paint_uv_slot(mat).and_then(|n| ldata.uv(n)).unwrap_or(active))
        .collect();

    let polys = mesh.polys();
    let mut out = vec![0.0; 4 * object.tot_triangle_point];
    for quad in 0..source.num_quads() {
        let mat = object.clamp_material(polys[quad].mat_nr);
        let painted = slots[mat];
        for (k, l) in QUAD_POINT_LOOPS.iter().enumerate() {
            let at = quad * 16 + k * 4;
            out[at..at + 2].copy_from_slice(&painted[quad * 4 + l]);
            out[at + 2..at + 4].copy_from_slice(&stencil[quad * 4 + l]);
        }
    }
    Ok(out)
}

/// Point pairs of every final edge.
pub fn pack_edge(source: &dyn DrawSource, object: &DrawObject) -> Vec<u32> {
    let points = object.vert_points();
    let point = |v: u32| points.get(v as usize).map_or(0, |&p| p.max(0) as u32);
    source
        .mesh()
        .edges()
        .iter()
        .flat_map(|e| [point(e.v1), point(e.v2)])
        .collect()
}

/// Each loop's UV border segment, start and end.
pub fn pack_uv_edge(source: &dyn DrawSource, object: &DrawObject) -> Result<Vec<f32>, DrawError> {
    let uvs = source
        .mesh()
        .loop_data()
        .active_uv()
        .ok_or(DrawError::MissingLayer(BufferKind::UvEdge))?;
    let mut out = vec![0.0; 4 * object.tot_triangle_point];
    for quad in 0..source.num_quads() {
        let l = quad * 4;
        for i in 0..4 {
            let at = (l + i) * 4;
            out[at..at + 2].copy_from_slice(&uvs[l + i]);
            out[at + 2..at + 4].copy_from_slice(&uvs[l + (i + 1) % 4]);
        }
    }
    Ok(out)
}

/// Two triangles per quad, written into the region of the quad's material.
pub fn pack_triangles(source: &dyn DrawSource, object: &DrawObject) -> Vec<u32> {
    let polys = source.mesh().polys();
    let mut out = vec![0u32; object.tot_triangle_point];
    let mut counters: Vec<usize> = object.materials().iter().map(|m| m.start).collect();

    for face in 0..source.num_faces() {
        let quads = source.face_quads(face);
        let Some(region) = polys.get(quads.start).and_then(|p| object.region_of(p.mat_nr)) else {
            continue;
        };
        for quad in quads {
            let tl = (quad * 4) as u32;
            let at = counters[region];
            out[at..at + 6].copy_from_slice(&[tl + 3, tl + 2, tl + 1, tl + 3, tl + 1, tl]);
            counters[region] += 6;
        }
    }
    out
}
