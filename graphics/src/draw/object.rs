//! Draw objects: the layout shared by all draw buffers of one mesh.

use std::sync::Arc;

use super::builder::{QUAD_POINT_LOOPS, build_buffer};
use super::source::DrawSource;
use crate::error::DrawError;
use crate::resources::{BufferPool, GpuBuffer};
use crate::types::BufferKind;

/// Triangles drawn with one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRegion {
    /// First triangle index of the region in the triangle buffer.
    pub start: usize,
    /// Number of triangle indices in the region.
    pub totelements: usize,
    /// Number of loops (points) covered by the region.
    pub totloops: usize,
    /// Original material index.
    pub mat_nr: usize,
    /// Base faces drawn in this region.
    pub polys: Vec<u32>,
}

/// Buffer layout and uploaded buffers for one mesh.
///
/// Every quad of the source owns four consecutive points. Vertices that no
/// quad references are appended after the quad points as loose points, so
/// edges can still reference them.
pub struct DrawObject {
    pool: Arc<BufferPool>,
    buffers: [Option<GpuBuffer>; BufferKind::COUNT],
    materials: Vec<MaterialRegion>,
    mat_orig_to_new: Vec<Option<usize>>,
    vert_points: Vec<i32>,
    loose_verts: Vec<u32>,
    color_layer: Option<String>,
    colors_dirty: bool,

    /// Points covered by quads, six triangle indices per quad.
    pub tot_triangle_point: usize,
    /// Points appended for vertices no quad uses.
    pub tot_loose_point: usize,
    /// Indices needed to draw every base face as a fan outline.
    pub totvert: usize,
    /// Indices needed to draw every edge.
    pub totedge: usize,
    /// Loops across all quads.
    pub tot_loop_verts: usize,
}

impl DrawObject {
    /// Lay out the draw object of `source`. No buffer is uploaded yet.
    pub fn new(source: &dyn DrawSource, pool: Arc<BufferPool>) -> Self {
        let mesh = source.mesh();
        let polys = mesh.polys();
        let totmat = mesh.totmat().max(1);

        let mut elements = vec![0usize; totmat];
        let mut loops = vec![0usize; totmat];
        let mut faces: Vec<Vec<u32>> = vec![Vec::new(); totmat];
        for face in 0..source.num_faces() {
            let quads = source.face_quads(face);
            let Some(first) = polys.get(quads.start) else {
                continue;
            };
            let mat = clamp(first.mat_nr, totmat);
            elements[mat] += quads.len() * 6;
            loops[mat] += quads.len() * 4;
            faces[mat].push(face as u32);
        }

        let mut materials = Vec::new();
        let mut mat_orig_to_new = vec![None; totmat];
        let mut start = 0;
        for (mat, polys) in faces.into_iter().enumerate() {
            if elements[mat] == 0 {
                continue;
            }
            mat_orig_to_new[mat] = Some(materials.len());
            materials.push(MaterialRegion {
                start,
                totelements: elements[mat],
                totloops: loops[mat],
                mat_nr: mat,
                polys,
            });
            start += elements[mat];
        }
        let tot_triangle_point = start;

        let num_quads = source.num_quads();
        let mesh_loops = mesh.loops();
        let mut vert_points = vec![-1i32; mesh.num_verts()];
        for quad in 0..num_quads {
            for (k, l) in QUAD_POINT_LOOPS.iter().enumerate() {
                let Some(lp) = mesh_loops.get(quad * 4 + l) else {
                    continue;
                };
                if let Some(slot) = vert_points.get_mut(lp.v as usize)
                    && *slot < 0
                {
                    *slot = (quad * 4 + k) as i32;
                }
            }
        }

        let mut loose_verts = Vec::new();
        for (v, slot) in vert_points.iter_mut().enumerate() {
            if *slot < 0 {
                *slot = (tot_triangle_point + loose_verts.len()) as i32;
                loose_verts.push(v as u32);
            }
        }
        if !loose_verts.is_empty() {
            log::debug!("draw object has {} loose points", loose_verts.len());
        }

        Self {
            pool,
            buffers: Default::default(),
            materials,
            mat_orig_to_new,
            vert_points,
            tot_loose_point: loose_verts.len(),
            loose_verts,
            color_layer: None,
            colors_dirty: false,
            tot_triangle_point,
            totvert: mesh.num_polys() * 6,
            totedge: mesh.num_edges() * 2,
            tot_loop_verts: num_quads * 4,
        }
    }

    /// Material regions in triangle buffer order.
    pub fn materials(&self) -> &[MaterialRegion] {
        &self.materials
    }

    /// Region index drawing material `mat_nr`, if any quad uses it.
    pub fn region_of(&self, mat_nr: i16) -> Option<usize> {
        self.mat_orig_to_new[self.clamp_material(mat_nr)]
    }

    /// `mat_nr` clamped into the mesh's material range.
    pub fn clamp_material(&self, mat_nr: i16) -> usize {
        clamp(mat_nr, self.mat_orig_to_new.len())
    }

    /// Point index of every mesh vertex.
    pub fn vert_points(&self) -> &[i32] {
        &self.vert_points
    }

    /// Vertices drawn as loose points, in point order.
    pub fn loose_verts(&self) -> &[u32] {
        &self.loose_verts
    }

    /// Colour layer the colour buffer was last built from.
    pub fn color_layer(&self) -> Option<&str> {
        self.color_layer.as_deref()
    }

    /// The uploaded buffer of `kind`, if set up.
    pub fn buffer(&self, kind: BufferKind) -> Option<&GpuBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Build and upload the buffer of `kind` unless it already exists.
    ///
    /// Returns `None` when the mesh lacks the layer the kind is built from or
    /// when neither device nor host memory could be had.
    pub fn setup(&mut self, source: &dyn DrawSource, kind: BufferKind) -> Option<&GpuBuffer> {
        if kind == BufferKind::Color {
            let layer = self.color_layer.clone();
            return self.setup_color(source, layer.as_deref());
        }
        self.setup_with(source, kind, None)
    }

    /// Set up the colour buffer from layer `layer`, rebuilding it when the
    /// layer changed or colours were marked dirty.
    pub fn setup_color(&mut self, source: &dyn DrawSource, layer: Option<&str>) -> Option<&GpuBuffer> {
        if self.colors_dirty || self.color_layer.as_deref() != layer {
            self.release(BufferKind::Color);
            self.color_layer = layer.map(str::to_owned);
            self.colors_dirty = false;
        }
        let layer = self.color_layer.clone();
        self.setup_with(source, BufferKind::Color, layer.as_deref())
    }

    /// Force the colour buffer to be rebuilt on next use.
    pub fn mark_colors_dirty(&mut self) {
        self.colors_dirty = true;
    }

    /// Whether the colour buffer needs rebuilding.
    pub fn colors_dirty(&self) -> bool {
        self.colors_dirty
    }

    /// Hand the buffer of `kind` back to the pool.
    pub fn release(&mut self, kind: BufferKind) {
        if let Some(buffer) = self.buffers[kind.index()].take() {
            self.pool.release(buffer);
        }
    }

    /// Hand every buffer back to the pool.
    pub fn release_all(&mut self) {
        for kind in BufferKind::ALL {
            self.release(kind);
        }
    }

    fn setup_with(
        &mut self,
        source: &dyn DrawSource,
        kind: BufferKind,
        color_layer: Option<&str>,
    ) -> Option<&GpuBuffer> {
        match self.ensure_buffer(source, kind, color_layer) {
            Ok(()) => {}
            Err(DrawError::MissingLayer(kind)) => {
                log::debug!("no layer for {kind:?}, buffer skipped");
            }
            Err(e) => log::warn!("{}: {e}", kind.label()),
        }
        self.buffers[kind.index()].as_ref()
    }

    fn ensure_buffer(
        &mut self,
        source: &dyn DrawSource,
        kind: BufferKind,
        color_layer: Option<&str>,
    ) -> Result<(), DrawError> {
        let slot = kind.index();
        if self.buffers[slot].is_some() {
            return Ok(());
        }
        let bytes = build_buffer(source, self, kind, color_layer)?;
        let buffer = self
            .pool
            .setup(kind, &bytes)
            .ok_or(DrawError::AllocationFailed { size: bytes.len() })?;
        self.buffers[slot] = Some(buffer);
        Ok(())
    }
}

impl std::fmt::Debug for DrawObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawObject")
            .field("materials", &self.materials.len())
            .field("tot_triangle_point", &self.tot_triangle_point)
            .field("tot_loose_point", &self.tot_loose_point)
            .field("buffers", &self.buffers.iter().filter(|b| b.is_some()).count())
            .finish()
    }
}

impl Drop for DrawObject {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn clamp(mat_nr: i16, totmat: usize) -> usize {
    (mat_nr.max(0) as usize).min(totmat - 1)
}

#[cfg(test)]
mod tests {
    use subsurf_core::derived::{MaterializeOptions, SubsurfMesh};
    use subsurf_core::mesh::generators;
    use subsurf_core::sync::sync_from_base;
    use subsurf_core::{SubdivEngine, SubsurfFlags};

    use super::*;
    use crate::backend::dummy::DummyBackend;
    use crate::resources::PoolConfig;

    fn quad_mesh(level: u32) -> SubsurfMesh {
        let base = generators::unit_quad();
        let mut engine = SubdivEngine::new(level + 1, 3, SubsurfFlags::CALC_NORMALS);
        sync_from_base(&mut engine, &base, None, false).unwrap();
        let mut engine = Arc::new(engine);
        SubsurfMesh::build(&mut engine, &base, MaterializeOptions::default()).unwrap()
    }

    fn pool() -> Arc<BufferPool> {
        Arc::new(BufferPool::new(Arc::new(DummyBackend::new()), PoolConfig::new()))
    }

    #[test]
    fn test_layout_counts() {
        let mesh = quad_mesh(1);
        let object = DrawObject::new(&mesh, pool());
        assert_eq!(object.tot_triangle_point, 16 * 6);
        assert_eq!(object.tot_loop_verts, 16 * 4);
        assert_eq!(object.tot_loose_point, 0);
        assert_eq!(object.materials().len(), 1);
        assert_eq!(object.materials()[0].polys, vec![0]);
    }

    #[test]
    fn test_every_vert_has_point() {
        let mesh = quad_mesh(1);
        let object = DrawObject::new(&mesh, pool());
        assert!(object.vert_points().iter().all(|&p| p >= 0));
    }

    #[test]
    fn test_setup_reuses_buffer() {
        let mesh = quad_mesh(1);
        let mut object = DrawObject::new(&mesh, pool());
        let size = object.setup(&mesh, BufferKind::Vertex).map(GpuBuffer::size);
        assert_eq!(size, Some(16 * 4 * 3 * 4));
        assert!(object.buffer(BufferKind::Vertex).is_some());
        assert_eq!(object.setup(&mesh, BufferKind::Vertex).map(GpuBuffer::size), size);
    }

    #[test]
    fn test_missing_color_skips_buffer() {
        let mesh = quad_mesh(1);
        let mut object = DrawObject::new(&mesh, pool());
        assert!(object.setup(&mesh, BufferKind::Color).is_none());
        assert!(object.buffer(BufferKind::Color).is_none());
    }

    #[test]
    fn test_drop_returns_buffers() {
        let mesh = quad_mesh(1);
        let pool = pool();
        {
            let mut object = DrawObject::new(&mesh, pool.clone());
            object.setup(&mesh, BufferKind::Vertex);
            object.setup(&mesh, BufferKind::Triangles);
        }
        assert_eq!(pool.len(), 2);
    }
}
