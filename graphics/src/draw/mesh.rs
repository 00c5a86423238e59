use std::sync::Arc;

use super::object::DrawObject;
use super::source::DrawSource;
use crate::resources::{BufferPool, GpuBuffer};
use crate::types::BufferKind;

/// A mesh with lazily built draw buffers.
///
/// The draw object is laid out on first use and dropped whenever the source
/// changes, returning its buffers to the pool.
pub struct DrawMesh<S: DrawSource> {
    source: Arc<S>,
    pool: Arc<BufferPool>,
    object: Option<DrawObject>,
}

impl<S: DrawSource> DrawMesh<S> {
    pub fn new(source: Arc<S>, pool: Arc<BufferPool>) -> Self {
        Self {
            source,
            pool,
            object: None,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// The draw object, laid out on demand.
    pub fn object(&mut self) -> &mut DrawObject {
        let source = &*self.source;
        let pool = &self.pool;
        self.object
            .get_or_insert_with(|| DrawObject::new(source, pool.clone()))
    }

    /// Whether a draw object currently exists.
    pub fn has_object(&self) -> bool {
        self.object.is_some()
    }

    /// The buffer of `kind`, built and uploaded if missing.
    pub fn buffer(&mut self, kind: BufferKind) -> Option<&GpuBuffer> {
        let source = Arc::clone(&self.source);
        self.object().setup(&*source, kind)
    }

    /// The colour buffer built from layer `layer`.
    pub fn color_buffer(&mut self, layer: Option<&str>) -> Option<&GpuBuffer> {
        let source = Arc::clone(&self.source);
        self.object().setup_color(&*source, layer)
    }

    /// Drop the draw object and its buffers.
    pub fn invalidate(&mut self) {
        if self.object.take().is_some() {
            log::trace!("draw object invalidated");
        }
    }

    /// Swap in a new source, invalidating everything built from the old one.
    pub fn replace_source(&mut self, source: Arc<S>) {
        self.invalidate();
        self.source = source;
    }
}

impl<S: DrawSource> std::fmt::Debug for DrawMesh<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawMesh")
            .field("object", &self.object)
            .finish()
    }
}
