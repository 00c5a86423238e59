//! Layout of one subdivided sample record.

use crate::math::Vec3;

/// Describes how a sample record is laid out in the engine's float storage.
///
/// Records are `[layers | mask | normal]`: `num_layers` interpolated floats
/// (position or UV), an optional interpolated paint-mask float, then an
/// optional normal computed after refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcgKey {
    /// Refinement depth the samples were produced at.
    pub level: u32,
    /// Floats per record.
    pub elem_size: usize,
    /// Samples along one side of a face-corner grid.
    pub grid_size: usize,
    /// `grid_size²`.
    pub grid_area: usize,
    /// Interpolated data floats at the front of the record.
    pub num_layers: usize,
    pub has_normals: bool,
    pub has_mask: bool,
    pub mask_offset: usize,
    pub normal_offset: usize,
}

impl CcgKey {
    /// Layout for `num_layers` data floats at refinement `depth`.
    pub fn new(depth: u32, num_layers: usize, has_mask: bool, has_normals: bool) -> Self {
        let grid_size = (1usize << (depth.max(1) - 1)) + 1;
        let mask_offset = num_layers;
        let normal_offset = num_layers + has_mask as usize;
        Self {
            level: depth,
            elem_size: normal_offset + if has_normals { 3 } else { 0 },
            grid_size,
            grid_area: grid_size * grid_size,
            num_layers,
            has_normals,
            has_mask,
            mask_offset,
            normal_offset,
        }
    }

    /// Floats that take part in interpolation (data layers plus mask).
    pub fn interp_size(&self) -> usize {
        self.num_layers + self.has_mask as usize
    }

    /// Record at `(x, y)` of a grid stored row by row.
    #[inline]
    pub fn grid_elem<'a>(&self, grid: &'a [f32], x: usize, y: usize) -> &'a [f32] {
        let at = (y * self.grid_size + x) * self.elem_size;
        &grid[at..at + self.elem_size]
    }

    /// Position of a record (first three data floats).
    #[inline]
    pub fn co(&self, elem: &[f32]) -> Vec3 {
        Vec3::new(elem[0], elem[1], elem.get(2).copied().unwrap_or(0.0))
    }

    /// Normal of a record, zero when normals are not stored.
    #[inline]
    pub fn no(&self, elem: &[f32]) -> Vec3 {
        if self.has_normals {
            let o = self.normal_offset;
            Vec3::new(elem[o], elem[o + 1], elem[o + 2])
        } else {
            Vec3::zeros()
        }
    }

    /// Paint mask of a record, zero when the mask is not stored.
    #[inline]
    pub fn mask(&self, elem: &[f32]) -> f32 {
        if self.has_mask { elem[self.mask_offset] } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_offsets() {
        let key = CcgKey::new(2, 3, true, true);
        assert_eq!(key.grid_size, 3);
        assert_eq!(key.grid_area, 9);
        assert_eq!(key.mask_offset, 3);
        assert_eq!(key.normal_offset, 4);
        assert_eq!(key.elem_size, 7);
        assert_eq!(key.interp_size(), 4);
    }

    #[test]
    fn test_uv_layout_has_no_extras() {
        let key = CcgKey::new(1, 2, false, false);
        assert_eq!(key.grid_size, 2);
        assert_eq!(key.elem_size, 2);
        assert_eq!(key.no(&[0.5, 0.5]), Vec3::zeros());
        assert_eq!(key.co(&[0.5, 0.25]), Vec3::new(0.5, 0.25, 0.0));
    }

    #[test]
    fn test_grid_elem_indexing() {
        let key = CcgKey::new(2, 1, false, false);
        let grid: Vec<f32> = (0..9).map(|i| i as f32).collect();
        assert_eq!(key.grid_elem(&grid, 2, 1), &[5.0]);
    }
}
