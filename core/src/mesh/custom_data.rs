//! Named attribute layers attached to mesh elements.
//!
//! A [`CustomData`] block is a list of layers, each storing one value per
//! element. Layers can be interpolated (weighted blends for subdivided
//! elements) or copied verbatim (elements inherited from a base element).

/// Kind of value stored in a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Generic scalar.
    Float,
    /// Texture coordinates.
    Uv,
    /// Custom split normals.
    Normal,
    /// 8-bit RGBA colour.
    Color,
    /// Sculpt paint mask.
    PaintMask,
}

/// Storage for one layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
    Float(Vec<f32>),
    Uv(Vec<[f32; 2]>),
    Normal(Vec<[f32; 3]>),
    Color(Vec<[u8; 4]>),
    PaintMask(Vec<f32>),
}

impl LayerData {
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Float(_) => LayerKind::Float,
            Self::Uv(_) => LayerKind::Uv,
            Self::Normal(_) => LayerKind::Normal,
            Self::Color(_) => LayerKind::Color,
            Self::PaintMask(_) => LayerKind::PaintMask,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) | Self::PaintMask(v) => v.len(),
            Self::Uv(v) => v.len(),
            Self::Normal(v) => v.len(),
            Self::Color(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-filled storage of the same kind.
    fn zeroed(kind: LayerKind, len: usize) -> Self {
        match kind {
            LayerKind::Float => Self::Float(vec![0.0; len]),
            LayerKind::Uv => Self::Uv(vec![[0.0; 2]; len]),
            LayerKind::Normal => Self::Normal(vec![[0.0; 3]; len]),
            LayerKind::Color => Self::Color(vec![[0; 4]; len]),
            LayerKind::PaintMask => Self::PaintMask(vec![0.0; len]),
        }
    }
}

/// A named layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub data: LayerData,
}

/// An ordered set of layers over one element domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomData {
    layers: Vec<Layer>,
    /// Active UV layer, as an index among UV layers.
    active_uv: usize,
    /// Stencil UV layer for texture painting, as an index among UV layers.
    stencil_uv: usize,
}

impl CustomData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer.
    pub fn add_layer(&mut self, name: impl Into<String>, data: LayerData) {
        self.layers.push(Layer {
            name: name.into(),
            data,
        });
    }

    /// Builder form of [`add_layer`](Self::add_layer).
    pub fn with_layer(mut self, name: impl Into<String>, data: LayerData) -> Self {
        self.add_layer(name, data);
        self
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of layers of `kind`.
    pub fn count(&self, kind: LayerKind) -> usize {
        self.layers.iter().filter(|l| l.data.kind() == kind).count()
    }

    /// The `n`-th layer of `kind`.
    pub fn layer_n(&self, kind: LayerKind, n: usize) -> Option<&Layer> {
        self.layers.iter().filter(|l| l.data.kind() == kind).nth(n)
    }

    fn layer_n_mut(&mut self, kind: LayerKind, n: usize) -> Option<&mut Layer> {
        self.layers
            .iter_mut()
            .filter(|l| l.data.kind() == kind)
            .nth(n)
    }

    /// Layer with the given name.
    pub fn layer_named(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// The `n`-th UV layer.
    pub fn uv(&self, n: usize) -> Option<&[[f32; 2]]> {
        match self.layer_n(LayerKind::Uv, n).map(|l| &l.data) {
            Some(LayerData::Uv(v)) => Some(v),
            _ => None,
        }
    }

    /// Mutable access to the `n`-th UV layer.
    pub fn uv_mut(&mut self, n: usize) -> Option<&mut [[f32; 2]]> {
        match self.layer_n_mut(LayerKind::Uv, n).map(|l| &mut l.data) {
            Some(LayerData::Uv(v)) => Some(v),
            _ => None,
        }
    }

    /// Active UV layer.
    pub fn active_uv(&self) -> Option<&[[f32; 2]]> {
        self.uv(self.active_uv).or_else(|| self.uv(0))
    }

    /// Stencil UV layer.
    pub fn stencil_uv(&self) -> Option<&[[f32; 2]]> {
        self.uv(self.stencil_uv).or_else(|| self.uv(0))
    }

    pub fn set_active_uv(&mut self, n: usize) {
        self.active_uv = n;
    }

    pub fn set_stencil_uv(&mut self, n: usize) {
        self.stencil_uv = n;
    }

    /// Colour layer by name, or the first colour layer for `None`.
    pub fn color(&self, name: Option<&str>) -> Option<&[[u8; 4]]> {
        let layer = match name {
            Some(name) => self.layer_named(name),
            None => self.layer_n(LayerKind::Color, 0),
        };
        match layer.map(|l| &l.data) {
            Some(LayerData::Color(v)) => Some(v),
            _ => None,
        }
    }

    /// First layer of loop normals.
    pub fn normals(&self) -> Option<&[[f32; 3]]> {
        match self.layer_n(LayerKind::Normal, 0).map(|l| &l.data) {
            Some(LayerData::Normal(v)) => Some(v),
            _ => None,
        }
    }

    /// First paint-mask layer.
    pub fn paint_mask(&self) -> Option<&[f32]> {
        match self.layer_n(LayerKind::PaintMask, 0).map(|l| &l.data) {
            Some(LayerData::PaintMask(v)) => Some(v),
            _ => None,
        }
    }

    /// Same layer layout, zero-filled, sized for `len` elements.
    pub fn alloc_like(&self, len: usize) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .map(|l| Layer {
                    name: l.name.clone(),
                    data: LayerData::zeroed(l.data.kind(), len),
                })
                .collect(),
            active_uv: self.active_uv,
            stencil_uv: self.stencil_uv,
        }
    }

    /// Write a weighted blend of `src` elements into element `dst`.
    ///
    /// `src` must share this block's layer layout.
    pub fn interp_from(&mut self, src: &CustomData, indices: &[usize], weights: &[f32], dst: usize) {
        debug_assert_eq!(indices.len(), weights.len());
        for (out, inp) in self.layers.iter_mut().zip(&src.layers) {
            match (&mut out.data, &inp.data) {
                (LayerData::Float(o), LayerData::Float(i))
                | (LayerData::PaintMask(o), LayerData::PaintMask(i)) => {
                    o[dst] = indices.iter().zip(weights).map(|(&s, w)| i[s] * w).sum();
                }
                (LayerData::Uv(o), LayerData::Uv(i)) => {
                    o[dst] = blend(indices, weights, |s| i[s]);
                }
                (LayerData::Normal(o), LayerData::Normal(i)) => {
                    o[dst] = blend(indices, weights, |s| i[s]);
                }
                (LayerData::Color(o), LayerData::Color(i)) => {
                    let mut acc = [0.0f32; 4];
                    for (&s, &w) in indices.iter().zip(weights) {
                        for (c, &v) in acc.iter_mut().zip(&i[s]) {
                            *c += v as f32 * w;
                        }
                    }
                    o[dst] = acc.map(|c| c.round().clamp(0.0, 255.0) as u8);
                }
                _ => log::warn!("layer '{}' kind mismatch, skipping interpolation", out.name),
            }
        }
    }

    /// Copy element `src_index` of `src` into element `dst`.
    pub fn copy_from(&mut self, src: &CustomData, src_index: usize, dst: usize) {
        for (out, inp) in self.layers.iter_mut().zip(&src.layers) {
            match (&mut out.data, &inp.data) {
                (LayerData::Float(o), LayerData::Float(i))
                | (LayerData::PaintMask(o), LayerData::PaintMask(i)) => o[dst] = i[src_index],
                (LayerData::Uv(o), LayerData::Uv(i)) => o[dst] = i[src_index],
                (LayerData::Normal(o), LayerData::Normal(i)) => o[dst] = i[src_index],
                (LayerData::Color(o), LayerData::Color(i)) => o[dst] = i[src_index],
                _ => log::warn!("layer '{}' kind mismatch, skipping copy", out.name),
            }
        }
    }

    /// Check every layer holds exactly `len` elements.
    pub fn check_len(&self, len: usize) -> Option<&str> {
        self.layers
            .iter()
            .find(|l| l.data.len() != len)
            .map(|l| l.name.as_str())
    }
}

fn blend<const N: usize>(indices: &[usize], weights: &[f32], get: impl Fn(usize) -> [f32; N]) -> [f32; N] {
    let mut acc = [0.0; N];
    for (&s, &w) in indices.iter().zip(weights) {
        for (a, v) in acc.iter_mut().zip(get(s)) {
            *a += v * w;
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CustomData {
        CustomData::new()
            .with_layer("uv", LayerData::Uv(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]))
            .with_layer("col", LayerData::Color(vec![[0, 0, 0, 255], [255, 255, 255, 255], [0; 4]]))
    }

    #[test]
    fn test_interp_blends_every_layer() {
        let src = sample();
        let mut dst = src.alloc_like(1);
        dst.interp_from(&src, &[0, 1], &[0.5, 0.5], 0);

        assert_eq!(dst.uv(0).unwrap()[0], [0.5, 0.0]);
        assert_eq!(dst.color(None).unwrap()[0], [128, 128, 128, 255]);
    }

    #[test]
    fn test_copy_and_lookup() {
        let src = sample();
        let mut dst = src.alloc_like(2);
        dst.copy_from(&src, 2, 1);
        assert_eq!(dst.uv(0).unwrap()[1], [1.0, 1.0]);
        assert!(dst.color(Some("col")).is_some());
        assert!(dst.color(Some("missing")).is_none());
        assert_eq!(dst.count(LayerKind::Uv), 1);
        assert_eq!(dst.check_len(2), None);
    }
}
