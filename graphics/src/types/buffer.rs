//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer is mappable for CPU write.
        const MAP_WRITE = 1 << 8;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

// ============================================================================
// Draw buffer kinds
// ============================================================================

/// Scalar type of one buffer component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    F32,
    I16,
    U8,
    U32,
}

impl ComponentType {
    /// Size in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::F32 | Self::U32 => 4,
            Self::I16 => 2,
            Self::U8 => 1,
        }
    }
}

/// The attribute streams a draw object can hold.
///
/// | Kind | Components | Type |
/// |------|-----------:|------|
/// | `Vertex` | 3 | `f32` |
/// | `Normal` | 4 | `i16` |
/// | `Color` | 3 | `u8` |
/// | `Uv` | 2 | `f32` |
/// | `UvTexPaint` | 4 | `f32` |
/// | `Edge` | 2 | `u32` |
/// | `UvEdge` | 4 | `f32` |
/// | `Triangles` | 1 | `u32` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Normal,
    Color,
    Uv,
    /// Material UV followed by stencil UV.
    UvTexPaint,
    Edge,
    UvEdge,
    Triangles,
}

impl BufferKind {
    pub const COUNT: usize = 8;

    pub const ALL: [BufferKind; Self::COUNT] = [
        Self::Vertex,
        Self::Normal,
        Self::Color,
        Self::Uv,
        Self::UvTexPaint,
        Self::Edge,
        Self::UvEdge,
        Self::Triangles,
    ];

    /// Components per element.
    pub const fn components(self) -> usize {
        match self {
            Self::Vertex | Self::Color => 3,
            Self::Normal | Self::UvTexPaint | Self::UvEdge => 4,
            Self::Uv | Self::Edge => 2,
            Self::Triangles => 1,
        }
    }

    pub const fn component_type(self) -> ComponentType {
        match self {
            Self::Vertex | Self::Uv | Self::UvTexPaint | Self::UvEdge => ComponentType::F32,
            Self::Normal => ComponentType::I16,
            Self::Color => ComponentType::U8,
            Self::Edge | Self::Triangles => ComponentType::U32,
        }
    }

    /// Bytes per element.
    pub const fn stride(self) -> usize {
        self.components() * self.component_type().size()
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Vertex => "draw_vertex",
            Self::Normal => "draw_normal",
            Self::Color => "draw_color",
            Self::Uv => "draw_uv",
            Self::UvTexPaint => "draw_uv_texpaint",
            Self::Edge => "draw_edge",
            Self::UvEdge => "draw_uv_edge",
            Self::Triangles => "draw_triangles",
        }
    }

    /// Slot of this kind in per-kind arrays.
    pub const fn index(self) -> usize {
        self as usize
    }
}
