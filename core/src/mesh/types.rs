//! Element records shared by base meshes and materialized meshes.

use bitflags::bitflags;

bitflags! {
    /// Per-vertex flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertFlags: u8 {
        /// Vertex is selected.
        const SELECT = 1 << 0;
        /// Vertex was welded with another one (e.g. by a mirror modifier).
        const MERGED = 1 << 1;
        /// Vertex is hidden.
        const HIDDEN = 1 << 4;
    }
}

bitflags! {
    /// Per-edge flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeFlags: u16 {
        /// Edge is selected.
        const SELECT = 1 << 0;
        /// Edge is drawn in the viewport wireframe.
        const EDGEDRAW = 1 << 1;
        /// Edge is a UV seam.
        const SEAM = 1 << 2;
        /// Edge is hidden.
        const HIDDEN = 1 << 4;
        /// Edge is drawn by the wireframe renderer.
        const EDGERENDER = 1 << 5;
        /// Edge is not used by any face.
        const LOOSEEDGE = 1 << 7;
        /// Edge is marked sharp for normal splitting.
        const SHARP = 1 << 9;
    }
}

bitflags! {
    /// Per-polygon flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PolyFlags: u8 {
        /// Polygon is smooth shaded.
        const SMOOTH = 1 << 0;
        /// Polygon is selected.
        const SELECT = 1 << 1;
        /// Polygon is hidden.
        const HIDDEN = 1 << 4;
    }
}

/// A mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshVert {
    pub co: [f32; 3],
    /// Normal packed as signed shorts.
    pub no: [i16; 3],
    pub flag: VertFlags,
}

impl MeshVert {
    pub fn new(co: [f32; 3]) -> Self {
        Self {
            co,
            ..Default::default()
        }
    }
}

/// A mesh edge between two vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshEdge {
    pub v1: u32,
    pub v2: u32,
    /// Crease weight, 0 (smooth) to 255 (fully sharp).
    pub crease: u8,
    pub flag: EdgeFlags,
}

impl MeshEdge {
    pub fn new(v1: u32, v2: u32) -> Self {
        Self {
            v1,
            v2,
            crease: 0,
            flag: EdgeFlags::EDGEDRAW | EdgeFlags::EDGERENDER,
        }
    }

    pub fn with_crease(mut self, crease: u8) -> Self {
        self.crease = crease;
        self
    }

    pub fn with_flag(mut self, flag: EdgeFlags) -> Self {
        self.flag |= flag;
        self
    }

    /// The other endpoint, given one of them.
    pub fn other(&self, v: u32) -> u32 {
        if self.v1 == v { self.v2 } else { self.v1 }
    }
}

/// A polygon spanning `totloop` consecutive loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshPoly {
    pub loopstart: u32,
    pub totloop: u32,
    pub mat_nr: i16,
    pub flag: PolyFlags,
}

impl MeshPoly {
    /// Range of loop indices owned by this polygon.
    pub fn loops(&self) -> std::ops::Range<usize> {
        self.loopstart as usize..(self.loopstart + self.totloop) as usize
    }
}

/// A polygon corner: the vertex and the edge leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshLoop {
    pub v: u32,
    pub e: u32,
}

/// A triangle of loop indices tessellating one polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopTri {
    pub tri: [u32; 3],
    pub poly: u32,
}

/// Shading flag and material of a polygon, as seen by grid consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagMat {
    pub flag: PolyFlags,
    pub mat_nr: i16,
}

impl Default for FlagMat {
    fn default() -> Self {
        Self {
            flag: PolyFlags::SMOOTH,
            mat_nr: 0,
        }
    }
}
