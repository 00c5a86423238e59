//! Subdivision settings and evaluation modes.

use bitflags::bitflags;

bitflags! {
    /// Engine construction flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubsurfFlags: u32 {
        /// Stamp every element with the sync generation of its last change.
        const USE_AGING = 1;
        /// Throwaway engine, never cached.
        const USE_ARENA = 1 << 1;
        /// Compute per-sample normals after refinement.
        const CALC_NORMALS = 1 << 2;
        /// Reserve a paint-mask float in every sample record.
        const ALLOC_MASK = 1 << 3;
        /// Keep the cage shape: every edge fully creased.
        const SIMPLE_SUBDIV = 1 << 4;
    }
}

/// Which consumer the derived mesh is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvalMode {
    /// Interactive editing, backed by the edit cache.
    Edit,
    /// Final render, always a fresh engine at `render_levels`.
    Render,
    /// Viewport display.
    #[default]
    Viewport,
}

/// User-facing subdivision settings.
///
/// # Example
///
/// ```
/// use subsurf_core::settings::{SubsurfFlags, SubsurfSettings};
///
/// let settings = SubsurfSettings::new(2)
///     .with_render_levels(3)
///     .with_flags(SubsurfFlags::ALLOC_MASK)
///     .with_simple(true);
/// assert!(settings.engine_flags().contains(SubsurfFlags::SIMPLE_SUBDIV));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SubsurfSettings {
    pub levels: u32,
    pub render_levels: u32,
    pub flags: SubsurfFlags,
    /// Re-interpolate UV layers through a UV-space engine.
    pub use_subsurf_uv: bool,
    /// Mark face-interior edges as drawable.
    pub draw_interior_edges: bool,
    /// Reuse the cached engine between viewport evaluations.
    pub use_incremental_cache: bool,
    pub is_simple: bool,
}

impl Default for SubsurfSettings {
    fn default() -> Self {
        Self {
            levels: 1,
            render_levels: 2,
            flags: SubsurfFlags::empty(),
            use_subsurf_uv: true,
            draw_interior_edges: false,
            use_incremental_cache: true,
            is_simple: false,
        }
    }
}

impl SubsurfSettings {
    pub fn new(levels: u32) -> Self {
        Self {
            levels,
            ..Default::default()
        }
    }

    pub fn with_levels(mut self, levels: u32) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_render_levels(mut self, levels: u32) -> Self {
        self.render_levels = levels;
        self
    }

    pub fn with_flags(mut self, flags: SubsurfFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_subsurf_uv(mut self, enabled: bool) -> Self {
        self.use_subsurf_uv = enabled;
        self
    }

    pub fn with_draw_interior_edges(mut self, enabled: bool) -> Self {
        self.draw_interior_edges = enabled;
        self
    }

    pub fn with_incremental_cache(mut self, enabled: bool) -> Self {
        self.use_incremental_cache = enabled;
        self
    }

    pub fn with_simple(mut self, simple: bool) -> Self {
        self.is_simple = simple;
        self
    }

    /// Level for the given mode.
    pub fn levels_for(&self, mode: EvalMode) -> u32 {
        match mode {
            EvalMode::Render => self.render_levels,
            EvalMode::Edit | EvalMode::Viewport => self.levels,
        }
    }

    /// Flags with `SIMPLE_SUBDIV` folded in from `is_simple`.
    pub fn engine_flags(&self) -> SubsurfFlags {
        let mut flags = self.flags;
        flags.set(SubsurfFlags::SIMPLE_SUBDIV, self.is_simple);
        flags
    }
}
