//! Reusable scratch storage.
//!
//! [`Scratch<T>`] keeps a working value between uses. Releasing it clears the
//! contents but keeps allocated capacity, so per-face working lists in the
//! materializer stop reallocating once they have grown to the largest valence
//! seen.
//!
//! # Example
//!
//! ```
//! use subsurf_core::scratch::{Reusable, Scratch};
//!
//! #[derive(Debug, Default)]
//! struct Indices {
//!     data: Vec<u32>,
//! }
//!
//! impl Reusable for Indices {
//!     fn new_empty() -> Self {
//!         Self::default()
//!     }
//!     fn reset(&mut self) {
//!         self.data.clear();
//!     }
//! }
//!
//! let mut scratch = Scratch::<Indices>::default();
//! scratch.activate().data.extend_from_slice(&[1, 2, 3]);
//! scratch.release();
//! assert!(scratch.is_idle());
//! assert!(scratch.inner().data.capacity() >= 3);
//! ```

/// Types that can be cleared while keeping their allocations.
pub trait Reusable {
    /// Create a new empty instance.
    fn new_empty() -> Self;

    /// Reset to an empty state, preserving allocated capacity.
    fn reset(&mut self);
}

/// Working storage that is either in use or idle with retained capacity.
#[derive(Debug)]
pub enum Scratch<T: Reusable> {
    /// Holds live data.
    Active(T),
    /// Cleared, allocation kept for the next use.
    Idle(T),
}

impl<T: Reusable> Scratch<T> {
    /// Whether the scratch currently holds live data.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Whether the scratch is cleared and waiting for reuse.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle(_))
    }

    /// Clear the contents and mark the scratch idle. No-op when idle.
    pub fn release(&mut self) {
        if self.is_active() {
            let taken = std::mem::replace(self, Self::Idle(T::new_empty()));
            if let Self::Active(mut value) = taken {
                value.reset();
                *self = Self::Idle(value);
            }
        }
    }

    /// Mark the scratch active and hand out the (cleared) value.
    ///
    /// Activating an active scratch resets it first, so every caller starts
    /// from empty storage.
    pub fn activate(&mut self) -> &mut T {
        self.release();
        let taken = std::mem::replace(self, Self::Active(T::new_empty()));
        let value = match taken {
            Self::Active(value) | Self::Idle(value) => value,
        };
        *self = Self::Active(value);
        self.inner_mut()
    }

    /// Inner value regardless of state.
    pub fn inner(&self) -> &T {
        match self {
            Self::Active(value) | Self::Idle(value) => value,
        }
    }

    fn inner_mut(&mut self) -> &mut T {
        match self {
            Self::Active(value) | Self::Idle(value) => value,
        }
    }
}

impl<T: Reusable> Default for Scratch<T> {
    fn default() -> Self {
        Self::Idle(T::new_empty())
    }
}

/// Per-face working lists used while materializing one base polygon.
#[derive(Debug, Default)]
pub struct FaceScratch {
    /// Base vertex indices of the face, in corner order.
    pub verts: Vec<usize>,
    /// Base loop indices of the face, in corner order.
    pub loops: Vec<usize>,
    /// Engine vertex handles, in corner order.
    pub handles: Vec<crate::handle::VertexId>,
}

impl Reusable for FaceScratch {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.verts.clear();
        self.loops.clear();
        self.handles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_keeps_capacity() {
        let mut scratch = Scratch::<FaceScratch>::default();
        assert!(scratch.is_idle());

        let face = scratch.activate();
        face.verts.extend(0..64);
        assert!(scratch.is_active());

        scratch.release();
        assert!(scratch.is_idle());
        assert!(scratch.inner().verts.is_empty());
        assert!(scratch.inner().verts.capacity() >= 64);
    }

    #[test]
    fn test_activate_twice_starts_empty() {
        let mut scratch = Scratch::<FaceScratch>::default();
        scratch.activate().loops.push(4);
        let face = scratch.activate();
        assert!(face.loops.is_empty());
    }
}
