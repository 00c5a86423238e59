//! Strongly typed handles into the subdivision engine's element arenas.
//!
//! The engine owns its vertices, edges and faces in flat arrays; handles are
//! plain indices into those arrays, one type per element kind so a face
//! handle can never be used to look up an edge.

use std::fmt;

/// Sentinel stored in place of an original index for purely synthetic
/// elements.
pub const ORIGINDEX_NONE: i32 = -1;

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Create a handle from an arena index.
            #[inline]
            pub const fn new(index: usize) -> Self {
                Self(index as u32)
            }

            /// Arena index of this handle.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_handle!(
    /// Handle to an engine vertex.
    VertexId,
    "v"
);
define_handle!(
    /// Handle to an engine edge.
    EdgeId,
    "e"
);
define_handle!(
    /// Handle to an engine face.
    FaceId,
    "f"
);

/// Per-element bookkeeping stashed by the materializer.
///
/// `start` is the first flattened index owned by the element, `orig` the
/// base-mesh index it maps back to (or [`ORIGINDEX_NONE`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserData {
    pub start: i32,
    pub orig: i32,
    /// Sync generation of the last data change; only tracked with aging.
    pub age: Option<u32>,
}

impl UserData {
    pub const fn new(orig: i32) -> Self {
        Self {
            start: -1,
            orig,
            age: None,
        }
    }
}

impl Default for UserData {
    fn default() -> Self {
        Self::new(ORIGINDEX_NONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_roundtrip_and_debug() {
        let f = FaceId::new(12);
        assert_eq!(f.index(), 12);
        assert_eq!(format!("{f:?}"), "f12");
        assert_eq!(format!("{:?}", EdgeId::new(3)), "e3");
    }

    #[test]
    fn test_user_data_default() {
        let ud = UserData::default();
        assert_eq!(ud.orig, ORIGINDEX_NONE);
        assert_eq!(ud.start, -1);
        assert!(ud.age.is_none());
    }
}
