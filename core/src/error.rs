//! Error types for subdivision evaluation.

use thiserror::Error;

/// Errors reported while syncing, refining or materializing a mesh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubsurfError {
    /// A face references a vertex or edge key the engine does not know about.
    #[error("topology inconsistency in face {face}: {reason}")]
    TopologyInconsistency {
        /// Key of the face being synced.
        face: i32,
        /// What was missing.
        reason: String,
    },
    /// The base mesh arrays disagree with each other.
    #[error("invalid base mesh: {0}")]
    InvalidMesh(String),
    /// A required custom-data layer is absent.
    #[error("missing custom data layer: {0}")]
    MissingLayer(String),
}

impl SubsurfError {
    /// Shorthand for a missing-element topology error.
    pub fn topology(face: i32, reason: impl Into<String>) -> Self {
        Self::TopologyInconsistency {
            face,
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SubsurfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SubsurfError::topology(7, "edge 2-3 not synced");
        assert_eq!(
            err.to_string(),
            "topology inconsistency in face 7: edge 2-3 not synced"
        );

        let err = SubsurfError::MissingLayer("uv".to_string());
        assert_eq!(err.to_string(), "missing custom data layer: uv");
    }
}
