//! Draw-buffer error types.

use std::fmt;

use crate::backend::BackendError;
use crate::types::BufferKind;

/// Errors that can occur while packing or uploading draw buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    /// No buffer could be obtained, from the device or from host memory.
    AllocationFailed { size: usize },
    /// A device buffer could not be mapped for writing.
    MapFailed(String),
    /// The mesh lacks the loop layer a buffer kind is built from.
    MissingLayer(BufferKind),
    /// An invalid parameter was provided.
    InvalidParameter(String),
}

impl fmt::Display for DrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationFailed { size } => write!(f, "failed to allocate a {size} byte buffer"),
            Self::MapFailed(msg) => write!(f, "buffer mapping failed: {msg}"),
            Self::MissingLayer(kind) => write!(f, "mesh has no layer for {kind:?} buffers"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for DrawError {}

impl From<BackendError> for DrawError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::MapFailed(msg) => Self::MapFailed(msg),
            other => Self::MapFailed(other.to_string()),
        }
    }
}
