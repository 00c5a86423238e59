//! Backend error types.

/// Errors that can occur in backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// A buffer could not be mapped for CPU access.
    MapFailed(String),
    /// The handle does not belong to this backend.
    UnknownBuffer(u64),
    /// Invalid parameter.
    InvalidParameter(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::MapFailed(msg) => write!(f, "buffer map failed: {msg}"),
            Self::UnknownBuffer(id) => write!(f, "unknown buffer {id}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}
