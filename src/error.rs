//! Graphics error types.

use std::fmt;

/// Errors that can occur in the graphics system.
///
/// Configuration mistakes on the hot path (unknown parameter names, size
/// mismatches) are deliberately *not* errors: they are logged and skipped so
/// a missing uniform degrades rendering instead of aborting the frame.
/// Everything in this enum is a hard failure the caller must handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    InitializationFailed(String),
    /// Failed to create or allocate a GPU resource.
    ResourceCreationFailed(String),
    /// A requested feature is not supported by the active backend.
    FeatureNotSupported(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// A single staging request was larger than the whole uniform ring.
    ///
    /// This is a fatal misconfiguration: the ring never grows, so no amount
    /// of retrying can satisfy the request.
    RingCapacityExceeded {
        /// Requested allocation size in bytes, after alignment.
        requested: u64,
        /// Total ring capacity in bytes.
        capacity: u64,
    },
    /// An internal error occurred.
    Internal(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::RingCapacityExceeded {
                requested,
                capacity,
            } => write!(
                f,
                "uniform ring capacity exceeded: requested {requested} bytes of {capacity}"
            ),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::RingCapacityExceeded {
            requested: 64,
            capacity: 32,
        };
        assert_eq!(
            err.to_string(),
            "uniform ring capacity exceeded: requested 64 bytes of 32"
        );
    }
}
