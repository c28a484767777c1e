//! Error types for the native module boundary.

/// Result type for calls into the host.
pub type AbiResult<T> = Result<T, NativeError>;

/// Errors reported across the native module boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NativeError {
    /// Type mismatch during value conversion.
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name.
        expected: String,
        /// Actual type name.
        got: String,
    },

    /// Invalid argument.
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// Module-level error.
    #[error("Module error: {0}")]
    ModuleError(String),

    /// A host operation failed (allocation, stale handle, closed engine).
    #[error("{0}")]
    HostError(String),
}

impl From<String> for NativeError {
    fn from(s: String) -> Self {
        NativeError::HostError(s)
    }
}

impl From<&str> for NativeError {
    fn from(s: &str) -> Self {
        NativeError::HostError(s.to_string())
    }
}
