//! Common error types for all transport backends

use thiserror::Error;

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Transport-agnostic backend error type
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Bounded wait elapsed with no data
    #[error("operation timed out")]
    Timeout,

    /// Transport-level I/O failure
    #[error("transport I/O failure: {0}")]
    Io(String),

    /// Failed to open the underlying device
    #[error("failed to open device: {0}")]
    OpenFailed(String),

    /// Operation unavailable on this backend or build
    #[error("operation not supported by this backend")]
    NotSupported,

    /// Invalid argument passed to a backend operation
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl BackendError {
    /// True for the expected "nothing to do this tick" case.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout)
    }
}

#[cfg(feature = "hid")]
impl From<hidapi::HidError> for BackendError {
    fn from(err: hidapi::HidError) -> Self {
        BackendError::Io(err.to_string())
    }
}
