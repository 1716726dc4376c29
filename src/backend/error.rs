//! GPU runtime error types

use thiserror::Error;

/// Error code reported when a runtime does not support a requested setting
/// (matches `cudaErrorNotSupported`)
pub const RUNTIME_ERROR_NOT_SUPPORTED: i32 = 801;

/// Error code used when a runtime cannot be reached at all
/// (matches `cudaErrorInsufficientDriver`)
pub const RUNTIME_ERROR_INSUFFICIENT_DRIVER: i32 = 35;

/// Error code for out-of-memory conditions (matches `cudaErrorMemoryAllocation`)
pub const RUNTIME_ERROR_MEMORY_ALLOCATION: i32 = 2;

/// Error code for an invalid device ordinal (matches `cudaErrorInvalidDevice`)
pub const RUNTIME_ERROR_INVALID_DEVICE: i32 = 101;

/// Error code for an invalid argument (matches `cudaErrorInvalidValue`)
pub const RUNTIME_ERROR_INVALID_VALUE: i32 = 1;

/// A failed call into the underlying GPU runtime.
///
/// Carries the runtime's numeric status code and its own diagnostic text,
/// so callers higher up can report exactly what the driver said.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("runtime error {code}: {message}")]
pub struct RuntimeError {
    /// Runtime status code (non-zero)
    pub code: i32,
    /// Diagnostic text as reported by the runtime
    pub message: String,
}

impl RuntimeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        RuntimeError {
            code,
            message: message.into(),
        }
    }

    /// Setting or limit the runtime has no counterpart for
    pub fn not_supported(what: impl Into<String>) -> Self {
        RuntimeError::new(RUNTIME_ERROR_NOT_SUPPORTED, what)
    }

    /// Check if this is an out-of-memory condition
    pub fn is_out_of_memory(&self) -> bool {
        self.code == RUNTIME_ERROR_MEMORY_ALLOCATION
    }
}

/// Runtime result type
pub type RuntimeResult<T> = Result<T, RuntimeError>;
