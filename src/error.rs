//! Unified error handling for keplerforge
//!
//! Runtime-level failures are fatal and surface as [`ForgeError`]:
//! - Device errors (a property or version query failed)
//! - Configuration errors (the runtime rejected a device setting)
//! - Memory errors (allocation or release failed)
//! - User errors (bad configuration values)
//!
//! Capability mismatches are not errors. The compatibility verdict and the
//! environment validation report are advisory values that degrade the
//! device policy instead.

use std::fmt;

use crate::backend::error::RuntimeError;
use crate::device::apply::ConfigStep;

/// Unified error type for keplerforge
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    // ========== Device Errors ==========
    /// A device property or runtime query failed; the device is unusable
    #[error("Device query failed for device {device_id}: {source}")]
    DeviceQuery {
        device_id: i32,
        #[source]
        source: RuntimeError,
    },

    /// Environment validation failed and strict mode forbids degrading
    #[error("Environment rejected for device {device_id}: {diagnostic}")]
    EnvironmentRejected { device_id: i32, diagnostic: String },

    // ========== Configuration Errors ==========
    /// The runtime rejected a device setting; later steps were not applied
    #[error("Device configuration failed at step '{step}': {source}")]
    Configuration {
        step: ConfigStep,
        #[source]
        source: RuntimeError,
    },

    // ========== Memory Errors ==========
    /// Device memory allocation failed
    #[error("Device memory allocation failed: {0}")]
    Allocation(String),

    /// Device memory release failed during pool teardown
    #[error("Device memory release failed: {0}")]
    Deallocation(String),

    // ========== User Errors ==========
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ForgeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            ForgeError::DeviceQuery { .. } | ForgeError::EnvironmentRejected { .. } => {
                ErrorCategory::Device
            }
            ForgeError::Configuration { .. } => ErrorCategory::Configuration,
            ForgeError::Allocation(_) | ForgeError::Deallocation(_) => ErrorCategory::Memory,
            ForgeError::InvalidConfiguration(_) => ErrorCategory::User,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only allocation failures qualify: the pool stays valid, so the caller
    /// may release buffers and retry. Everything else means the device (or
    /// the configuration) is unusable as-is.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ForgeError::Allocation(_))
    }

    /// Check if this is a user-facing error (actionable by users)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Configuration step that failed, if this is a configuration error
    pub fn failed_step(&self) -> Option<ConfigStep> {
        match self {
            ForgeError::Configuration { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Device query or environment failure
    Device,
    /// Device setting rejected by the runtime
    Configuration,
    /// Device memory failure
    Memory,
    /// Invalid input or configuration
    User,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Memory => write!(f, "Memory"),
            ErrorCategory::User => write!(f, "User"),
        }
    }
}

/// Helper type alias for Results using ForgeError
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;
