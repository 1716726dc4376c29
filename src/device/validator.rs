//! Environment validation before optimized paths are enabled
//!
//! Checks, in order:
//! 1. the runtime answers a version query,
//! 2. free device memory can be queried,
//! 3. free memory is at least the threshold (8 GiB by default).
//!
//! Every failure produces `passed = false` plus a diagnostic; nothing here
//! returns an error. The caller decides whether to degrade or abort.

use serde::Serialize;

use crate::backend::GpuRuntime;

/// Free memory required before optimized legacy paths are enabled
pub const DEFAULT_MIN_FREE_MEMORY_BYTES: u64 = 8 * 1024 * 1024 * 1024;

/// Result of an environment validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    passed: bool,
    diagnostic: Option<String>,
    free_memory_bytes: Option<u64>,
}

impl ValidationReport {
    fn pass(free_memory_bytes: u64) -> Self {
        ValidationReport {
            passed: true,
            diagnostic: None,
            free_memory_bytes: Some(free_memory_bytes),
        }
    }

    fn fail(diagnostic: String, free_memory_bytes: Option<u64>) -> Self {
        tracing::warn!("environment validation failed: {}", diagnostic);
        ValidationReport {
            passed: false,
            diagnostic: Some(diagnostic),
            free_memory_bytes,
        }
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Why validation failed, `None` when it passed
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Free memory observed, if the query succeeded
    pub fn free_memory_bytes(&self) -> Option<u64> {
        self.free_memory_bytes
    }
}

/// Validates runtime availability and free memory of the current device
#[derive(Debug, Clone)]
pub struct EnvironmentValidator {
    min_free_memory_bytes: u64,
}

impl Default for EnvironmentValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentValidator {
    pub fn new() -> Self {
        EnvironmentValidator {
            min_free_memory_bytes: DEFAULT_MIN_FREE_MEMORY_BYTES,
        }
    }

    pub fn with_min_free_memory_bytes(mut self, bytes: u64) -> Self {
        self.min_free_memory_bytes = bytes;
        self
    }

    pub fn min_free_memory_bytes(&self) -> u64 {
        self.min_free_memory_bytes
    }

    pub fn validate<R: GpuRuntime + ?Sized>(&self, runtime: &R) -> ValidationReport {
        if let Err(e) = runtime.runtime_version() {
            return ValidationReport::fail(format!("GPU runtime is not responding: {}", e), None);
        }

        let info = match runtime.memory_info() {
            Ok(info) => info,
            Err(e) => {
                return ValidationReport::fail(
                    format!("free device memory could not be queried: {}", e),
                    None,
                );
            }
        };

        if info.free_bytes < self.min_free_memory_bytes {
            return ValidationReport::fail(
                format!(
                    "only {} MB of device memory free, at least {} MB required",
                    info.free_bytes / 1024 / 1024,
                    self.min_free_memory_bytes / 1024 / 1024
                ),
                Some(info.free_bytes),
            );
        }

        tracing::debug!(
            "environment validated: {} MB free",
            info.free_bytes / 1024 / 1024
        );
        ValidationReport::pass(info.free_bytes)
    }
}
