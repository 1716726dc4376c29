//! keplerforge - legacy GPU device adaptation
//!
//! Detects Kepler-class (compute capability 3.7) accelerators, gates them
//! against the runtime versions and free memory they need, derives and
//! applies a device configuration policy, and pools device memory.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keplerforge::{DeviceContext, ForgeConfig, MockRuntime};
//!
//! keplerforge::logging::init_logging_default();
//! let ctx = DeviceContext::initialize(Arc::new(MockRuntime::new()), &ForgeConfig::from_env()?)?;
//! let mut pool = ctx.create_pool();
//! let buf = pool.allocate(4096)?;
//! ```

#![allow(clippy::missing_safety_doc)] // FFI bindings documented at module level

pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod memory;

#[cfg(feature = "cuda")]
pub use backend::CudaRuntime;
pub use backend::{GpuRuntime, MockRuntime, RuntimeError};
pub use config::ForgeConfig;
pub use device::{
    ArchitectureClass, CompatibilityVerdict, ConfigurationPolicy, DeviceContext, DeviceProfile,
    EnvironmentValidator, RuntimeVersion,
};
pub use error::{ErrorCategory, ForgeError, ForgeResult};
pub use memory::{MemoryPool, PoolStats};
