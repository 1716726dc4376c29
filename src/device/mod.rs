//! Device capability adaptation for the legacy (compute 3.7) class
//!
//! Pipeline, run once per device before any kernel is dispatched:
//! 1. [`probe`]: query compute capability and memory, classify the device
//! 2. [`check`]: gate the legacy class against the supported runtime window
//! 3. [`EnvironmentValidator`]: make sure enough free memory is available
//! 4. [`build`]: derive a [`ConfigurationPolicy`]
//! 5. [`apply`]: push the policy's settings to the runtime
//!
//! [`DeviceContext`] drives the whole pipeline and keeps its results.

pub mod apply;
pub mod compat;
pub mod context;
pub mod policy;
pub mod probe;
pub mod tuning;
pub mod validator;

pub use apply::{apply, ConfigStep};
pub use compat::{check, CompatibilityVerdict, RuntimeVersion};
pub use context::DeviceContext;
pub use policy::{build, ConfigurationPolicy};
pub use probe::{probe, ArchitectureClass, ComputeCapability, DeviceProfile};
pub use validator::{EnvironmentValidator, ValidationReport};
