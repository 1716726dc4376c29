//! Device capability probing and architecture classification

use std::fmt;

use serde::Serialize;

use crate::backend::GpuRuntime;
use crate::error::{ForgeError, ForgeResult};

/// Compute capability signature of the legacy architecture class (sm_37)
pub const LEGACY_COMPUTE_CAPABILITY: ComputeCapability = ComputeCapability { major: 3, minor: 7 };

/// Compute capability (major, minor) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ComputeCapability {
    pub major: i32,
    pub minor: i32,
}

impl ComputeCapability {
    pub const fn new(major: i32, minor: i32) -> Self {
        ComputeCapability { major, minor }
    }
}

impl fmt::Display for ComputeCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Architecture class a device belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArchitectureClass {
    /// Older generation without tensor cores (compute capability 3.7)
    Legacy,
    /// Anything else
    Standard,
}

impl ArchitectureClass {
    /// Classify a compute capability
    pub fn classify(capability: ComputeCapability) -> Self {
        if capability == LEGACY_COMPUTE_CAPABILITY {
            ArchitectureClass::Legacy
        } else {
            ArchitectureClass::Standard
        }
    }
}

/// Snapshot of one device, taken once per configuration pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceProfile {
    pub device_id: i32,
    pub compute_capability: ComputeCapability,
    pub architecture_class: ArchitectureClass,
    pub free_memory_bytes: u64,
    pub total_memory_bytes: u64,
}

impl DeviceProfile {
    pub fn is_legacy(&self) -> bool {
        self.architecture_class == ArchitectureClass::Legacy
    }
}

/// Query `device_id` and classify its architecture.
///
/// A failed query is fatal for the configuration pass and is not retried.
pub fn probe<R: GpuRuntime + ?Sized>(runtime: &R, device_id: i32) -> ForgeResult<DeviceProfile> {
    let props = runtime
        .device_properties(device_id)
        .map_err(|source| {
            tracing::error!("probe: device {} query failed: {}", device_id, source);
            ForgeError::DeviceQuery { device_id, source }
        })?;

    let compute_capability = ComputeCapability::new(props.major, props.minor);
    let architecture_class = ArchitectureClass::classify(compute_capability);

    tracing::debug!(
        "probe: device {} compute capability {} ({:?}), {} MB free / {} MB total",
        device_id,
        compute_capability,
        architecture_class,
        props.free_memory_bytes / 1024 / 1024,
        props.total_memory_bytes / 1024 / 1024
    );

    Ok(DeviceProfile {
        device_id,
        compute_capability,
        architecture_class,
        free_memory_bytes: props.free_memory_bytes,
        total_memory_bytes: props.total_memory_bytes,
    })
}
