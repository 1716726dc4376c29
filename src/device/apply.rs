//! Push a [`ConfigurationPolicy`] onto the device
//!
//! Steps run in a fixed order and stop at the first rejection. Settings
//! already pushed stay in effect; the caller only sees the failed step.

use std::fmt;

use serde::Serialize;

use super::policy::ConfigurationPolicy;
use crate::backend::{GpuRuntime, LimitKind, RuntimeResult};
use crate::error::{ForgeError, ForgeResult};

/// One device-setting step of [`apply`], in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConfigStep {
    CachePreference,
    SharedMemoryBankWidth,
    L2FetchGranularity,
    PrefetchQueueDepth,
    DeviceFlags,
}

impl ConfigStep {
    /// All steps, in the order [`apply`] runs them
    pub const ORDER: [ConfigStep; 5] = [
        ConfigStep::CachePreference,
        ConfigStep::SharedMemoryBankWidth,
        ConfigStep::L2FetchGranularity,
        ConfigStep::PrefetchQueueDepth,
        ConfigStep::DeviceFlags,
    ];
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigStep::CachePreference => "cache preference",
            ConfigStep::SharedMemoryBankWidth => "shared memory bank width",
            ConfigStep::L2FetchGranularity => "L2 fetch granularity",
            ConfigStep::PrefetchQueueDepth => "prefetch queue depth",
            ConfigStep::DeviceFlags => "device flags",
        };
        write!(f, "{}", name)
    }
}

/// Apply `policy` to the current device of `runtime`
pub fn apply<R: GpuRuntime + ?Sized>(runtime: &R, policy: &ConfigurationPolicy) -> ForgeResult<()> {
    for step in ConfigStep::ORDER {
        let applied = apply_step(runtime, policy, step).map_err(|source| {
            tracing::error!("apply: {} rejected: {}", step, source);
            ForgeError::Configuration { step, source }
        })?;
        if !applied {
            tracing::trace!("apply: {} left at runtime default", step);
        }
    }
    Ok(())
}

/// Returns `Ok(false)` when the step was skipped
fn apply_step<R: GpuRuntime + ?Sized>(
    runtime: &R,
    policy: &ConfigurationPolicy,
    step: ConfigStep,
) -> RuntimeResult<bool> {
    match step {
        ConfigStep::CachePreference => {
            runtime.set_cache_preference(policy.cache_preference)?;
            tracing::info!("apply: cache preference {:?}", policy.cache_preference);
        }
        ConfigStep::SharedMemoryBankWidth => {
            runtime.set_shared_memory_bank_width(policy.shared_memory_bank_width)?;
            tracing::info!(
                "apply: shared memory bank width {} bytes",
                policy.shared_memory_bank_width.bytes()
            );
        }
        ConfigStep::L2FetchGranularity => {
            if policy.l2_fetch_granularity_bytes == 0 {
                return Ok(false);
            }
            runtime.set_limit(LimitKind::L2FetchGranularity, policy.l2_fetch_granularity_bytes)?;
            tracing::info!(
                "apply: L2 fetch granularity {} bytes",
                policy.l2_fetch_granularity_bytes
            );
        }
        ConfigStep::PrefetchQueueDepth => {
            if policy.prefetch_queue_depth == 0 {
                return Ok(false);
            }
            runtime.set_limit(LimitKind::PrefetchQueueDepth, policy.prefetch_queue_depth)?;
            tracing::info!("apply: prefetch queue depth {}", policy.prefetch_queue_depth);
        }
        ConfigStep::DeviceFlags => {
            if policy.device_flags.is_empty() {
                return Ok(false);
            }
            runtime.set_device_flags(policy.device_flags)?;
            tracing::info!("apply: device flags {}", policy.device_flags);
        }
    }
    Ok(true)
}
