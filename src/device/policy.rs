//! Device configuration policy
//!
//! [`build`] is a pure function of the device profile, the compatibility
//! verdict and the free-memory check. It never talks to the runtime; the
//! result is handed to [`super::apply::apply`].

use serde::Serialize;

use super::compat::CompatibilityVerdict;
use super::probe::DeviceProfile;
use crate::backend::{CachePreference, DeviceFlags, SharedMemoryBankWidth};

/// Memory cap for a validated legacy device (12 GiB boards keep 1 GiB headroom)
pub const LEGACY_USABLE_MEMORY_BYTES: u64 = 11 * 1024 * 1024 * 1024;

/// Maximum L2 fetch granularity for a validated legacy device
pub const LEGACY_L2_FETCH_GRANULARITY_BYTES: usize = 128 * 1024;

/// Prefetch queue depth for a validated legacy device
pub const LEGACY_PREFETCH_QUEUE_DEPTH: usize = 8;

/// Device flags for a validated legacy device
pub const LEGACY_DEVICE_FLAGS: DeviceFlags = DeviceFlags::from_bits(
    DeviceFlags::MAP_HOST.bits()
        | DeviceFlags::SCHEDULE_SPIN.bits()
        | DeviceFlags::LMEM_RESIZE_TO_MAX.bits(),
);

/// Which fused paths and device settings to use.
///
/// `l2_fetch_granularity_bytes == 0`, `prefetch_queue_depth == 0` and an
/// empty `device_flags` all mean "leave the runtime default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationPolicy {
    pub disable_fused_matmul: bool,
    pub disable_fused_attention: bool,
    pub usable_memory_bytes: u64,
    pub cache_preference: CachePreference,
    pub shared_memory_bank_width: SharedMemoryBankWidth,
    pub l2_fetch_granularity_bytes: usize,
    pub prefetch_queue_depth: usize,
    pub device_flags: DeviceFlags,
}

impl ConfigurationPolicy {
    /// Conservative policy: runtime defaults everywhere, all fused paths on
    pub fn conservative(total_memory_bytes: u64) -> Self {
        ConfigurationPolicy {
            disable_fused_matmul: false,
            disable_fused_attention: false,
            usable_memory_bytes: total_memory_bytes,
            cache_preference: CachePreference::default(),
            shared_memory_bank_width: SharedMemoryBankWidth::default(),
            l2_fetch_granularity_bytes: 0,
            prefetch_queue_depth: 0,
            device_flags: DeviceFlags::empty(),
        }
    }

    /// Whether any device setting differs from the runtime default
    pub fn has_device_settings(&self) -> bool {
        self.cache_preference != CachePreference::default()
            || self.shared_memory_bank_width != SharedMemoryBankWidth::default()
            || self.l2_fetch_granularity_bytes != 0
            || self.prefetch_queue_depth != 0
            || !self.device_flags.is_empty()
    }

    /// JSON rendering for diagnostics
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

/// Derive the configuration policy for one device
pub fn build(
    profile: &DeviceProfile,
    verdict: &CompatibilityVerdict,
    free_memory_ok: bool,
) -> ConfigurationPolicy {
    let mut policy = ConfigurationPolicy::conservative(profile.total_memory_bytes);

    if !profile.is_legacy() {
        return policy;
    }

    if !verdict.is_compatible {
        policy.disable_fused_matmul = true;
        policy.disable_fused_attention = true;
        return policy;
    }

    // No tensor cores: the fused attention kernel is never worth it here
    policy.disable_fused_attention = true;
    policy.usable_memory_bytes = LEGACY_USABLE_MEMORY_BYTES;

    if free_memory_ok {
        policy.cache_preference = CachePreference::PreferShared;
        policy.shared_memory_bank_width = SharedMemoryBankWidth::EightByte;
        policy.l2_fetch_granularity_bytes = LEGACY_L2_FETCH_GRANULARITY_BYTES;
        policy.prefetch_queue_depth = LEGACY_PREFETCH_QUEUE_DEPTH;
        policy.device_flags = LEGACY_DEVICE_FLAGS;
    }

    policy
}
