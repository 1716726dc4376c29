//! Per-device configuration context
//!
//! [`DeviceContext::initialize`] runs probe, compatibility gate, environment
//! validation, policy build and apply once for one device and keeps the
//! results. There is no process-wide instance: callers own their context.

use std::sync::Arc;

use super::apply::apply;
use super::compat::{check, CompatibilityVerdict, RuntimeVersion};
use super::policy::{build, ConfigurationPolicy};
use super::probe::{probe, DeviceProfile};
use super::validator::{EnvironmentValidator, ValidationReport};
use crate::backend::GpuRuntime;
use crate::config::ForgeConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::memory::MemoryPool;

/// Configured device and the decisions that led to its policy
pub struct DeviceContext<R: GpuRuntime> {
    runtime: Arc<R>,
    profile: DeviceProfile,
    runtime_version: RuntimeVersion,
    verdict: CompatibilityVerdict,
    validation: ValidationReport,
    policy: ConfigurationPolicy,
}

impl<R: GpuRuntime> DeviceContext<R> {
    /// Select `config.device_id`, derive its policy and apply it
    ///
    /// # Errors
    /// - `DeviceQuery` if the device or runtime version cannot be queried
    /// - `EnvironmentRejected` if a legacy device fails validation and
    ///   `strict_environment` is set
    /// - `Configuration` if the runtime rejects a device setting
    pub fn initialize(runtime: Arc<R>, config: &ForgeConfig) -> ForgeResult<Self> {
        config.validate()?;
        let device_id = config.device_id;

        runtime
            .set_device(device_id)
            .map_err(|source| ForgeError::DeviceQuery { device_id, source })?;

        let profile = probe(runtime.as_ref(), device_id)?;

        let raw_version = runtime
            .runtime_version()
            .map_err(|source| ForgeError::DeviceQuery { device_id, source })?;
        let runtime_version = RuntimeVersion::from_raw(raw_version);
        let verdict = check(profile.architecture_class, runtime_version);

        let validation = EnvironmentValidator::new()
            .with_min_free_memory_bytes(config.min_free_memory_bytes)
            .validate(runtime.as_ref());
        // The free-memory floor only gates the legacy class
        if !validation.passed() && profile.is_legacy() {
            let diagnostic = validation.diagnostic().unwrap_or("unknown").to_string();
            if config.strict_environment {
                tracing::error!(
                    "device {}: environment rejected in strict mode: {}",
                    device_id,
                    diagnostic
                );
                return Err(ForgeError::EnvironmentRejected {
                    device_id,
                    diagnostic,
                });
            }
            tracing::warn!(
                "device {}: continuing with degraded configuration: {}",
                device_id,
                diagnostic
            );
        }

        let policy = build(&profile, &verdict, validation.passed());
        apply(runtime.as_ref(), &policy)?;

        tracing::info!(
            "device {} ready: compute {} ({:?}), runtime {}, fused attention {}, fused matmul {}, usable memory {} MB",
            device_id,
            profile.compute_capability,
            profile.architecture_class,
            runtime_version,
            if policy.disable_fused_attention { "off" } else { "on" },
            if policy.disable_fused_matmul { "off" } else { "on" },
            policy.usable_memory_bytes / 1024 / 1024
        );

        Ok(DeviceContext {
            runtime,
            profile,
            runtime_version,
            verdict,
            validation,
            policy,
        })
    }

    /// Memory pool bounded by the policy's usable memory
    pub fn create_pool(&self) -> MemoryPool<R> {
        let limit = usize::try_from(self.policy.usable_memory_bytes).unwrap_or(usize::MAX);
        MemoryPool::with_limit(Arc::clone(&self.runtime), limit)
    }

    /// Re-apply the stored policy (settings are absolute)
    pub fn reapply(&self) -> ForgeResult<()> {
        apply(self.runtime.as_ref(), &self.policy)
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn device_id(&self) -> i32 {
        self.profile.device_id
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn runtime_version(&self) -> RuntimeVersion {
        self.runtime_version
    }

    pub fn verdict(&self) -> &CompatibilityVerdict {
        &self.verdict
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    pub fn policy(&self) -> &ConfigurationPolicy {
        &self.policy
    }
}

impl<R: GpuRuntime> std::fmt::Debug for DeviceContext<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("profile", &self.profile)
            .field("runtime_version", &self.runtime_version)
            .field("verdict", &self.verdict)
            .field("validation", &self.validation)
            .field("policy", &self.policy)
            .finish()
    }
}
