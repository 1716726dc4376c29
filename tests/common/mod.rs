//! Shared fixtures for integration tests
//!
//! Mock runtimes cover the device pipeline and pool without hardware. With
//! the `cuda` feature, `GPU_FIXTURE` holds a single shared [`CudaRuntime`]
//! that is `None` when no device is visible, so hardware tests skip instead
//! of failing. Hardware tests must run `#[serial]`.

#![allow(dead_code)]

use std::sync::Arc;

use keplerforge::backend::DeviceProperties;
use keplerforge::MockRuntime;
pub use serial_test::serial;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Raw runtime version of the newest runtime legacy devices support
pub const RUNTIME_11_4: i32 = 11040;

/// Single legacy device on runtime 11.4 with 11 GiB free
pub fn legacy_runtime() -> Arc<MockRuntime> {
    Arc::new(MockRuntime::new())
}

/// Single legacy device on the given raw runtime version
pub fn legacy_runtime_on(raw_version: i32) -> Arc<MockRuntime> {
    Arc::new(MockRuntime::new().with_runtime_version(raw_version))
}

/// Single legacy device with `free_bytes` of free memory
pub fn legacy_runtime_with_free(free_bytes: u64) -> Arc<MockRuntime> {
    Arc::new(MockRuntime::new().with_free_memory(free_bytes))
}

/// Device 0 legacy, device 1 a modern 8.6 part
pub fn mixed_runtime() -> Arc<MockRuntime> {
    Arc::new(MockRuntime::with_devices(vec![
        MockRuntime::legacy_device(),
        MockRuntime::standard_device(8, 6),
    ]))
}

/// Legacy-sized device with an arbitrary compute capability
pub fn device_with_capability(major: i32, minor: i32) -> DeviceProperties {
    DeviceProperties {
        major,
        minor,
        ..MockRuntime::legacy_device()
    }
}

#[cfg(feature = "cuda")]
pub use hardware::{GpuTestFixture, GPU_FIXTURE};

#[cfg(feature = "cuda")]
mod hardware {
    use super::*;
    use keplerforge::{CudaRuntime, GpuRuntime};
    use once_cell::sync::Lazy;

    /// Shared hardware runtime, `None` without a usable CUDA device
    pub static GPU_FIXTURE: Lazy<Option<GpuTestFixture>> = Lazy::new(|| {
        if !CudaRuntime::gpu_available() {
            eprintln!("WARNING: no CUDA device visible - skipping hardware tests");
            return None;
        }
        match CudaRuntime::new() {
            Ok(runtime) => Some(GpuTestFixture::new(runtime)),
            Err(e) => {
                eprintln!("WARNING: CUDA runtime unavailable ({}) - skipping hardware tests", e);
                None
            }
        }
    });

    pub struct GpuTestFixture {
        runtime: Arc<CudaRuntime>,
        initial_free_bytes: u64,
    }

    impl GpuTestFixture {
        fn new(runtime: CudaRuntime) -> Self {
            let initial_free_bytes = runtime.memory_info().map(|m| m.free_bytes).unwrap_or(0);
            GpuTestFixture {
                runtime: Arc::new(runtime),
                initial_free_bytes,
            }
        }

        pub fn runtime(&self) -> Arc<CudaRuntime> {
            Arc::clone(&self.runtime)
        }

        /// Fail if free memory dropped more than `tolerance_percent` since start
        pub fn assert_no_leak(&self, tolerance_percent: u64) {
            let free = self
                .runtime
                .memory_info()
                .map(|m| m.free_bytes)
                .unwrap_or(0);
            let leaked = self.initial_free_bytes.saturating_sub(free);
            let tolerance = self.initial_free_bytes * tolerance_percent / 100;
            assert!(
                leaked <= tolerance,
                "device memory leak: {} MB not returned",
                leaked / 1024 / 1024
            );
        }
    }
}
