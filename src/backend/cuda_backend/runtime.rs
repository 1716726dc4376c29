//! [`GpuRuntime`] implementation over the CUDA runtime API

use std::ffi::{c_int, c_void, CStr};
use std::ptr;

use super::ffi;
use crate::backend::error::{RuntimeError, RuntimeResult};
use crate::backend::runtime::{
    CachePreference, DeviceFlags, DeviceProperties, DevicePtr, GpuRuntime, LimitKind, MemoryInfo,
    SharedMemoryBankWidth,
};

/// Get CUDA error string from error code
pub fn get_error_string(error: c_int) -> String {
    unsafe {
        let error_ptr = ffi::cudaGetErrorString(error);
        if error_ptr.is_null() {
            "Unknown error".to_string()
        } else {
            CStr::from_ptr(error_ptr).to_string_lossy().into_owned()
        }
    }
}

fn check(code: c_int, call: &str) -> RuntimeResult<()> {
    if code == ffi::CUDA_SUCCESS {
        return Ok(());
    }
    // Clear the sticky per-thread error so the next call starts clean
    unsafe {
        ffi::cudaGetLastError();
    }
    Err(RuntimeError::new(
        code,
        format!("{} failed: {}", call, get_error_string(code)),
    ))
}

/// CUDA runtime handle.
///
/// Stateless: the CUDA runtime keeps the current device per thread, so this
/// type only exists to route [`GpuRuntime`] calls into `cudart`.
///
/// # Prefetch Queue Depth
///
/// `cudaLimit` has no prefetch queue entry, so
/// [`LimitKind::PrefetchQueueDepth`] is rejected with
/// [`RUNTIME_ERROR_NOT_SUPPORTED`](crate::backend::error::RUNTIME_ERROR_NOT_SUPPORTED).
/// A legacy device that passes every check gets a nonzero depth in its
/// policy, so `DeviceContext::initialize` on that device fails with
/// `ForgeError::Configuration` at the `prefetch queue depth` step. Cache
/// preference, bank width and L2 granularity are already applied by then;
/// device flags are not.
#[derive(Debug, Default)]
pub struct CudaRuntime {
    _private: (),
}

impl CudaRuntime {
    /// Create a runtime handle, failing if no CUDA device is visible
    pub fn new() -> RuntimeResult<Self> {
        let runtime = CudaRuntime { _private: () };
        let count = runtime.device_count()?;
        if count == 0 {
            return Err(RuntimeError::new(
                100,
                "no CUDA-capable device is detected",
            ));
        }
        tracing::debug!("CudaRuntime: {} device(s) visible", count);
        Ok(runtime)
    }

    /// Check if at least one CUDA device is usable (for test skipping)
    pub fn gpu_available() -> bool {
        let mut count: c_int = 0;
        let result = unsafe { ffi::cudaGetDeviceCount(&mut count) };
        result == ffi::CUDA_SUCCESS && count > 0
    }

    fn attribute(&self, attr: c_int, device_id: i32) -> RuntimeResult<i32> {
        let mut value: c_int = 0;
        let result = unsafe { ffi::cudaDeviceGetAttribute(&mut value, attr, device_id) };
        check(result, "cudaDeviceGetAttribute")?;
        Ok(value)
    }

    fn current_device(&self) -> RuntimeResult<i32> {
        let mut device: c_int = -1;
        let result = unsafe { ffi::cudaGetDevice(&mut device) };
        check(result, "cudaGetDevice")?;
        Ok(device)
    }
}

impl GpuRuntime for CudaRuntime {
    fn device_count(&self) -> RuntimeResult<i32> {
        let mut count: c_int = 0;
        let result = unsafe { ffi::cudaGetDeviceCount(&mut count) };
        check(result, "cudaGetDeviceCount")?;
        Ok(count)
    }

    fn device_properties(&self, device_id: i32) -> RuntimeResult<DeviceProperties> {
        let major = self.attribute(ffi::CUDA_DEV_ATTR_COMPUTE_CAPABILITY_MAJOR, device_id)?;
        let minor = self.attribute(ffi::CUDA_DEV_ATTR_COMPUTE_CAPABILITY_MINOR, device_id)?;

        // cudaMemGetInfo reports on the current device only
        let previous = self.current_device()?;
        if previous != device_id {
            self.set_device(device_id)?;
        }
        let info = self.memory_info();
        if previous != device_id {
            self.set_device(previous)?;
        }
        let info = info?;

        Ok(DeviceProperties {
            major,
            minor,
            free_memory_bytes: info.free_bytes,
            total_memory_bytes: info.total_bytes,
        })
    }

    fn runtime_version(&self) -> RuntimeResult<i32> {
        let mut version: c_int = 0;
        let result = unsafe { ffi::cudaRuntimeGetVersion(&mut version) };
        check(result, "cudaRuntimeGetVersion")?;
        Ok(version)
    }

    fn set_device(&self, device_id: i32) -> RuntimeResult<()> {
        let result = unsafe { ffi::cudaSetDevice(device_id) };
        check(result, "cudaSetDevice")
    }

    fn memory_info(&self) -> RuntimeResult<MemoryInfo> {
        let mut free: usize = 0;
        let mut total: usize = 0;
        let result = unsafe { ffi::cudaMemGetInfo(&mut free, &mut total) };
        check(result, "cudaMemGetInfo")?;
        Ok(MemoryInfo {
            free_bytes: free as u64,
            total_bytes: total as u64,
        })
    }

    fn malloc(&self, size: usize) -> RuntimeResult<DevicePtr> {
        let mut raw: *mut c_void = ptr::null_mut();
        let result = unsafe { ffi::cudaMalloc(&mut raw, size) };
        check(result, "cudaMalloc")?;
        if raw.is_null() {
            return Err(RuntimeError::new(
                crate::backend::error::RUNTIME_ERROR_MEMORY_ALLOCATION,
                format!("cudaMalloc returned null pointer for {} bytes", size),
            ));
        }
        Ok(DevicePtr::from_raw(raw))
    }

    fn free(&self, ptr: DevicePtr) -> RuntimeResult<()> {
        let result = unsafe { ffi::cudaFree(ptr.as_raw()) };
        check(result, "cudaFree")
    }

    fn set_cache_preference(&self, preference: CachePreference) -> RuntimeResult<()> {
        let config = match preference {
            CachePreference::PreferL1 => ffi::CUDA_FUNC_CACHE_PREFER_L1,
            CachePreference::PreferShared => ffi::CUDA_FUNC_CACHE_PREFER_SHARED,
        };
        let result = unsafe { ffi::cudaDeviceSetCacheConfig(config) };
        check(result, "cudaDeviceSetCacheConfig")
    }

    fn set_shared_memory_bank_width(&self, width: SharedMemoryBankWidth) -> RuntimeResult<()> {
        let config = match width {
            SharedMemoryBankWidth::FourByte => ffi::CUDA_SHARED_MEM_BANK_SIZE_FOUR_BYTE,
            SharedMemoryBankWidth::EightByte => ffi::CUDA_SHARED_MEM_BANK_SIZE_EIGHT_BYTE,
        };
        let result = unsafe { ffi::cudaDeviceSetSharedMemConfig(config) };
        check(result, "cudaDeviceSetSharedMemConfig")
    }

    fn set_limit(&self, kind: LimitKind, value: usize) -> RuntimeResult<()> {
        let limit = match kind {
            LimitKind::L2FetchGranularity => ffi::CUDA_LIMIT_MAX_L2_FETCH_GRANULARITY,
            // cudaLimit has no prefetch queue entry
            LimitKind::PrefetchQueueDepth => {
                return Err(RuntimeError::not_supported(format!(
                    "cudaDeviceSetLimit has no limit for {}",
                    kind
                )));
            }
        };
        let result = unsafe { ffi::cudaDeviceSetLimit(limit, value) };
        check(result, "cudaDeviceSetLimit")
    }

    fn set_device_flags(&self, flags: DeviceFlags) -> RuntimeResult<()> {
        let result = unsafe { ffi::cudaSetDeviceFlags(flags.bits()) };
        check(result, "cudaSetDeviceFlags")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::error::RUNTIME_ERROR_NOT_SUPPORTED;

    #[test]
    fn test_prefetch_queue_depth_is_not_supported() {
        let runtime = CudaRuntime::default();
        let err = runtime
            .set_limit(LimitKind::PrefetchQueueDepth, 8)
            .unwrap_err();
        assert_eq!(err.code, RUNTIME_ERROR_NOT_SUPPORTED);
        assert!(err.to_string().contains("prefetch"), "{}", err);
    }
}
