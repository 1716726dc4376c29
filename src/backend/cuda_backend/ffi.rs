//! CUDA runtime FFI bindings
//!
//! Only the handful of `cudart` entry points the device pipeline and the
//! memory pool use. Enum-typed parameters are passed as their C `int` values.

use std::ffi::{c_char, c_int, c_uint, c_void};

#[link(name = "cudart")]
#[allow(dead_code)]
extern "C" {
    pub fn cudaGetDeviceCount(count: *mut c_int) -> c_int;
    pub fn cudaGetDevice(device: *mut c_int) -> c_int;
    pub fn cudaSetDevice(device: c_int) -> c_int;
    pub fn cudaDeviceGetAttribute(value: *mut c_int, attr: c_int, device: c_int) -> c_int;
    pub fn cudaRuntimeGetVersion(version: *mut c_int) -> c_int;
    pub fn cudaMemGetInfo(free: *mut usize, total: *mut usize) -> c_int;
    pub fn cudaMalloc(ptr: *mut *mut c_void, size: usize) -> c_int;
    pub fn cudaFree(ptr: *mut c_void) -> c_int;
    pub fn cudaDeviceSetCacheConfig(config: c_int) -> c_int;
    pub fn cudaDeviceSetSharedMemConfig(config: c_int) -> c_int;
    pub fn cudaDeviceSetLimit(limit: c_int, value: usize) -> c_int;
    pub fn cudaSetDeviceFlags(flags: c_uint) -> c_int;
    pub fn cudaGetLastError() -> c_int;
    pub fn cudaGetErrorString(error: c_int) -> *const c_char;
}

/// CUDA success code
pub const CUDA_SUCCESS: c_int = 0;

// cudaDeviceAttr
pub const CUDA_DEV_ATTR_COMPUTE_CAPABILITY_MAJOR: c_int = 75;
pub const CUDA_DEV_ATTR_COMPUTE_CAPABILITY_MINOR: c_int = 76;

// cudaFuncCache
pub const CUDA_FUNC_CACHE_PREFER_SHARED: c_int = 1;
pub const CUDA_FUNC_CACHE_PREFER_L1: c_int = 2;

// cudaSharedMemConfig
pub const CUDA_SHARED_MEM_BANK_SIZE_FOUR_BYTE: c_int = 1;
pub const CUDA_SHARED_MEM_BANK_SIZE_EIGHT_BYTE: c_int = 2;

// cudaLimit
pub const CUDA_LIMIT_MAX_L2_FETCH_GRANULARITY: c_int = 0x05;
