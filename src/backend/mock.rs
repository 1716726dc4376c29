//! Host-only mock runtime for tests and GPU-less builds.
//!
//! No device memory is touched: allocations hand out fake, never-reused
//! addresses and device settings are recorded in a [`MockDeviceState`].
//! Every settings call is appended to a call log so tests can check the
//! order in which the pipeline talks to the driver.
//!
//! ```rust,ignore
//! use keplerforge::backend::mock::{MockFailure, MockRuntime};
//!
//! let runtime = MockRuntime::new().fail_on(MockFailure::SharedMemoryBankWidth);
//! ```

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::{Mutex, MutexGuard};

use super::error::{
    RuntimeError, RuntimeResult, RUNTIME_ERROR_INSUFFICIENT_DRIVER, RUNTIME_ERROR_INVALID_DEVICE,
    RUNTIME_ERROR_INVALID_VALUE, RUNTIME_ERROR_MEMORY_ALLOCATION,
};
use super::runtime::{
    CachePreference, DeviceFlags, DeviceProperties, DevicePtr, GpuRuntime, LimitKind, MemoryInfo,
    SharedMemoryBankWidth,
};

const GIB: u64 = 1024 * 1024 * 1024;

/// Base of the fake device address space
const FAKE_BASE_ADDR: usize = 0x7f00_0000_0000;

/// Gap between consecutive fake allocations
const FAKE_ADDR_GUARD: usize = 4096;

/// Runtime call that can be forced to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockFailure {
    DeviceQuery,
    RuntimeVersion,
    SetDevice,
    MemoryInfo,
    Malloc,
    Free,
    CachePreference,
    SharedMemoryBankWidth,
    Limit(LimitKind),
    DeviceFlags,
}

/// Runtime call record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    SetDevice(i32),
    SetCachePreference(CachePreference),
    SetSharedMemoryBankWidth(SharedMemoryBankWidth),
    SetLimit(LimitKind, usize),
    SetDeviceFlags(DeviceFlags),
    Malloc(usize),
    Free(DevicePtr),
}

/// Device-level settings as last applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockDeviceState {
    pub cache_preference: Option<CachePreference>,
    pub shared_memory_bank_width: Option<SharedMemoryBankWidth>,
    pub limits: HashMap<LimitKind, usize>,
    pub device_flags: Option<DeviceFlags>,
}

#[derive(Debug)]
struct MockState {
    devices: Vec<DeviceProperties>,
    runtime_version: i32,
    current_device: i32,
    failures: HashSet<MockFailure>,
    device_state: MockDeviceState,
    calls: Vec<RuntimeCall>,
    live: HashMap<DevicePtr, usize>,
    next_addr: usize,
    malloc_count: usize,
    free_count: usize,
}

/// Mock GPU runtime
#[derive(Debug)]
pub struct MockRuntime {
    state: Mutex<MockState>,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    /// One legacy (3.7) device with 12 GiB total / 11 GiB free, runtime 11.4
    pub fn new() -> Self {
        Self::with_devices(vec![Self::legacy_device()])
    }

    /// Mock runtime exposing the given devices
    pub fn with_devices(devices: Vec<DeviceProperties>) -> Self {
        MockRuntime {
            state: Mutex::new(MockState {
                devices,
                runtime_version: 11040,
                current_device: 0,
                failures: HashSet::new(),
                device_state: MockDeviceState::default(),
                calls: Vec::new(),
                live: HashMap::new(),
                next_addr: FAKE_BASE_ADDR,
                malloc_count: 0,
                free_count: 0,
            }),
        }
    }

    /// Properties of a single-GPU legacy board half (3.7, 12 GiB)
    pub fn legacy_device() -> DeviceProperties {
        DeviceProperties {
            major: 3,
            minor: 7,
            free_memory_bytes: 11 * GIB,
            total_memory_bytes: 12 * GIB,
        }
    }

    /// Properties of a modern device with the given capability
    pub fn standard_device(major: i32, minor: i32) -> DeviceProperties {
        DeviceProperties {
            major,
            minor,
            free_memory_bytes: 20 * GIB,
            total_memory_bytes: 24 * GIB,
        }
    }

    /// Set the raw runtime version (`1000 * major + 10 * minor`)
    pub fn with_runtime_version(self, raw: i32) -> Self {
        self.lock().runtime_version = raw;
        self
    }

    /// Override free memory of every device
    pub fn with_free_memory(self, bytes: u64) -> Self {
        for device in self.lock().devices.iter_mut() {
            device.free_memory_bytes = bytes;
        }
        self
    }

    /// Force a runtime call to fail
    pub fn fail_on(self, failure: MockFailure) -> Self {
        self.lock().failures.insert(failure);
        self
    }

    /// Force a runtime call to fail on an already shared runtime
    pub fn inject_failure(&self, failure: MockFailure) {
        self.lock().failures.insert(failure);
    }

    /// Remove a previously injected failure
    pub fn clear_failure(&self, failure: MockFailure) {
        self.lock().failures.remove(&failure);
    }

    /// Every settings/memory call made so far, in order
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Device settings as last applied
    pub fn device_state(&self) -> MockDeviceState {
        self.lock().device_state.clone()
    }

    /// Number of allocations not yet freed
    pub fn live_allocations(&self) -> usize {
        self.lock().live.len()
    }

    /// Bytes held by allocations not yet freed
    pub fn live_bytes(&self) -> usize {
        self.lock().live.values().sum()
    }

    /// Total successful `malloc` calls
    pub fn malloc_count(&self) -> usize {
        self.lock().malloc_count
    }

    /// Total successful `free` calls
    pub fn free_count(&self) -> usize {
        self.lock().free_count
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // Tests that panic while holding the lock must not cascade
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected(state: &MockState, failure: MockFailure, what: &str) -> RuntimeResult<()> {
        if state.failures.contains(&failure) {
            return Err(RuntimeError::new(
                RUNTIME_ERROR_INVALID_VALUE,
                format!("injected failure: {}", what),
            ));
        }
        Ok(())
    }
}

impl GpuRuntime for MockRuntime {
    fn device_count(&self) -> RuntimeResult<i32> {
        let state = self.lock();
        Self::injected(&state, MockFailure::DeviceQuery, "device count")?;
        Ok(state.devices.len() as i32)
    }

    fn device_properties(&self, device_id: i32) -> RuntimeResult<DeviceProperties> {
        let state = self.lock();
        Self::injected(&state, MockFailure::DeviceQuery, "device properties")?;
        usize::try_from(device_id)
            .ok()
            .and_then(|idx| state.devices.get(idx).copied())
            .ok_or_else(|| {
                RuntimeError::new(
                    RUNTIME_ERROR_INVALID_DEVICE,
                    format!("invalid device ordinal {}", device_id),
                )
            })
    }

    fn runtime_version(&self) -> RuntimeResult<i32> {
        let state = self.lock();
        if state.failures.contains(&MockFailure::RuntimeVersion) {
            return Err(RuntimeError::new(
                RUNTIME_ERROR_INSUFFICIENT_DRIVER,
                "CUDA driver version is insufficient for CUDA runtime version",
            ));
        }
        Ok(state.runtime_version)
    }

    fn set_device(&self, device_id: i32) -> RuntimeResult<()> {
        let mut state = self.lock();
        Self::injected(&state, MockFailure::SetDevice, "set device")?;
        if device_id < 0 || device_id as usize >= state.devices.len() {
            return Err(RuntimeError::new(
                RUNTIME_ERROR_INVALID_DEVICE,
                format!("invalid device ordinal {}", device_id),
            ));
        }
        state.current_device = device_id;
        state.calls.push(RuntimeCall::SetDevice(device_id));
        Ok(())
    }

    fn memory_info(&self) -> RuntimeResult<MemoryInfo> {
        let state = self.lock();
        Self::injected(&state, MockFailure::MemoryInfo, "memory info")?;
        let device = state
            .devices
            .get(state.current_device as usize)
            .ok_or_else(|| RuntimeError::new(RUNTIME_ERROR_INVALID_DEVICE, "no current device"))?;
        Ok(MemoryInfo {
            free_bytes: device.free_memory_bytes,
            total_bytes: device.total_memory_bytes,
        })
    }

    fn malloc(&self, size: usize) -> RuntimeResult<DevicePtr> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::Malloc(size));
        if state.failures.contains(&MockFailure::Malloc) {
            return Err(RuntimeError::new(
                RUNTIME_ERROR_MEMORY_ALLOCATION,
                "out of memory (injected)",
            ));
        }

        let current = state.current_device as usize;
        let free = state
            .devices
            .get(current)
            .map(|d| d.free_memory_bytes)
            .unwrap_or(0);
        if size as u64 > free {
            return Err(RuntimeError::new(
                RUNTIME_ERROR_MEMORY_ALLOCATION,
                format!("out of memory: requested {} bytes, {} free", size, free),
            ));
        }

        let addr = state.next_addr;
        state.next_addr = addr + size + FAKE_ADDR_GUARD;
        if let Some(device) = state.devices.get_mut(current) {
            device.free_memory_bytes -= size as u64;
        }

        let ptr = DevicePtr::from_raw(addr as *mut c_void);
        state.live.insert(ptr, size);
        state.malloc_count += 1;
        Ok(ptr)
    }

    fn free(&self, ptr: DevicePtr) -> RuntimeResult<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::Free(ptr));
        Self::injected(&state, MockFailure::Free, "free")?;

        let size = state.live.remove(&ptr).ok_or_else(|| {
            RuntimeError::new(
                RUNTIME_ERROR_INVALID_VALUE,
                format!("free of unknown device pointer {}", ptr),
            )
        })?;
        let current = state.current_device as usize;
        if let Some(device) = state.devices.get_mut(current) {
            device.free_memory_bytes += size as u64;
        }
        state.free_count += 1;
        Ok(())
    }

    fn set_cache_preference(&self, preference: CachePreference) -> RuntimeResult<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::SetCachePreference(preference));
        Self::injected(&state, MockFailure::CachePreference, "cache preference")?;
        state.device_state.cache_preference = Some(preference);
        Ok(())
    }

    fn set_shared_memory_bank_width(&self, width: SharedMemoryBankWidth) -> RuntimeResult<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::SetSharedMemoryBankWidth(width));
        Self::injected(&state, MockFailure::SharedMemoryBankWidth, "shared memory bank width")?;
        state.device_state.shared_memory_bank_width = Some(width);
        Ok(())
    }

    fn set_limit(&self, kind: LimitKind, value: usize) -> RuntimeResult<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::SetLimit(kind, value));
        Self::injected(&state, MockFailure::Limit(kind), "device limit")?;
        state.device_state.limits.insert(kind, value);
        Ok(())
    }

    fn set_device_flags(&self, flags: DeviceFlags) -> RuntimeResult<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::SetDeviceFlags(flags));
        Self::injected(&state, MockFailure::DeviceFlags, "device flags")?;
        state.device_state.device_flags = Some(flags);
        Ok(())
    }
}
