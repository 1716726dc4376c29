//! Abstract GPU runtime capability interface
//!
//! Everything the device-adaptation pipeline and the memory pool need from
//! the driver goes through [`GpuRuntime`]. The real CUDA implementation lives
//! in `cuda_backend` (feature `cuda`); [`super::mock::MockRuntime`] is a
//! host-only stand-in.

use std::ffi::c_void;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use super::error::RuntimeResult;

/// Opaque device memory handle.
///
/// Never dereferenced on the host; only handed back to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevicePtr(*mut c_void);

// SAFETY: DevicePtr is an opaque device address. The host never reads or
// writes through it, it is only passed back into the runtime.
unsafe impl Send for DevicePtr {}
unsafe impl Sync for DevicePtr {}

impl DevicePtr {
    pub fn from_raw(ptr: *mut c_void) -> Self {
        DevicePtr(ptr)
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.0
    }

    /// Device address as an integer (for logging)
    pub fn addr(&self) -> usize {
        self.0 as usize
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.addr())
    }
}

/// Raw device properties as reported by one runtime query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Compute capability major version
    pub major: i32,
    /// Compute capability minor version
    pub minor: i32,
    /// Free device memory in bytes at query time
    pub free_memory_bytes: u64,
    /// Total device memory in bytes
    pub total_memory_bytes: u64,
}

/// Free/total memory of the current device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryInfo {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

/// L1/shared-memory split preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachePreference {
    /// Larger L1 cache, smaller shared memory
    #[default]
    PreferL1,
    /// Larger shared memory, smaller L1 cache
    PreferShared,
}

/// Shared memory bank width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SharedMemoryBankWidth {
    #[default]
    FourByte,
    EightByte,
}

impl SharedMemoryBankWidth {
    pub fn bytes(&self) -> u32 {
        match self {
            SharedMemoryBankWidth::FourByte => 4,
            SharedMemoryBankWidth::EightByte => 8,
        }
    }
}

/// Device resource limits settable through [`GpuRuntime::set_limit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// Maximum L2 fetch granularity, in bytes
    L2FetchGranularity,
    /// Depth of the asynchronous prefetch queue
    PrefetchQueueDepth,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::L2FetchGranularity => write!(f, "L2 fetch granularity"),
            LimitKind::PrefetchQueueDepth => write!(f, "prefetch queue depth"),
        }
    }
}

/// Device behavior flags bitset.
///
/// Bit values follow the CUDA runtime's `cudaDevice*` flag constants so the
/// raw value can be handed straight to `cudaSetDeviceFlags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFlags(u32);

impl DeviceFlags {
    /// Spin-wait on the host while waiting for device results
    pub const SCHEDULE_SPIN: DeviceFlags = DeviceFlags(0x01);
    /// Allow mapping pinned host memory into the device address space
    pub const MAP_HOST: DeviceFlags = DeviceFlags(0x08);
    /// Keep local memory sized to the maximum after resizing
    pub const LMEM_RESIZE_TO_MAX: DeviceFlags = DeviceFlags(0x10);

    pub const fn empty() -> Self {
        DeviceFlags(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        DeviceFlags(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: DeviceFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DeviceFlags {
    type Output = DeviceFlags;

    fn bitor(self, rhs: DeviceFlags) -> DeviceFlags {
        DeviceFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for DeviceFlags {
    fn bitor_assign(&mut self, rhs: DeviceFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DeviceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(none)");
        }
        let names = [
            (DeviceFlags::SCHEDULE_SPIN, "ScheduleSpin"),
            (DeviceFlags::MAP_HOST, "MapHost"),
            (DeviceFlags::LMEM_RESIZE_TO_MAX, "LmemResizeToMax"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        let unknown = self.0 & !(0x01 | 0x08 | 0x10);
        if unknown != 0 {
            if !first {
                write!(f, " | ")?;
            }
            write!(f, "0x{:x}", unknown)?;
        }
        Ok(())
    }
}

/// Capability interface over a GPU runtime.
///
/// Implementations are expected to be thin: no retries, no caching. Every
/// call reports the runtime's own status through [`RuntimeResult`].
pub trait GpuRuntime {
    /// Number of devices visible to the runtime
    fn device_count(&self) -> RuntimeResult<i32>;

    /// Query compute capability and memory totals of `device_id`
    fn device_properties(&self, device_id: i32) -> RuntimeResult<DeviceProperties>;

    /// Raw runtime version (`1000 * major + 10 * minor`)
    fn runtime_version(&self) -> RuntimeResult<i32>;

    /// Make `device_id` the current device for the calling thread
    fn set_device(&self, device_id: i32) -> RuntimeResult<()>;

    /// Free/total memory of the current device
    fn memory_info(&self) -> RuntimeResult<MemoryInfo>;

    /// Allocate `size` bytes of device memory
    fn malloc(&self, size: usize) -> RuntimeResult<DevicePtr>;

    /// Release memory previously returned by [`GpuRuntime::malloc`]
    fn free(&self, ptr: DevicePtr) -> RuntimeResult<()>;

    fn set_cache_preference(&self, preference: CachePreference) -> RuntimeResult<()>;

    fn set_shared_memory_bank_width(&self, width: SharedMemoryBankWidth) -> RuntimeResult<()>;

    fn set_limit(&self, kind: LimitKind, value: usize) -> RuntimeResult<()>;

    fn set_device_flags(&self, flags: DeviceFlags) -> RuntimeResult<()>;
}
