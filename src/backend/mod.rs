//! GPU runtime backends

#[cfg(feature = "cuda")]
pub mod cuda_backend;
pub mod error;
pub mod mock;
pub mod runtime;

#[cfg(feature = "cuda")]
pub use cuda_backend::CudaRuntime;
pub use error::{RuntimeError, RuntimeResult};
pub use mock::MockRuntime;
pub use runtime::{
    CachePreference, DeviceFlags, DeviceProperties, DevicePtr, GpuRuntime, LimitKind, MemoryInfo,
    SharedMemoryBankWidth,
};
