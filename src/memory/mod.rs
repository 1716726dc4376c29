//! Device memory management
//!
//! Each pool block is its own runtime allocation, sized up to a 256-byte
//! boundary. Freed blocks are kept and reused first-fit instead of being
//! returned to the driver, which keeps `cudaMalloc`/`cudaFree` traffic off
//! the hot path on legacy devices.

pub mod pool;

pub use pool::{align_up, MemoryBlock, MemoryPool, PoolStats, POOL_ALIGNMENT};
