//! Launch tuning for the legacy (sm_37) architecture class
//!
//! Hardware limits of a single legacy board half plus helpers that size
//! kernel launches and batches against them.

/// Threads per warp
pub const WARP_SIZE: u32 = 32;

/// Maximum threads per block
pub const MAX_THREADS_PER_BLOCK: u32 = 1024;

/// Shared memory per block (48 KB)
pub const MAX_SHARED_MEMORY_PER_BLOCK: usize = 48 * 1024;

/// Streaming multiprocessors per GPU
pub const MULTIPROCESSOR_COUNT: u32 = 13;

/// Register budget per thread passed to nvcc
pub const MAX_REGISTERS_PER_THREAD: u32 = 64;

/// Device memory one batch sample is assumed to need
pub const BYTES_PER_SAMPLE: u64 = 2 * 1024 * 1024;

/// Smallest power-of-two block size (at least one warp) covering `min_threads`
///
/// Capped at [`MAX_THREADS_PER_BLOCK`].
pub fn block_size_for(min_threads: u32) -> u32 {
    let mut block_size = WARP_SIZE;
    while block_size < min_threads && block_size < MAX_THREADS_PER_BLOCK {
        block_size *= 2;
    }
    block_size
}

/// Number of blocks of `block_size` threads needed to cover `total_threads`
pub fn grid_size_for(total_threads: u32, block_size: u32) -> u32 {
    if block_size == 0 {
        return 0;
    }
    total_threads.div_ceil(block_size)
}

/// Batch size for `available_bytes` of device memory
pub fn recommended_batch_size(available_bytes: u64) -> u32 {
    let samples = available_bytes / BYTES_PER_SAMPLE;
    if samples > 512 {
        256
    } else if samples > 128 {
        128
    } else if samples > 64 {
        64
    } else {
        32
    }
}

/// nvcc flags for building kernels that target the legacy class
pub fn nvcc_flags() -> Vec<String> {
    vec![
        "-arch=sm_37".to_string(),
        "-gencode=arch=compute_37,code=sm_37".to_string(),
        "--use_fast_math".to_string(),
        format!("--maxrregcount={}", MAX_REGISTERS_PER_THREAD),
        "-O3".to_string(),
        "--default-stream=per-thread".to_string(),
        "--restrict".to_string(),
    ]
}
