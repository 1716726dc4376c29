//! Device memory pool with first-fit block reuse
//!
//! Every block is a separate runtime allocation. A freed block goes back to
//! the pool and is handed out again to any later request that fits, in
//! allocation order. Blocks are never split or merged and are only returned
//! to the runtime by [`MemoryPool::cleanup`] (or when the pool is dropped).

use std::sync::Arc;

use crate::backend::{DevicePtr, GpuRuntime};
use crate::error::{ForgeError, ForgeResult};

/// Alignment of every block size, in bytes
pub const POOL_ALIGNMENT: usize = 256;

/// One runtime allocation owned by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    pub handle: DevicePtr,
    /// Aligned size of the allocation
    pub size_bytes: usize,
    pub in_use: bool,
}

/// Pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub block_count: usize,
    pub blocks_in_use: usize,
    pub held_bytes: usize,
    pub in_use_bytes: usize,
    /// Requests served by a fresh runtime allocation
    pub fresh_allocations: usize,
    /// Requests served by reusing a free block
    pub reuses: usize,
}

/// Round `size` up to [`POOL_ALIGNMENT`], `None` on overflow
pub fn align_up(size: usize) -> Option<usize> {
    size.checked_add(POOL_ALIGNMENT - 1)
        .map(|s| s & !(POOL_ALIGNMENT - 1))
}

/// Private pool of device memory blocks
///
/// # Thread Safety
///
/// The pool does no internal locking. Wrap it in a `Mutex` to share it.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use keplerforge::backend::MockRuntime;
/// use keplerforge::memory::MemoryPool;
///
/// let mut pool = MemoryPool::new(Arc::new(MockRuntime::new()));
/// let a = pool.allocate(1000)?;   // fresh 1024-byte block
/// pool.free(a);
/// let b = pool.allocate(512)?;    // reuses the 1024-byte block
/// assert_eq!(a, b);
/// pool.cleanup()?;
/// ```
pub struct MemoryPool<R: GpuRuntime> {
    runtime: Arc<R>,
    blocks: Vec<MemoryBlock>,
    /// Upper bound on held bytes, if any
    limit_bytes: Option<usize>,
    fresh_allocations: usize,
    reuses: usize,
}

impl<R: GpuRuntime> MemoryPool<R> {
    /// Unbounded pool
    pub fn new(runtime: Arc<R>) -> Self {
        MemoryPool {
            runtime,
            blocks: Vec::new(),
            limit_bytes: None,
            fresh_allocations: 0,
            reuses: 0,
        }
    }

    /// Pool refusing fresh allocations that would push held bytes past `limit_bytes`
    pub fn with_limit(runtime: Arc<R>, limit_bytes: usize) -> Self {
        let mut pool = Self::new(runtime);
        pool.limit_bytes = Some(limit_bytes);
        pool
    }

    pub fn limit_bytes(&self) -> Option<usize> {
        self.limit_bytes
    }

    /// Hand out a block of at least `requested` bytes
    ///
    /// The first free block (in allocation order) whose size covers the
    /// aligned request is reused as-is. Otherwise a new block of exactly the
    /// aligned size is allocated from the runtime.
    ///
    /// # Errors
    /// - `requested` is zero, even when a free block exists that any size
    ///   would fit; a zero-byte request never claims a block
    /// - `requested` overflows when aligned
    /// - the pool limit would be exceeded
    /// - the runtime allocation failed (existing blocks stay valid)
    pub fn allocate(&mut self, requested: usize) -> ForgeResult<DevicePtr> {
        if requested == 0 {
            return Err(ForgeError::Allocation(
                "requested size must be non-zero".to_string(),
            ));
        }
        let size = align_up(requested).ok_or_else(|| {
            ForgeError::Allocation(format!(
                "requested size {} overflows when aligned to {}",
                requested, POOL_ALIGNMENT
            ))
        })?;

        if let Some(block) = self
            .blocks
            .iter_mut()
            .find(|b| !b.in_use && b.size_bytes >= size)
        {
            block.in_use = true;
            self.reuses += 1;
            tracing::trace!(
                "pool: reusing {}-byte block {} for {} bytes",
                block.size_bytes,
                block.handle,
                requested
            );
            return Ok(block.handle);
        }

        if let Some(limit) = self.limit_bytes {
            let held = self.held_bytes();
            if held.saturating_add(size) > limit {
                return Err(ForgeError::Allocation(format!(
                    "pool limit exceeded: {} bytes held, {} requested, limit {}",
                    held, size, limit
                )));
            }
        }

        let handle = self.runtime.malloc(size).map_err(|e| {
            tracing::error!("pool: device allocation of {} bytes failed: {}", size, e);
            ForgeError::Allocation(format!("{} bytes: {}", size, e))
        })?;

        self.blocks.push(MemoryBlock {
            handle,
            size_bytes: size,
            in_use: true,
        });
        self.fresh_allocations += 1;
        tracing::debug!(
            "pool: allocated {}-byte block {} ({} blocks, {} bytes held)",
            size,
            handle,
            self.blocks.len(),
            self.held_bytes()
        );
        Ok(handle)
    }

    /// Return a block to the pool; unknown handles are ignored
    pub fn free(&mut self, handle: DevicePtr) {
        match self.blocks.iter_mut().find(|b| b.handle == handle) {
            Some(block) => block.in_use = false,
            None => tracing::trace!("pool: ignoring free of unknown handle {}", handle),
        }
    }

    /// Release every block to the runtime and empty the pool
    ///
    /// All blocks are released even if some fail; the first failure is
    /// returned. Handles handed out earlier are invalid afterwards.
    pub fn cleanup(&mut self) -> ForgeResult<()> {
        let mut first_error = None;
        let count = self.blocks.len();
        let held = self.held_bytes();

        for block in self.blocks.drain(..) {
            if let Err(e) = self.runtime.free(block.handle) {
                tracing::error!("pool: releasing block {} failed: {}", block.handle, e);
                if first_error.is_none() {
                    first_error = Some(ForgeError::Deallocation(format!(
                        "block {} ({} bytes): {}",
                        block.handle, block.size_bytes, e
                    )));
                }
            }
        }

        if count > 0 {
            tracing::debug!("pool: released {} blocks ({} bytes)", count, held);
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Sum of all block sizes, in use or not
    pub fn held_bytes(&self) -> usize {
        self.blocks.iter().map(|b| b.size_bytes).sum()
    }

    /// Aligned size of the block behind `handle`
    pub fn block_size(&self, handle: DevicePtr) -> Option<usize> {
        self.blocks
            .iter()
            .find(|b| b.handle == handle)
            .map(|b| b.size_bytes)
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        let in_use = self.blocks.iter().filter(|b| b.in_use);
        PoolStats {
            block_count: self.blocks.len(),
            blocks_in_use: in_use.clone().count(),
            held_bytes: self.held_bytes(),
            in_use_bytes: in_use.map(|b| b.size_bytes).sum(),
            fresh_allocations: self.fresh_allocations,
            reuses: self.reuses,
        }
    }
}

impl<R: GpuRuntime> Drop for MemoryPool<R> {
    fn drop(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        if let Err(e) = self.cleanup() {
            tracing::warn!("pool: release on drop incomplete: {}", e);
        }
    }
}

impl<R: GpuRuntime> std::fmt::Debug for MemoryPool<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("blocks", &self.blocks.len())
            .field("held_bytes", &self.held_bytes())
            .field("limit_bytes", &self.limit_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockFailure, MockRuntime, RuntimeCall};

    fn pool() -> (Arc<MockRuntime>, MemoryPool<MockRuntime>) {
        let runtime = Arc::new(MockRuntime::new());
        let pool = MemoryPool::new(Arc::clone(&runtime));
        (runtime, pool)
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1), Some(256));
        assert_eq!(align_up(256), Some(256));
        assert_eq!(align_up(257), Some(512));
        assert_eq!(align_up(1000), Some(1024));
        assert_eq!(align_up(usize::MAX), None);
    }

    #[test]
    fn test_allocate_aligns_request() {
        let (_runtime, mut pool) = pool();
        let handle = pool.allocate(1000).unwrap();
        assert_eq!(pool.block_size(handle), Some(1024));
        assert_eq!(pool.held_bytes(), 1024);
    }

    #[test]
    fn test_freed_block_is_reused_without_split() {
        let (runtime, mut pool) = pool();
        let a = pool.allocate(1000).unwrap();
        pool.free(a);
        let b = pool.allocate(512).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.block_size(b), Some(1024));
        assert_eq!(runtime.malloc_count(), 1);
        assert_eq!(pool.stats().reuses, 1);
    }

    #[test]
    fn test_too_small_free_block_is_skipped() {
        let (_runtime, mut pool) = pool();
        let small = pool.allocate(256).unwrap();
        pool.free(small);
        let big = pool.allocate(2048).unwrap();
        assert_ne!(small, big);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_first_fit_follows_insertion_order() {
        let (_runtime, mut pool) = pool();
        let large = pool.allocate(4096).unwrap();
        let medium = pool.allocate(1024).unwrap();
        pool.free(large);
        pool.free(medium);
        // The larger block comes first, so it wins even though medium is tighter
        assert_eq!(pool.allocate(512).unwrap(), large);
        assert_eq!(pool.allocate(512).unwrap(), medium);
    }

    #[test]
    fn test_free_unknown_handle_is_noop() {
        let (runtime, mut pool) = pool();
        let a = pool.allocate(256).unwrap();
        let stranger = runtime.malloc(256).unwrap();
        pool.free(stranger);
        assert_eq!(pool.stats().blocks_in_use, 1);
        pool.free(a);
        pool.free(a);
        assert_eq!(pool.stats().blocks_in_use, 0);
    }

    #[test]
    fn test_runtime_failure_keeps_existing_blocks() {
        let (runtime, mut pool) = pool();
        let a = pool.allocate(256).unwrap();
        runtime.inject_failure(MockFailure::Malloc);
        let err = pool.allocate(512).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.block_size(a), Some(256));

        runtime.clear_failure(MockFailure::Malloc);
        assert!(pool.allocate(512).is_ok());
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let (runtime, mut pool) = pool();
        assert!(matches!(pool.allocate(0), Err(ForgeError::Allocation(_))));
        assert_eq!(runtime.malloc_count(), 0);

        // A free block that would fit anything is still not claimed
        let block = pool.allocate(4096).unwrap();
        pool.free(block);
        assert!(matches!(pool.allocate(0), Err(ForgeError::Allocation(_))));
        assert_eq!(pool.stats().blocks_in_use, 0);
        assert_eq!(pool.stats().reuses, 0);
    }

    #[test]
    fn test_overflowing_size_is_rejected() {
        let (_runtime, mut pool) = pool();
        assert!(matches!(
            pool.allocate(usize::MAX - 10),
            Err(ForgeError::Allocation(_))
        ));
    }

    #[test]
    fn test_limit_rejects_fresh_allocation() {
        let runtime = Arc::new(MockRuntime::new());
        let mut pool = MemoryPool::with_limit(Arc::clone(&runtime), 1024);
        let a = pool.allocate(1024).unwrap();
        assert!(pool.allocate(1).is_err());
        pool.free(a);
        assert_eq!(pool.allocate(1).unwrap(), a, "reuse is not limited");
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let (runtime, mut pool) = pool();
        for size in [256, 512, 1024] {
            pool.allocate(size).unwrap();
        }
        pool.cleanup().unwrap();
        assert!(pool.is_empty());
        assert_eq!(pool.held_bytes(), 0);
        assert_eq!(runtime.live_allocations(), 0);
        assert_eq!(runtime.free_count(), 3);
    }

    #[test]
    fn test_cleanup_attempts_every_block_on_failure() {
        let (runtime, mut pool) = pool();
        pool.allocate(256).unwrap();
        pool.allocate(512).unwrap();
        runtime.clear_calls();
        runtime.inject_failure(MockFailure::Free);

        let err = pool.cleanup().unwrap_err();
        assert!(matches!(err, ForgeError::Deallocation(_)));
        assert!(pool.is_empty());
        let frees = runtime
            .calls()
            .into_iter()
            .filter(|c| matches!(c, RuntimeCall::Free(_)))
            .count();
        assert_eq!(frees, 2);
    }

    #[test]
    fn test_drop_releases_held_blocks() {
        let runtime = Arc::new(MockRuntime::new());
        {
            let mut pool = MemoryPool::new(Arc::clone(&runtime));
            pool.allocate(256).unwrap();
            pool.allocate(4096).unwrap();
        }
        assert_eq!(runtime.live_allocations(), 0);
    }

    #[test]
    fn test_cleanup_then_drop_releases_once() {
        let runtime = Arc::new(MockRuntime::new());
        {
            let mut pool = MemoryPool::new(Arc::clone(&runtime));
            pool.allocate(256).unwrap();
            pool.cleanup().unwrap();
        }
        assert_eq!(runtime.free_count(), 1);
    }

    #[test]
    fn test_stats() {
        let (_runtime, mut pool) = pool();
        let a = pool.allocate(100).unwrap();
        pool.allocate(300).unwrap();
        pool.free(a);
        let stats = pool.stats();
        assert_eq!(stats.block_count, 2);
        assert_eq!(stats.blocks_in_use, 1);
        assert_eq!(stats.held_bytes, 256 + 512);
        assert_eq!(stats.in_use_bytes, 512);
        assert_eq!(stats.fresh_allocations, 2);
    }
}
