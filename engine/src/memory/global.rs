/*!
 * Global Allocator Instance
 *
 * The allocator is an explicit value (`PoolAllocator`); this module holds
 * the single process-wide convenience instance for callers that want the
 * C-style init/alloc/free surface. Every function here forwards to that
 * instance and fails with `NotInitialized` outside the init/cleanup window.
 */

use super::manager::{PoolAllocator, PoolRef};
use super::types::{MemoryError, MemoryResult, MemoryStats, PoolConfig};
use crate::core::types::{Address, Size};
use crate::errlog::ErrorCode;
use crate::log_error;
use parking_lot::RwLock;
use std::panic::Location;

static GLOBAL: RwLock<Option<PoolAllocator>> = RwLock::new(None);

fn with<T>(f: impl FnOnce(&PoolAllocator) -> MemoryResult<T>) -> MemoryResult<T> {
    let guard = GLOBAL.read();
    match guard.as_ref() {
        Some(allocator) => f(allocator),
        None => {
            log_error!(
                ErrorCode::InvalidArgument,
                "memory pool system is not initialized"
            );
            Err(MemoryError::NotInitialized)
        }
    }
}

/// Initialize the process-wide allocator. Fails if already initialized or
/// if the configuration is rejected; a rejected init leaves nothing behind.
pub fn init(config: PoolConfig) -> MemoryResult<()> {
    let mut guard = GLOBAL.write();
    if guard.is_some() {
        log_error!(
            ErrorCode::PoolInitFailed,
            "memory pool system is already initialized"
        );
        return Err(MemoryError::AlreadyInitialized);
    }
    *guard = Some(PoolAllocator::new(config)?);
    Ok(())
}

/// Tear down the process-wide allocator, releasing every pool and slab.
pub fn cleanup() {
    GLOBAL.write().take();
}

/// Route an allocation through the global instance.
#[track_caller]
pub fn alloc(size: Size) -> MemoryResult<Address> {
    let caller = Location::caller();
    with(|allocator| allocator.alloc_located(size, caller))
}

/// Free through the global instance. `NULL_ADDRESS` is a no-op.
pub fn free(addr: Address) -> MemoryResult<()> {
    with(|allocator| allocator.free(addr))
}

/// Reallocate through the global instance.
#[track_caller]
pub fn realloc(addr: Address, new_size: Size) -> MemoryResult<Address> {
    let caller = Location::caller();
    with(|allocator| allocator.realloc_located(addr, new_size, caller))
}

/// (total allocated, total used) across the global instance's pools.
pub fn get_stats() -> MemoryResult<(Size, Size)> {
    with(|allocator| Ok(allocator.get_stats()))
}

/// Aggregate statistics for the global instance.
pub fn stats() -> MemoryResult<MemoryStats> {
    with(|allocator| Ok(allocator.stats()))
}

/// Create a small pool in the global instance's registry.
pub fn create(size: Size) -> MemoryResult<PoolRef> {
    with(|allocator| allocator.create(size))
}

/// Destroy a pool created through the global instance.
pub fn destroy(pool: &PoolRef) -> MemoryResult<()> {
    with(|allocator| allocator.destroy(pool))
}

/// Allocate from a specific pool, bypassing the routing policy.
#[track_caller]
pub fn alloc_from(pool: &PoolRef, size: Size) -> MemoryResult<Address> {
    with(|allocator| allocator.alloc_from(pool, size))
}

/// Free into a specific pool.
pub fn free_to(pool: &PoolRef, addr: Address) -> MemoryResult<()> {
    with(|allocator| allocator.free_to(pool, addr))
}

/// Reallocate within a specific pool.
#[track_caller]
pub fn realloc_from(pool: &PoolRef, addr: Address, new_size: Size) -> MemoryResult<Address> {
    with(|allocator| allocator.realloc_from(pool, addr, new_size))
}

/// True iff `addr` lies inside the given pool.
pub fn contains(pool: &PoolRef, addr: Address) -> bool {
    pool.contains(addr)
}

/// Merge adjacent free blocks in one pool; returns the merge count.
pub fn defragment(pool: &PoolRef) -> MemoryResult<usize> {
    with(|allocator| Ok(allocator.defragment(pool)))
}

/// Copy bytes into allocated memory through the global instance.
pub fn write_bytes(addr: Address, data: &[u8]) -> MemoryResult<()> {
    with(|allocator| allocator.write_bytes(addr, data))
}

/// Read bytes of allocated memory through the global instance.
pub fn read_bytes(addr: Address, len: Size) -> MemoryResult<Vec<u8>> {
    with(|allocator| allocator.read_bytes(addr, len))
}

/// Slab class size owning `addr` in the global instance, if any.
pub fn slab_class_of(addr: Address) -> MemoryResult<Option<Size>> {
    with(|allocator| Ok(allocator.slab_class_of(addr)))
}

/// Surviving allocation records in the global instance.
#[cfg(feature = "memory-debug")]
pub fn leak_check() -> MemoryResult<Vec<super::tracking::AllocationRecord>> {
    with(|allocator| Ok(allocator.leak_check()))
}
