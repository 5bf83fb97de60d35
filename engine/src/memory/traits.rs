/*!
 * Memory Traits
 * Allocation and statistics abstractions over the façade
 */

use super::manager::PoolAllocator;
use super::types::{MemoryResult, MemoryStats};
use crate::core::types::{Address, Size};

/// Memory allocator interface
pub trait Allocator: Send + Sync {
    /// Allocate `size` bytes and return the payload address
    fn alloc(&self, size: Size) -> MemoryResult<Address>;

    /// Return an allocation to its owner
    fn free(&self, addr: Address) -> MemoryResult<()>;

    /// Resize an allocation, moving it if necessary
    fn realloc(&self, addr: Address, new_size: Size) -> MemoryResult<Address>;
}

/// Memory statistics provider
pub trait MemoryInfo: Send + Sync {
    /// Aggregate statistics across all pools
    fn stats(&self) -> MemoryStats;

    /// (total allocated, total used) across all pools
    fn get_stats(&self) -> (Size, Size);
}

impl Allocator for PoolAllocator {
    fn alloc(&self, size: Size) -> MemoryResult<Address> {
        PoolAllocator::alloc(self, size)
    }

    fn free(&self, addr: Address) -> MemoryResult<()> {
        PoolAllocator::free(self, addr)
    }

    fn realloc(&self, addr: Address, new_size: Size) -> MemoryResult<Address> {
        PoolAllocator::realloc(self, addr, new_size)
    }
}

impl MemoryInfo for PoolAllocator {
    fn stats(&self) -> MemoryStats {
        PoolAllocator::stats(self)
    }

    fn get_stats(&self) -> (Size, Size) {
        PoolAllocator::get_stats(self)
    }
}
