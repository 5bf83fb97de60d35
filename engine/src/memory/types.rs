/*!
 * Memory Types
 * Errors, configuration, statistics, and the virtual address space
 */

use crate::core::alignment::align_up;
use crate::core::limits::{
    ADDRESS_SPACE_BASE, BLOCK_HEADER_SIZE, DEFAULT_LARGE_POOL_SIZE, DEFAULT_MAX_POOLS,
    DEFAULT_OBJECTS_PER_SLAB, DEFAULT_SMALL_BLOCK_SIZE, DEFAULT_SMALL_POOL_SIZE, MAX_POOL_SIZE,
    MEMORY_ALIGNMENT, MIN_BLOCK_SIZE,
};
use crate::core::types::{Address, Size};
use crate::errlog::ErrorCode;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("allocator is not initialized")]
    NotInitialized,

    #[error("allocator is already initialized")]
    AlreadyInitialized,

    #[error("pool allocation failed: requested {requested} bytes, {available} free in pool")]
    AllocFailed { requested: Size, available: Size },

    #[error("address 0x{0:x} was not allocated by the pool system")]
    InvalidFree(Address),

    #[error("block at 0x{0:x} is not in use")]
    BlockNotInUse(Address),

    #[error("address 0x{0:x} is out of range or misaligned")]
    InvalidAddress(Address),

    #[error("pool registry full: {max} pools already registered")]
    RegistryFull { max: usize },

    #[error("unknown or foreign pool")]
    InvalidPool,

    #[error("pool initialization failed: {0}")]
    InitFailed(String),
}

impl MemoryError {
    /// The semantic error code surfaced at the boundary.
    pub fn code(&self) -> ErrorCode {
        match self {
            MemoryError::InvalidConfig(_) => ErrorCode::InvalidArgument,
            MemoryError::NotInitialized => ErrorCode::InvalidArgument,
            MemoryError::AlreadyInitialized => ErrorCode::InvalidArgument,
            MemoryError::AllocFailed { .. } => ErrorCode::PoolAllocFailed,
            MemoryError::InvalidFree(_) => ErrorCode::PoolInvalidFree,
            MemoryError::BlockNotInUse(_) => ErrorCode::PoolInvalidFree,
            MemoryError::InvalidAddress(_) => ErrorCode::InvalidArgument,
            MemoryError::RegistryFull { .. } => ErrorCode::PoolFull,
            MemoryError::InvalidPool => ErrorCode::PoolInvalidPool,
            MemoryError::InitFailed(_) => ErrorCode::PoolInitFailed,
        }
    }
}

/// Allocator configuration snapshot taken at init
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Threshold below which allocations are considered "small"
    pub small_block_size: Size,
    /// Size of every small pool
    pub small_pool_size: Size,
    /// Size of the single large pool
    pub large_pool_size: Size,
    /// Registry capacity for small pools
    pub max_pools: usize,
    /// Objects carved per slab extension
    pub objects_per_slab: usize,
    /// Small pools created eagerly at init; the rest of the registry stays
    /// available for create()
    pub initial_pools: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            small_block_size: DEFAULT_SMALL_BLOCK_SIZE,
            small_pool_size: DEFAULT_SMALL_POOL_SIZE,
            large_pool_size: DEFAULT_LARGE_POOL_SIZE,
            max_pools: DEFAULT_MAX_POOLS,
            objects_per_slab: DEFAULT_OBJECTS_PER_SLAB,
            initial_pools: DEFAULT_MAX_POOLS,
        }
    }
}

impl PoolConfig {
    pub fn with_small_pool_size(mut self, size: Size) -> Self {
        self.small_pool_size = size;
        self
    }

    pub fn with_large_pool_size(mut self, size: Size) -> Self {
        self.large_pool_size = size;
        self
    }

    pub fn with_max_pools(mut self, max_pools: usize) -> Self {
        self.max_pools = max_pools;
        self.initial_pools = self.initial_pools.min(max_pools);
        self
    }

    pub fn with_initial_pools(mut self, initial_pools: usize) -> Self {
        self.initial_pools = initial_pools;
        self
    }

    pub fn with_objects_per_slab(mut self, objects_per_slab: usize) -> Self {
        self.objects_per_slab = objects_per_slab;
        self
    }

    /// Check the configuration and normalize pool sizes to the allocation
    /// granularity.
    pub fn validated(mut self) -> MemoryResult<Self> {
        if self.objects_per_slab == 0 {
            return Err(MemoryError::InvalidConfig(
                "objects_per_slab must be at least 1".to_string(),
            ));
        }
        if self.initial_pools > self.max_pools {
            return Err(MemoryError::InvalidConfig(format!(
                "initial_pools ({}) exceeds max_pools ({})",
                self.initial_pools, self.max_pools
            )));
        }
        self.small_pool_size = align_up(self.small_pool_size, MEMORY_ALIGNMENT);
        self.large_pool_size = align_up(self.large_pool_size, MEMORY_ALIGNMENT);
        for (name, size) in [
            ("small_pool_size", self.small_pool_size),
            ("large_pool_size", self.large_pool_size),
        ] {
            if size < BLOCK_HEADER_SIZE + MIN_BLOCK_SIZE {
                return Err(MemoryError::InvalidConfig(format!(
                    "{} ({} bytes) cannot hold a single block",
                    name, size
                )));
            }
            if size > MAX_POOL_SIZE {
                return Err(MemoryError::InvalidConfig(format!(
                    "{} ({} bytes) exceeds the addressable pool size",
                    name, size
                )));
            }
        }
        Ok(self)
    }
}

/// Aggregate statistics across all pools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_allocated: Size,
    pub total_used: Size,
    pub small_pool_count: usize,
    pub usage_percentage: f64,
}

/// Per-pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_size: Size,
    pub used_size: Size,
    pub block_count: usize,
    pub free_block_count: usize,
    pub largest_free_payload: Size,
}

/// Monotonic virtual address space shared by pools and slabs.
///
/// Ranges are claimed, never returned; a destroyed pool's range simply goes
/// dark, so stale addresses can never alias a live region.
#[derive(Debug)]
pub(crate) struct AddressSpace {
    next: AtomicUsize,
}

impl AddressSpace {
    pub(crate) fn new() -> Self {
        Self {
            next: AtomicUsize::new(ADDRESS_SPACE_BASE),
        }
    }

    /// Claim a range of `len` bytes; the returned base is aligned.
    pub(crate) fn claim(&self, len: Size) -> Address {
        let len = align_up(len, MEMORY_ALIGNMENT);
        self.next.fetch_add(len, Ordering::Relaxed)
    }
}
