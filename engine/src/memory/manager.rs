/*!
 * Allocator Façade
 *
 * Owns the large pool, the small-pool registry, the size-ordered pool
 * index, the address-ordered base map, and the slab cache, and routes every
 * allocation: slab for the smallest classes, best-fit small pool next, the
 * large pool as the final fallback. Frees classify the address (slab
 * regions first, then the base map) and dispatch to the owner.
 *
 * Lock order is admin -> pool -> slab; acquisitions here are sequential,
 * never nested against that order.
 */

use super::index::PoolIndex;
use super::pool::{Pool, LARGE_POOL_ID};
use super::slab::SlabCache;
use super::types::{AddressSpace, MemoryError, MemoryResult, MemoryStats, PoolConfig};
use crate::core::alignment::{align_up, aligned_size};
use crate::core::limits::{MEMORY_ALIGNMENT, MIN_BLOCK_SIZE, SLAB_MAX_SIZE};
use crate::core::types::{Address, PoolId, Size, NULL_ADDRESS};
use crate::errlog::ErrorCode;
use crate::log_error;
use log::info;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::Arc;

#[cfg(feature = "memory-debug")]
use super::tracking::{AllocationRecord, AllocationTracker};

/// Shared handle to a pool
pub type PoolRef = Arc<Pool>;

/// Registry of small pools plus the structures that index them.
/// Everything in here mutates under the admin lock.
struct Registry {
    slots: Vec<Option<PoolRef>>,
    index: PoolIndex,
    /// Address-ordered map of every pool's base (large pool included), for
    /// O(log n) owner lookup on free
    base_map: BTreeMap<Address, PoolRef>,
}

impl Registry {
    fn find_pool(&self, addr: Address) -> Option<PoolRef> {
        self.base_map
            .range(..=addr)
            .next_back()
            .map(|(_, pool)| pool)
            .filter(|pool| pool.contains(addr))
            .cloned()
    }
}

/// Pool-based allocator: slab cache, best-fit small pools, large-pool
/// fallback, explicit per-pool operations, statistics, and (with the
/// `memory-debug` feature) leak tracking.
pub struct PoolAllocator {
    config: PoolConfig,
    address_space: AddressSpace,
    large: PoolRef,
    registry: Mutex<Registry>,
    slab: Mutex<SlabCache>,
    #[cfg(feature = "memory-debug")]
    tracking: AllocationTracker,
}

impl PoolAllocator {
    /// Build an allocator from a validated configuration snapshot: the
    /// large pool, `initial_pools` small pools registered in the index, and
    /// an empty slab cache. Partial failures release everything already
    /// built.
    pub fn new(config: PoolConfig) -> MemoryResult<Self> {
        let config = config.validated().map_err(|err| {
            log_error!(ErrorCode::InvalidArgument, "invalid configuration: {}", err);
            err
        })?;

        let address_space = AddressSpace::new();
        let large = Arc::new(Pool::new(
            LARGE_POOL_ID,
            address_space.claim(config.large_pool_size),
            config.large_pool_size,
        )?);

        let mut registry = Registry {
            slots: vec![None; config.max_pools],
            index: PoolIndex::new(),
            base_map: BTreeMap::new(),
        };
        registry.base_map.insert(large.base(), Arc::clone(&large));

        for slot in 0..config.initial_pools {
            let pool = Arc::new(Pool::new(
                slot as PoolId,
                address_space.claim(config.small_pool_size),
                config.small_pool_size,
            )?);
            registry.index.insert(pool.total_size(), pool.id());
            registry.base_map.insert(pool.base(), Arc::clone(&pool));
            registry.slots[slot] = Some(pool);
        }

        info!(
            "pool allocator initialized: large pool {} bytes, {} small pools of {} bytes, {} objects per slab",
            config.large_pool_size, config.initial_pools, config.small_pool_size,
            config.objects_per_slab
        );

        Ok(Self {
            slab: Mutex::new(SlabCache::new(config.objects_per_slab)),
            config,
            address_space,
            large,
            registry: Mutex::new(registry),
            #[cfg(feature = "memory-debug")]
            tracking: AllocationTracker::new(),
        })
    }

    /// The configuration snapshot taken at construction.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Handle to the large fallback pool.
    pub fn large_pool(&self) -> PoolRef {
        Arc::clone(&self.large)
    }

    /// Number of registered small pools.
    pub fn small_pool_count(&self) -> usize {
        self.registry
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    fn track_alloc(&self, addr: Address, size: Size, caller: &'static Location<'static>) {
        #[cfg(feature = "memory-debug")]
        self.tracking.record(addr, size, caller);
        #[cfg(not(feature = "memory-debug"))]
        let _ = (addr, size, caller);
    }

    fn track_free(&self, addr: Address) {
        #[cfg(feature = "memory-debug")]
        self.tracking.forget(addr);
        #[cfg(not(feature = "memory-debug"))]
        let _ = addr;
    }

    /// Route an allocation: slab cache, best-fit small pool, large pool.
    #[track_caller]
    pub fn alloc(&self, size: Size) -> MemoryResult<Address> {
        self.alloc_located(size, Location::caller())
    }

    pub(crate) fn alloc_located(
        &self,
        size: Size,
        caller: &'static Location<'static>,
    ) -> MemoryResult<Address> {
        let size = aligned_size(size);

        if size <= SLAB_MAX_SIZE {
            if let Some(addr) = self.slab.lock().alloc(size, &self.address_space) {
                self.track_alloc(addr, size, caller);
                return Ok(addr);
            }
        }

        let best = {
            let registry = self.registry.lock();
            registry
                .index
                .best_fit(size)
                .and_then(|id| registry.slots[id as usize].clone())
        };
        if let Some(pool) = best {
            if let Ok(addr) = pool.allocate(size) {
                self.track_alloc(addr, size, caller);
                return Ok(addr);
            }
        }

        let addr = self.large.allocate(size)?;
        self.track_alloc(addr, size, caller);
        Ok(addr)
    }

    /// Return an allocation to its owner. `NULL_ADDRESS` is a no-op.
    pub fn free(&self, addr: Address) -> MemoryResult<()> {
        if addr == NULL_ADDRESS {
            return Ok(());
        }

        {
            let mut slab = self.slab.lock();
            if let Some(hit) = slab.classify(addr) {
                if hit.offset_in_object != 0 {
                    drop(slab);
                    log_error!(
                        ErrorCode::PoolInvalidFree,
                        "free of address 0x{:x} inside a slab object",
                        addr
                    );
                    return Err(MemoryError::InvalidFree(addr));
                }
                slab.free(addr, hit.class_size);
                drop(slab);
                self.track_free(addr);
                return Ok(());
            }
        }

        let Some(pool) = self.registry.lock().find_pool(addr) else {
            log_error!(
                ErrorCode::PoolInvalidFree,
                "free of address 0x{:x} not owned by any pool",
                addr
            );
            return Err(MemoryError::InvalidFree(addr));
        };
        pool.free(addr)?;
        self.track_free(addr);
        Ok(())
    }

    /// Resize an allocation. `NULL_ADDRESS` behaves like `alloc`; a zero
    /// size behaves like `free` and returns `NULL_ADDRESS`.
    #[track_caller]
    pub fn realloc(&self, addr: Address, new_size: Size) -> MemoryResult<Address> {
        self.realloc_located(addr, new_size, Location::caller())
    }

    pub(crate) fn realloc_located(
        &self,
        addr: Address,
        new_size: Size,
        caller: &'static Location<'static>,
    ) -> MemoryResult<Address> {
        if addr == NULL_ADDRESS {
            return self.alloc_located(new_size, caller);
        }
        if new_size == 0 {
            self.free(addr)?;
            return Ok(NULL_ADDRESS);
        }

        // A slab object grows by moving: copy out, reallocate, release.
        let slab_hit = self.slab.lock().classify(addr);
        if let Some(hit) = slab_hit {
            if hit.offset_in_object != 0 {
                log_error!(
                    ErrorCode::PoolInvalidFree,
                    "realloc of address 0x{:x} inside a slab object",
                    addr
                );
                return Err(MemoryError::InvalidFree(addr));
            }
            if aligned_size(new_size) <= hit.class_size {
                return Ok(addr);
            }
            let keep = hit.class_size;
            let data = self
                .slab
                .lock()
                .read(addr, keep)
                .ok_or(MemoryError::InvalidAddress(addr))?;
            let new_addr = self.alloc_located(new_size, caller)?;
            self.write_bytes(new_addr, &data)?;
            self.free(addr)?;
            return Ok(new_addr);
        }

        let Some(pool) = self.registry.lock().find_pool(addr) else {
            log_error!(
                ErrorCode::PoolInvalidFree,
                "realloc of address 0x{:x} not owned by any pool",
                addr
            );
            return Err(MemoryError::InvalidFree(addr));
        };

        if let Some(kept) = pool.try_realloc_in_place(addr, new_size)? {
            return Ok(kept);
        }

        // Move: copy the old payload, bounded by both sizes.
        let old_size = pool.payload_size(addr)?;
        let data = pool.read(addr, old_size.min(aligned_size(new_size)))?;
        let new_addr = self.alloc_located(new_size, caller)?;
        self.write_bytes(new_addr, &data)?;
        pool.free(addr)?;
        self.track_free(addr);
        Ok(new_addr)
    }

    /// Sum of (total size, used size) across every pool. A best-effort
    /// snapshot under the admin lock; slab bytes are not counted.
    pub fn get_stats(&self) -> (Size, Size) {
        let registry = self.registry.lock();
        let mut total = self.large.total_size();
        let mut used = self.large.used_size();
        for pool in registry.slots.iter().flatten() {
            total += pool.total_size();
            used += pool.used_size();
        }
        (total, used)
    }

    /// Aggregate statistics.
    pub fn stats(&self) -> MemoryStats {
        let (total_allocated, total_used) = self.get_stats();
        MemoryStats {
            total_allocated,
            total_used,
            small_pool_count: self.small_pool_count(),
            usage_percentage: if total_allocated == 0 {
                0.0
            } else {
                total_used as f64 / total_allocated as f64 * 100.0
            },
        }
    }

    /// Create and register a new small pool. Fails with the registry full
    /// error when every slot is taken, leaving no side effects.
    pub fn create(&self, size: Size) -> MemoryResult<PoolRef> {
        let size = align_up(size, MEMORY_ALIGNMENT);
        let mut registry = self.registry.lock();

        let Some(slot) = registry.slots.iter().position(|slot| slot.is_none()) else {
            drop(registry);
            log_error!(
                ErrorCode::PoolFull,
                "pool registry full ({} pools)",
                self.config.max_pools
            );
            return Err(MemoryError::RegistryFull {
                max: self.config.max_pools,
            });
        };

        let pool = Arc::new(Pool::new(
            slot as PoolId,
            self.address_space.claim(size),
            size,
        )?);
        registry.index.insert(pool.total_size(), pool.id());
        registry.base_map.insert(pool.base(), Arc::clone(&pool));
        registry.slots[slot] = Some(Arc::clone(&pool));

        info!("created pool {} of {} bytes", pool.id(), size);
        Ok(pool)
    }

    /// Deregister a pool and release its backing region. The large pool is
    /// not destroyable.
    pub fn destroy(&self, pool: &PoolRef) -> MemoryResult<()> {
        if pool.id() == LARGE_POOL_ID {
            log_error!(
                ErrorCode::PoolInvalidPool,
                "attempt to destroy the large pool"
            );
            return Err(MemoryError::InvalidPool);
        }

        let mut registry = self.registry.lock();
        let slot = pool.id() as usize;
        let registered = registry
            .slots
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .is_some_and(|entry| Arc::ptr_eq(entry, pool));
        if !registered {
            drop(registry);
            log_error!(
                ErrorCode::PoolInvalidPool,
                "attempt to destroy an unknown pool"
            );
            return Err(MemoryError::InvalidPool);
        }

        registry.index.remove(pool.total_size(), pool.id());
        registry.base_map.remove(&pool.base());
        registry.slots[slot] = None;
        info!("destroyed pool {}", pool.id());
        Ok(())
    }

    /// Allocate from a specific pool, skipping the routing policy. Does not
    /// fall back to the router on failure.
    #[track_caller]
    pub fn alloc_from(&self, pool: &PoolRef, size: Size) -> MemoryResult<Address> {
        let caller = Location::caller();
        let addr = pool.allocate(size)?;
        self.track_alloc(addr, aligned_size(size).max(MIN_BLOCK_SIZE), caller);
        Ok(addr)
    }

    /// Free into a specific pool; the address must lie in that pool.
    pub fn free_to(&self, pool: &PoolRef, addr: Address) -> MemoryResult<()> {
        if addr == NULL_ADDRESS {
            return Ok(());
        }
        if !pool.contains(addr) {
            log_error!(
                ErrorCode::PoolInvalidFree,
                "free of address 0x{:x} to the wrong pool",
                addr
            );
            return Err(MemoryError::InvalidFree(addr));
        }
        pool.free(addr)?;
        self.track_free(addr);
        Ok(())
    }

    /// Reallocate within a specific pool: in place when possible, otherwise
    /// a fresh block from the same pool.
    #[track_caller]
    pub fn realloc_from(
        &self,
        pool: &PoolRef,
        addr: Address,
        new_size: Size,
    ) -> MemoryResult<Address> {
        let caller = Location::caller();
        if addr == NULL_ADDRESS {
            let out = pool.allocate(new_size)?;
            self.track_alloc(out, aligned_size(new_size).max(MIN_BLOCK_SIZE), caller);
            return Ok(out);
        }
        if new_size == 0 {
            self.free_to(pool, addr)?;
            return Ok(NULL_ADDRESS);
        }
        if !pool.contains(addr) {
            log_error!(
                ErrorCode::PoolInvalidFree,
                "realloc of address 0x{:x} from the wrong pool",
                addr
            );
            return Err(MemoryError::InvalidFree(addr));
        }

        if let Some(kept) = pool.try_realloc_in_place(addr, new_size)? {
            return Ok(kept);
        }

        let old_size = pool.payload_size(addr)?;
        let data = pool.read(addr, old_size.min(aligned_size(new_size)))?;
        let new_addr = pool.allocate(new_size)?;
        pool.write(new_addr, &data)?;
        pool.free(addr)?;
        self.track_free(addr);
        self.track_alloc(new_addr, aligned_size(new_size).max(MIN_BLOCK_SIZE), caller);
        Ok(new_addr)
    }

    /// True iff `addr` lies inside the given pool's region.
    pub fn contains(&self, pool: &PoolRef, addr: Address) -> bool {
        pool.contains(addr)
    }

    /// Merge adjacent free blocks in one pool; returns the merge count.
    pub fn defragment(&self, pool: &PoolRef) -> usize {
        pool.defragment()
    }

    /// Copy `data` into allocated memory at `addr` (slab object or in-use
    /// pool block).
    pub fn write_bytes(&self, addr: Address, data: &[u8]) -> MemoryResult<()> {
        {
            let mut slab = self.slab.lock();
            if slab.classify(addr).is_some() {
                return if slab.write(addr, data) {
                    Ok(())
                } else {
                    Err(MemoryError::InvalidAddress(addr))
                };
            }
        }
        match self.registry.lock().find_pool(addr) {
            Some(pool) => pool.write(addr, data),
            None => Err(MemoryError::InvalidAddress(addr)),
        }
    }

    /// Read `len` bytes of allocated memory at `addr`.
    pub fn read_bytes(&self, addr: Address, len: Size) -> MemoryResult<Vec<u8>> {
        {
            let slab = self.slab.lock();
            if slab.classify(addr).is_some() {
                return slab.read(addr, len).ok_or(MemoryError::InvalidAddress(addr));
            }
        }
        match self.registry.lock().find_pool(addr) {
            Some(pool) => pool.read(addr, len),
            None => Err(MemoryError::InvalidAddress(addr)),
        }
    }

    /// Slab class size owning `addr`, if the slab cache owns it.
    pub fn slab_class_of(&self, addr: Address) -> Option<Size> {
        self.slab.lock().classify(addr).map(|hit| hit.class_size)
    }

    /// (class size, free object count) for every slab class.
    pub fn slab_free_counts(&self) -> Vec<(Size, usize)> {
        self.slab.lock().free_counts()
    }

    /// Surviving allocation records; logs one warning per leak.
    #[cfg(feature = "memory-debug")]
    pub fn leak_check(&self) -> Vec<AllocationRecord> {
        let leaks = self.tracking.leaks();
        for record in &leaks {
            log::warn!(
                "memory leak: {} bytes at 0x{:x}, allocated at {}:{}",
                record.size,
                record.address,
                record.file,
                record.line
            );
        }
        leaks
    }
}

impl std::fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (total, used) = self.get_stats();
        f.debug_struct("PoolAllocator")
            .field("total_allocated", &total)
            .field("total_used", &used)
            .field("small_pools", &self.small_pool_count())
            .finish()
    }
}
