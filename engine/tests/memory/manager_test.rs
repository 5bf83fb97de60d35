/*!
 * Allocator Façade Tests
 * Routing policy, statistics, registry lifecycle, and the realloc laws
 */

use lexis_engine::core::limits::BLOCK_HEADER_SIZE;
use lexis_engine::memory::{
    Allocator, MemoryError, MemoryInfo, PoolAllocator, PoolConfig,
};
use pretty_assertions::assert_eq;

fn small_config() -> PoolConfig {
    PoolConfig::default()
        .with_small_pool_size(64 * 1024)
        .with_large_pool_size(1024 * 1024)
        .with_max_pools(4)
        .with_initial_pools(2)
}

#[test]
fn test_init_creates_configured_pools() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    assert_eq!(allocator.small_pool_count(), 2);

    let (total, used) = allocator.get_stats();
    assert_eq!(total, 1024 * 1024 + 2 * 64 * 1024);
    assert_eq!(used, 0);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PoolConfig::default().with_small_pool_size(16);
    assert!(matches!(
        PoolAllocator::new(config),
        Err(MemoryError::InvalidConfig(_))
    ));
}

#[test]
fn test_medium_sizes_route_to_small_pools() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let addr = allocator.alloc(1024).unwrap();

    assert_eq!(allocator.slab_class_of(addr), None);
    assert!(!allocator.large_pool().contains(addr));
    let (_, used) = allocator.get_stats();
    assert_eq!(used, BLOCK_HEADER_SIZE + 1024);
    allocator.free(addr).unwrap();
}

#[test]
fn test_oversized_requests_fall_back_to_large_pool() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    // Bigger than any small pool, fits the large one
    let addr = allocator.alloc(128 * 1024).unwrap();
    assert!(allocator.large_pool().contains(addr));
    allocator.free(addr).unwrap();
}

#[test]
fn test_request_beyond_every_pool_fails_cleanly() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let before = allocator.get_stats();

    let err = allocator.alloc(8 * 1024 * 1024).unwrap_err();
    assert!(matches!(err, MemoryError::AllocFailed { .. }));
    assert_eq!(allocator.get_stats(), before);
}

#[test]
fn test_alignment_of_returned_addresses() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    for size in [1, 3, 17, 100, 200, 5000, 100_000] {
        let addr = allocator.alloc(size).unwrap();
        assert_eq!(addr % 16, 0, "unaligned address for size {}", size);
        allocator.free(addr).unwrap();
    }
}

#[test]
fn test_free_alloc_round_trip_restores_stats() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let before = allocator.get_stats();
    let addr = allocator.alloc(4096).unwrap();
    allocator.free(addr).unwrap();
    assert_eq!(allocator.get_stats(), before);
}

#[test]
fn test_free_of_unknown_address_is_rejected() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let before = allocator.get_stats();
    assert!(matches!(
        allocator.free(0xDEAD_BEE0),
        Err(MemoryError::InvalidFree(_))
    ));
    assert_eq!(allocator.get_stats(), before);
}

#[test]
fn test_free_null_is_noop() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    allocator.free(0).unwrap();
}

#[test]
fn test_realloc_null_behaves_like_alloc() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let addr = allocator.realloc(0, 4096).unwrap();
    assert_ne!(addr, 0);
    allocator.free(addr).unwrap();
}

#[test]
fn test_realloc_zero_behaves_like_free() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let before = allocator.get_stats();
    let addr = allocator.alloc(4096).unwrap();
    assert_eq!(allocator.realloc(addr, 0).unwrap(), 0);
    assert_eq!(allocator.get_stats(), before);
}

#[test]
fn test_realloc_same_size_is_identity() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let addr = allocator.alloc(2048).unwrap();
    allocator.write_bytes(addr, &[0x7E; 2048]).unwrap();

    let same = allocator.realloc(addr, 2048).unwrap();
    assert_eq!(same, addr);
    assert_eq!(allocator.read_bytes(addr, 2048).unwrap(), vec![0x7E; 2048]);
    allocator.free(addr).unwrap();
}

#[test]
fn test_realloc_move_preserves_payload_prefix() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let addr = allocator.alloc(1000).unwrap();
    let payload: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
    allocator.write_bytes(addr, &payload).unwrap();
    let _wall = allocator.alloc(200).unwrap();

    let grown = allocator.realloc(addr, 300_000).unwrap();
    assert_eq!(allocator.read_bytes(grown, 1000).unwrap(), payload);
    allocator.free(grown).unwrap();
    allocator.free(_wall).unwrap();
}

#[test]
fn test_create_registers_and_destroy_unregisters() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let pool = allocator.create(32 * 1024).unwrap();
    assert_eq!(allocator.small_pool_count(), 3);

    let addr = allocator.alloc_from(&pool, 256).unwrap();
    assert!(allocator.contains(&pool, addr));
    allocator.free_to(&pool, addr).unwrap();

    allocator.destroy(&pool).unwrap();
    assert_eq!(allocator.small_pool_count(), 2);
    // The slot is reusable afterwards
    let again = allocator.create(32 * 1024).unwrap();
    assert_eq!(allocator.small_pool_count(), 3);
    allocator.destroy(&again).unwrap();
}

#[test]
fn test_registry_full_fails_without_side_effects() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let _a = allocator.create(32 * 1024).unwrap();
    let _b = allocator.create(32 * 1024).unwrap();
    assert_eq!(allocator.small_pool_count(), 4);

    let err = allocator.create(32 * 1024).unwrap_err();
    assert!(matches!(err, MemoryError::RegistryFull { max: 4 }));
    assert_eq!(allocator.small_pool_count(), 4);
}

#[test]
fn test_destroy_of_large_pool_is_rejected() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let large = allocator.large_pool();
    assert_eq!(allocator.destroy(&large), Err(MemoryError::InvalidPool));
}

#[test]
fn test_double_destroy_is_rejected() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let pool = allocator.create(32 * 1024).unwrap();
    allocator.destroy(&pool).unwrap();
    assert_eq!(allocator.destroy(&pool), Err(MemoryError::InvalidPool));
}

#[test]
fn test_stats_usage_percentage() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let addr = allocator.alloc(1024).unwrap();

    let stats = allocator.stats();
    assert_eq!(stats.total_used, BLOCK_HEADER_SIZE + 1024);
    assert!(stats.usage_percentage > 0.0);
    assert_eq!(stats.small_pool_count, 2);
    allocator.free(addr).unwrap();

    let stats = allocator.stats();
    assert_eq!(stats.total_used, 0);
}

#[test]
fn test_trait_object_surface() {
    let allocator = PoolAllocator::new(small_config()).unwrap();
    let dyn_alloc: &dyn Allocator = &allocator;
    let dyn_info: &dyn MemoryInfo = &allocator;

    let addr = dyn_alloc.alloc(512).unwrap();
    assert!(dyn_info.stats().total_used > 0);
    dyn_alloc.free(addr).unwrap();
    assert_eq!(dyn_info.get_stats().1, 0);
}

#[test]
fn test_concurrent_allocations_across_threads() {
    use std::sync::Arc;
    use std::thread;

    let allocator = Arc::new(PoolAllocator::new(small_config()).unwrap());
    let mut handles = vec![];

    for _ in 0..8 {
        let allocator = Arc::clone(&allocator);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let addr = allocator.alloc(512).unwrap();
                allocator.free(addr).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let (_, used) = allocator.get_stats();
    assert_eq!(used, 0);
}
