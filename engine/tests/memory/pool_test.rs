/*!
 * Pool Heap Tests
 * Block chain shape, accounting, coalescing, and in-place reallocation
 */

use lexis_engine::core::limits::BLOCK_HEADER_SIZE;
use lexis_engine::memory::{MemoryError, PoolAllocator, PoolConfig};
use pretty_assertions::assert_eq;

fn allocator() -> PoolAllocator {
    PoolAllocator::new(
        PoolConfig::default()
            .with_max_pools(4)
            .with_initial_pools(0),
    )
    .unwrap()
}

#[test]
fn test_fresh_pool_is_one_free_block() {
    let allocator = allocator();
    let pool = allocator.create(64 * 1024).unwrap();

    let blocks = pool.blocks();
    assert_eq!(blocks.len(), 1);
    assert!(!blocks[0].in_use);
    assert_eq!(pool.used_size(), 0);
}

#[test]
fn test_used_size_matches_live_blocks() {
    let allocator = allocator();
    let pool = allocator.create(64 * 1024).unwrap();

    let a = allocator.alloc_from(&pool, 100).unwrap();
    let b = allocator.alloc_from(&pool, 300).unwrap();

    // Every in-use block accounts for its header plus its payload
    let expected: usize = pool
        .blocks()
        .iter()
        .filter(|block| block.in_use)
        .map(|block| BLOCK_HEADER_SIZE + block.payload_size)
        .sum();
    assert_eq!(pool.used_size(), expected);

    allocator.free_to(&pool, a).unwrap();
    allocator.free_to(&pool, b).unwrap();
    assert_eq!(pool.used_size(), 0);
}

#[test]
fn test_chain_is_address_ordered() {
    let allocator = allocator();
    let pool = allocator.create(64 * 1024).unwrap();

    let _a = allocator.alloc_from(&pool, 64).unwrap();
    let b = allocator.alloc_from(&pool, 64).unwrap();
    let _c = allocator.alloc_from(&pool, 64).unwrap();
    allocator.free_to(&pool, b).unwrap();

    let blocks = pool.blocks();
    for pair in blocks.windows(2) {
        assert!(pair[1].offset > pair[0].offset);
    }
}

#[test]
fn test_no_adjacent_free_blocks_after_free() {
    let allocator = allocator();
    let pool = allocator.create(64 * 1024).unwrap();

    let addrs: Vec<_> = (0..8)
        .map(|_| allocator.alloc_from(&pool, 128).unwrap())
        .collect();
    // Free every other block, then their neighbors
    for addr in addrs.iter().step_by(2) {
        allocator.free_to(&pool, *addr).unwrap();
    }
    for addr in addrs.iter().skip(1).step_by(2) {
        allocator.free_to(&pool, *addr).unwrap();
    }

    let blocks = pool.blocks();
    for pair in blocks.windows(2) {
        assert!(
            pair[0].in_use || pair[1].in_use,
            "adjacent free blocks survived coalescing"
        );
    }
    assert_eq!(blocks.len(), 1);
}

#[test]
fn test_alloc_from_failure_leaves_pool_usable() {
    let allocator = allocator();
    let pool = allocator.create(1024).unwrap();

    let err = allocator.alloc_from(&pool, 64 * 1024).unwrap_err();
    assert!(matches!(err, MemoryError::AllocFailed { .. }));

    let addr = allocator.alloc_from(&pool, 64).unwrap();
    allocator.free_to(&pool, addr).unwrap();
    assert_eq!(pool.used_size(), 0);
}

#[test]
fn test_free_to_wrong_pool_is_rejected() {
    let allocator = allocator();
    let a = allocator.create(4096).unwrap();
    let b = allocator.create(4096).unwrap();

    let addr = allocator.alloc_from(&a, 64).unwrap();
    assert!(matches!(
        allocator.free_to(&b, addr),
        Err(MemoryError::InvalidFree(_))
    ));
    // Still owned by a, still freeable there
    allocator.free_to(&a, addr).unwrap();
}

#[test]
fn test_realloc_from_grows_in_place_when_neighbor_is_free() {
    let allocator = allocator();
    let pool = allocator.create(64 * 1024).unwrap();

    let addr = allocator.alloc_from(&pool, 512).unwrap();
    let grown = allocator.realloc_from(&pool, addr, 4096).unwrap();
    assert_eq!(grown, addr);
}

#[test]
fn test_realloc_from_moves_when_blocked() {
    let allocator = allocator();
    let pool = allocator.create(64 * 1024).unwrap();

    let addr = allocator.alloc_from(&pool, 512).unwrap();
    allocator.write_bytes(addr, &[0xAB; 512]).unwrap();
    let _wall = allocator.alloc_from(&pool, 64).unwrap();

    let moved = allocator.realloc_from(&pool, addr, 8192).unwrap();
    assert_ne!(moved, addr);
    assert!(pool.contains(moved));
    assert_eq!(allocator.read_bytes(moved, 512).unwrap(), vec![0xAB; 512]);
}

#[test]
fn test_realloc_of_freed_block_is_rejected() {
    let allocator = allocator();
    let pool = allocator.create(4096).unwrap();

    let addr = allocator.alloc_from(&pool, 64).unwrap();
    allocator.free_to(&pool, addr).unwrap();
    assert!(matches!(
        allocator.realloc_from(&pool, addr, 128),
        Err(MemoryError::BlockNotInUse(_))
    ));
}

#[test]
fn test_defragment_is_idempotent() {
    let allocator = allocator();
    let pool = allocator.create(64 * 1024).unwrap();

    let addrs: Vec<_> = (0..6)
        .map(|_| allocator.alloc_from(&pool, 256).unwrap())
        .collect();
    for addr in &addrs {
        allocator.free_to(&pool, *addr).unwrap();
    }

    let merges = allocator.defragment(&pool);
    let blocks = pool.blocks();
    assert_eq!(allocator.defragment(&pool), 0);
    assert_eq!(pool.blocks(), blocks);
    // Eager coalescing had already collapsed everything
    assert_eq!(merges, 0);
    assert_eq!(blocks.len(), 1);
}

#[test]
fn test_contains_is_range_exact() {
    let allocator = allocator();
    let pool = allocator.create(4096).unwrap();

    assert!(allocator.contains(&pool, pool.base()));
    assert!(allocator.contains(&pool, pool.base() + 4095));
    assert!(!allocator.contains(&pool, pool.base() + 4096));
}
