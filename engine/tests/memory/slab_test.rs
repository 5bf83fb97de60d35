/*!
 * Slab Cache Tests
 * Routing of small classes through the façade
 */

use lexis_engine::memory::{PoolAllocator, PoolConfig};
use pretty_assertions::assert_eq;

fn allocator() -> PoolAllocator {
    PoolAllocator::new(PoolConfig::default().with_objects_per_slab(8)).unwrap()
}

#[test]
fn test_small_sizes_route_to_matching_class() {
    let allocator = allocator();

    for (request, class) in [(1, 16), (16, 16), (17, 32), (100, 128), (128, 128)] {
        let addr = allocator.alloc(request).unwrap();
        assert_eq!(allocator.slab_class_of(addr), Some(class));
        allocator.free(addr).unwrap();
    }
}

#[test]
fn test_zero_byte_allocation_routes_to_smallest_class() {
    let allocator = allocator();
    let addr = allocator.alloc(0).unwrap();
    assert_eq!(allocator.slab_class_of(addr), Some(16));
    allocator.free(addr).unwrap();
}

#[test]
fn test_slab_bytes_do_not_count_as_pool_usage() {
    let allocator = allocator();
    let addr = allocator.alloc(64).unwrap();
    let (_, used) = allocator.get_stats();
    assert_eq!(used, 0);
    allocator.free(addr).unwrap();
}

#[test]
fn test_free_count_tracks_alloc_and_free() {
    let allocator = allocator();

    let addrs: Vec<_> = (0..8).map(|_| allocator.alloc(32).unwrap()).collect();
    let counts = allocator.slab_free_counts();
    assert_eq!(counts.iter().find(|(size, _)| *size == 32).unwrap().1, 0);

    for addr in &addrs {
        allocator.free(*addr).unwrap();
    }
    let counts = allocator.slab_free_counts();
    assert_eq!(counts.iter().find(|(size, _)| *size == 32).unwrap().1, 8);
}

#[test]
fn test_freed_object_is_reused_first() {
    let allocator = allocator();
    let a = allocator.alloc(48).unwrap();
    allocator.free(a).unwrap();
    let b = allocator.alloc(48).unwrap();
    assert_eq!(a, b);
    allocator.free(b).unwrap();
}

#[test]
fn test_class_grows_past_one_slab() {
    let allocator = allocator();
    let addrs: Vec<_> = (0..20).map(|_| allocator.alloc(16).unwrap()).collect();
    let mut unique = addrs.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), addrs.len());
    for addr in addrs {
        allocator.free(addr).unwrap();
    }
}

#[test]
fn test_slab_object_survives_write_and_read() {
    let allocator = allocator();
    let addr = allocator.alloc(64).unwrap();
    allocator.write_bytes(addr, &[0x5A; 64]).unwrap();
    assert_eq!(allocator.read_bytes(addr, 64).unwrap(), vec![0x5A; 64]);
    // Reads crossing the object boundary are rejected
    assert!(allocator.read_bytes(addr, 65).is_err());
    allocator.free(addr).unwrap();
}

#[test]
fn test_realloc_grows_slab_object_into_pool() {
    let allocator = allocator();
    let addr = allocator.alloc(64).unwrap();
    allocator.write_bytes(addr, b"slab-resident data").unwrap();

    let grown = allocator.realloc(addr, 4096).unwrap();
    assert_ne!(grown, addr);
    assert_eq!(allocator.slab_class_of(grown), None);
    assert_eq!(
        allocator.read_bytes(grown, 18).unwrap(),
        b"slab-resident data"
    );
    allocator.free(grown).unwrap();
}
