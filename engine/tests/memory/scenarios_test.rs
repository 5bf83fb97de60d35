/*!
 * End-to-End Scenarios
 * Full lifecycles against the process-global allocator instance
 */

use lexis_engine::memory::global;
use lexis_engine::memory::{MemoryError, PoolConfig};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serial_test::serial;

fn scenario_config() -> PoolConfig {
    PoolConfig::default()
        .with_small_pool_size(1024 * 1024)
        .with_large_pool_size(10 * 1024 * 1024)
        .with_max_pools(2)
        .with_initial_pools(1)
        .with_objects_per_slab(64)
}

fn with_global<F: FnOnce()>(config: PoolConfig, body: F) {
    global::cleanup();
    global::init(config).unwrap();
    body();
    global::cleanup();
}

#[test]
#[serial]
fn test_small_allocation_lands_in_slab_and_counts_nothing() {
    with_global(scenario_config(), || {
        let addr = global::alloc(32).unwrap();
        assert_eq!(global::slab_class_of(addr).unwrap(), Some(32));

        let (_, used) = global::get_stats().unwrap();
        assert_eq!(used, 0);
        global::free(addr).unwrap();
    });
}

#[test]
#[serial]
fn test_first_fit_reclaims_the_earliest_hole() {
    with_global(scenario_config(), || {
        let p1 = global::alloc(200).unwrap();
        let _p2 = global::alloc(200).unwrap();
        global::free(p1).unwrap();
        let p3 = global::alloc(200).unwrap();
        assert_eq!(p3, p1);
    });
}

#[test]
#[serial]
fn test_realloc_shrink_then_grow() {
    with_global(scenario_config(), || {
        let p = global::alloc(1000).unwrap();
        let payload: Vec<u8> = (0..1000).map(|i| (i % 199) as u8).collect();
        global::write_bytes(p, &payload).unwrap();

        let p2 = global::realloc(p, 500).unwrap();
        assert_eq!(p2, p);

        let p3 = global::realloc(p2, 2000).unwrap();
        // The neighbor was free, so the block grew in place; either way the
        // first thousand bytes survive.
        assert_eq!(global::read_bytes(p3, 1000).unwrap(), payload);
        global::free(p3).unwrap();
    });
}

#[test]
#[serial]
fn test_random_drain_collapses_the_large_pool() {
    let config = PoolConfig::default()
        .with_large_pool_size(10 * 1024 * 1024)
        .with_max_pools(0)
        .with_initial_pools(0);

    with_global(config, || {
        let mut rng = StdRng::seed_from_u64(0xA11C_0DE5);
        let mut live = Vec::new();

        for _ in 0..10_000 {
            let size = rng.gen_range(1..=4096usize);
            match global::alloc(size) {
                Ok(addr) => live.push(addr),
                Err(MemoryError::AllocFailed { .. }) => {
                    // Drain half the live set and keep going
                    for addr in live.drain(..live.len() / 2) {
                        global::free(addr).unwrap();
                    }
                }
                Err(err) => panic!("unexpected error: {}", err),
            }
            if live.len() > 64 && rng.gen_bool(0.5) {
                let addr = live.swap_remove(rng.gen_range(0..live.len()));
                global::free(addr).unwrap();
            }
        }
        for addr in live.drain(..) {
            global::free(addr).unwrap();
        }

        let (_, used) = global::get_stats().unwrap();
        assert_eq!(used, 0);
    });
}

#[test]
#[serial]
fn test_destroyed_pool_addresses_go_dark() {
    with_global(scenario_config(), || {
        let pool = global::create(512 * 1024).unwrap();
        let addr = global::alloc_from(&pool, 1024).unwrap();
        assert!(global::contains(&pool, addr));
        assert!(global::read_bytes(addr, 16).is_ok());

        global::destroy(&pool).unwrap();
        // The allocator no longer knows the address
        assert!(matches!(
            global::free(addr),
            Err(MemoryError::InvalidFree(_))
        ));
        assert!(global::read_bytes(addr, 16).is_err());
    });
}

#[test]
#[serial]
fn test_lifecycle_outside_init_window_fails() {
    global::cleanup();
    assert_eq!(global::alloc(64), Err(MemoryError::NotInitialized));
    assert_eq!(global::free(0x4000), Err(MemoryError::NotInitialized));
    assert_eq!(global::get_stats(), Err(MemoryError::NotInitialized));
}

#[test]
#[serial]
fn test_double_init_is_rejected() {
    with_global(scenario_config(), || {
        assert_eq!(
            global::init(scenario_config()),
            Err(MemoryError::AlreadyInitialized)
        );
    });
}

#[test]
#[serial]
fn test_global_roundtrip_leaves_stats_unchanged() {
    with_global(scenario_config(), || {
        let before = global::get_stats().unwrap();
        let addr = global::alloc(4096).unwrap();
        global::free(addr).unwrap();
        assert_eq!(global::get_stats().unwrap(), before);
    });
}
