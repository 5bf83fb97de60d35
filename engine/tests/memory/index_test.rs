/*!
 * Pool Index Tests
 * Red-black invariants and best-fit lookup under churn
 */

use lexis_engine::memory::PoolIndex;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_best_fit_picks_smallest_sufficient_pool() {
    let mut tree = PoolIndex::new();
    tree.insert(512, 0);
    tree.insert(2048, 1);
    tree.insert(8192, 2);

    assert_eq!(tree.best_fit(1), Some(0));
    assert_eq!(tree.best_fit(512), Some(0));
    assert_eq!(tree.best_fit(513), Some(1));
    assert_eq!(tree.best_fit(8192), Some(2));
    assert_eq!(tree.best_fit(8193), None);
}

#[test]
fn test_equal_sizes_resolve_by_id() {
    let mut tree = PoolIndex::new();
    for id in 0..8 {
        tree.insert(1024, id);
    }
    tree.validate();

    // Remove a specific pool; the others keep their identities
    assert!(tree.remove(1024, 5));
    assert!(!tree.remove(1024, 5));
    tree.validate();
    assert_eq!(tree.len(), 7);
    assert!(tree.in_order().iter().all(|&(size, id)| size == 1024 && id != 5));
}

#[test]
fn test_invariants_hold_under_random_churn() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let mut tree = PoolIndex::new();
    let mut live: Vec<(usize, u32)> = Vec::new();

    for id in 0..500u32 {
        let size = rng.gen_range(1..64usize) * 1024;
        tree.insert(size, id);
        live.push((size, id));

        if rng.gen_bool(0.4) && !live.is_empty() {
            let victim = live.swap_remove(rng.gen_range(0..live.len()));
            assert!(tree.remove(victim.0, victim.1));
        }
        tree.validate();
    }

    let mut expected = live.clone();
    expected.sort();
    assert_eq!(tree.in_order(), expected);

    // Best-fit agrees with a linear scan
    for _ in 0..100 {
        let want = rng.gen_range(1..70usize) * 1024;
        let expected_size = live
            .iter()
            .map(|&(size, _)| size)
            .filter(|&size| size >= want)
            .min();
        let got = tree
            .best_fit(want)
            .map(|id| live.iter().find(|&&(_, lid)| lid == id).unwrap().0);
        assert_eq!(got, expected_size);
    }
}

#[test]
fn test_drain_to_empty() {
    let mut tree = PoolIndex::new();
    for id in 0..32 {
        tree.insert((id as usize + 1) * 64, id);
    }
    for id in 0..32 {
        assert!(tree.remove((id as usize + 1) * 64, id));
        tree.validate();
    }
    assert!(tree.is_empty());
    assert_eq!(tree.best_fit(1), None);
}
