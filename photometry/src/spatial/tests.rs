//! Tests for the spatial module (k-d tree and keyed index).

use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn brute_force_nearest(points: &[DVec2], query: DVec2) -> Neighbor {
    let mut best = Neighbor {
        index: usize::MAX,
        dist_sq: f64::INFINITY,
    };
    for (index, &p) in points.iter().enumerate() {
        let dist_sq = query.distance_squared(p);
        if dist_sq < best.dist_sq {
            best = Neighbor { index, dist_sq };
        }
    }
    best
}

// ---------------------------------------------------------------------------
// KdTree
// ---------------------------------------------------------------------------

#[test]
fn test_kdtree_build_empty() {
    assert!(KdTree::build(&[]).is_none());
}

#[test]
fn test_kdtree_nearest_finds_exact_point() {
    let points = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(10.0, 10.0),
        DVec2::new(5.0, 5.0),
    ];
    let tree = KdTree::build(&points).unwrap();

    let hit = tree.nearest(DVec2::new(5.0, 5.0));
    assert_eq!(hit.index, 2);
    assert!(hit.dist_sq < 1e-12);
}

#[test]
fn test_kdtree_nearest_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(2024);
    let points: Vec<DVec2> = (0..300)
        .map(|_| DVec2::new(rng.random::<f64>() * 1000.0, rng.random::<f64>() * 1000.0))
        .collect();
    let tree = KdTree::build(&points).unwrap();

    for _ in 0..500 {
        let query = DVec2::new(
            rng.random::<f64>() * 1100.0 - 50.0,
            rng.random::<f64>() * 1100.0 - 50.0,
        );
        let expected = brute_force_nearest(&points, query);
        let hit = tree.nearest(query);
        assert_eq!(hit.index, expected.index, "query {query}");
        assert_eq!(hit.dist_sq, expected.dist_sq);
    }
}

#[test]
fn test_kdtree_nearest_tie_resolves_to_lowest_index() {
    // Query sits exactly between the points; every layout must agree.
    let points = vec![
        DVec2::new(4.0, 0.0),
        DVec2::new(0.0, 0.0),
        DVec2::new(2.0, 2.0),
        DVec2::new(2.0, -2.0),
    ];
    let tree = KdTree::build(&points).unwrap();
    let hit = tree.nearest(DVec2::new(2.0, 0.0));
    assert_eq!(hit.index, 0);
    assert_eq!(hit.dist_sq, 4.0);
}

#[test]
fn test_kdtree_radius_search_sorted() {
    let points = vec![
        DVec2::new(0.0, 0.0),
        DVec2::new(1.0, 0.0),
        DVec2::new(0.0, 1.5),
        DVec2::new(5.0, 5.0),
        DVec2::new(10.0, 10.0),
    ];
    let tree = KdTree::build(&points).unwrap();

    let found: Vec<usize> = tree
        .radius_search(DVec2::new(0.0, 0.0), 2.0)
        .iter()
        .map(|n| n.index)
        .collect();
    assert_eq!(found, vec![0, 1, 2]);

    assert!(tree.radius_search(DVec2::new(20.0, 0.0), 1.0).is_empty());
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

#[test]
fn test_index_empty_has_no_nearest() {
    let mut index: SpatialIndex<u32> = SpatialIndex::new();
    assert!(index.nearest(DVec2::ZERO, 100.0).is_none());
    assert!(index.within(DVec2::ZERO, 100.0).is_empty());
}

#[test]
fn test_index_nearest_respects_tolerance() {
    let mut index = SpatialIndex::new();
    index.insert(1u32, DVec2::new(10.0, 10.0));
    index.insert(2u32, DVec2::new(50.0, 50.0));

    let (key, dist) = index.nearest(DVec2::new(12.0, 10.0), 3.0).unwrap();
    assert_eq!(key, 1);
    assert!((dist - 2.0).abs() < 1e-12);

    // Exactly at tolerance still matches; beyond it does not.
    assert!(index.nearest(DVec2::new(13.0, 10.0), 3.0).is_some());
    assert!(index.nearest(DVec2::new(13.5, 10.0), 3.0).is_none());
}

#[test]
fn test_index_rebuilds_after_mutation() {
    let mut index = SpatialIndex::new();
    index.insert('a', DVec2::new(0.0, 0.0));
    assert_eq!(index.nearest(DVec2::new(1.0, 0.0), 5.0).map(|h| h.0), Some('a'));

    index.insert('b', DVec2::new(1.0, 0.0));
    assert_eq!(index.nearest(DVec2::new(1.0, 0.0), 5.0).map(|h| h.0), Some('b'));

    assert_eq!(index.remove('b'), Some(DVec2::new(1.0, 0.0)));
    assert_eq!(index.nearest(DVec2::new(1.0, 0.0), 5.0).map(|h| h.0), Some('a'));
    assert_eq!(index.len(), 1);
}

#[test]
fn test_index_remove_is_idempotent() {
    let mut index = SpatialIndex::new();
    index.insert(7u64, DVec2::new(3.0, 4.0));
    assert!(index.remove(7).is_some());
    assert!(index.remove(7).is_none());
    assert!(index.is_empty());
    assert!(index.nearest(DVec2::new(3.0, 4.0), 1.0).is_none());
}

#[test]
fn test_index_tie_prefers_earliest_insertion() {
    let mut index = SpatialIndex::new();
    index.insert(30u32, DVec2::new(2.0, 0.0));
    index.insert(10u32, DVec2::new(-2.0, 0.0));
    index.insert(20u32, DVec2::new(0.0, 2.0));

    assert_eq!(index.nearest(DVec2::ZERO, 3.0).map(|h| h.0), Some(30));

    // Removing the first key shifts the tie to the next-oldest one.
    index.remove(30);
    assert_eq!(index.nearest(DVec2::ZERO, 3.0).map(|h| h.0), Some(10));
}

#[test]
fn test_index_within_and_position() {
    let mut index = SpatialIndex::new();
    index.insert(1u8, DVec2::new(0.0, 0.0));
    index.insert(2u8, DVec2::new(3.0, 0.0));
    index.insert(3u8, DVec2::new(30.0, 0.0));

    let keys: Vec<u8> = index.within(DVec2::new(1.0, 0.0), 5.0).iter().map(|h| h.0).collect();
    assert_eq!(keys, vec![1, 2]);
    assert_eq!(index.position(3), Some(DVec2::new(30.0, 0.0)));
    assert_eq!(index.position(9), None);
}
