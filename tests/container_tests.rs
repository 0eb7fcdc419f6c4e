//! Scenario and boundary tests for the four containers.
//!
//! Node widths are kept tiny (3-5) so every structural path - small-root
//! growth, biased splits, sibling rebalances, merges, root shrink - fires
//! within a handful of keys.

#![allow(clippy::unwrap_used)]

mod common;

use packtree::{BTreeMap, BTreeMultiMap, BTreeMultiSet, BTreeSet, LessThan, OrdCompare};

type TinySet = BTreeSet<i32, OrdCompare, 3>;
type TinyMultiSet = BTreeMultiSet<i32, OrdCompare, 3>;

// ============================================================================
//  Split and growth scenarios
// ============================================================================

/// The first three inserts fit the growing root leaf; the fourth forces
/// the first split and the tree gains an internal root.
#[test]
fn ascending_inserts_split_at_width_three() {
    common::init_tracing();
    let mut set = TinySet::new();

    for k in [10, 20, 30] {
        assert!(set.insert(k));
        set.verify();
    }
    assert_eq!(set.height(), 1);
    assert_eq!(set.leaf_node_count(), 1);

    assert!(set.insert(40));
    set.verify();
    assert_eq!(set.height(), 2);
    assert_eq!(set.leaf_node_count(), 2);
    assert_eq!(set.internal_node_count(), 1);

    set.insert(50);
    set.insert(60);
    set.verify();
    assert_eq!(set.len(), 6);
    // Ascending input packs the right edge; no third leaf yet.
    assert_eq!(set.leaf_node_count(), 2);

    let keys: Vec<i32> = set.iter().copied().collect();
    assert_eq!(keys, [10, 20, 30, 40, 50, 60]);
}

/// A full rightmost leaf with slack in its left sibling rebalances
/// instead of splitting.
#[test]
fn insert_rebalances_into_left_sibling_before_splitting() {
    let mut set = TinySet::new();
    set.extend([10, 20, 30, 40, 50, 60]);
    assert_eq!(set.leaf_node_count(), 2);

    // Right leaf is full, left holds two: 70 shifts a value left.
    set.insert(70);
    set.verify();
    assert_eq!(set.len(), 7);
    assert_eq!(set.leaf_node_count(), 2);

    let keys: Vec<i32> = set.iter().copied().collect();
    assert_eq!(keys, [10, 20, 30, 40, 50, 60, 70]);
}

/// Strictly ascending insertion keeps nodes packed: the far-right split
/// bias sends nothing to the new sibling, which the next inserts fill.
#[test]
fn ascending_insertion_keeps_fullness_high() {
    let mut set: BTreeSet<i32, OrdCompare, 5> = BTreeSet::new();
    set.extend(0..500);
    set.verify();
    assert_eq!(set.len(), 500);
    assert!(
        set.fullness() > 0.7,
        "ascending fill left fullness at {}",
        set.fullness()
    );
}

// ============================================================================
//  Erase scenarios
// ============================================================================

/// Erasing a separator swaps it with its in-order predecessor (always on
/// a leaf) and erases there.
#[test]
fn erase_value_held_on_internal_node() {
    let mut set = TinySet::new();
    set.extend([10, 20, 30, 40, 50, 60]);

    // 30 is the root separator after the ascending build.
    assert!(set.remove(&30));
    set.verify();
    let keys: Vec<i32> = set.iter().copied().collect();
    assert_eq!(keys, [10, 20, 40, 50, 60]);

    // Again: the new separator's erase drains a leaf and refills it from
    // its sibling.
    assert!(set.remove(&20));
    set.verify();
    let keys: Vec<i32> = set.iter().copied().collect();
    assert_eq!(keys, [10, 40, 50, 60]);
}

/// Removing a duplicate unique insert is a no-op and size is unchanged.
#[test]
fn duplicate_unique_insert_is_a_noop() {
    let mut set = TinySet::new();
    set.extend([10, 20, 30, 40, 50]);
    let len = set.len();

    assert!(!set.insert(20));
    set.verify();
    assert_eq!(set.len(), len);
    assert!(set.contains(&20));
}

/// Draining every key from the front visits each exactly once and ends
/// empty, shrinking the tree level by level.
#[test]
fn drain_from_the_front_visits_each_key_once() {
    let mut set: BTreeSet<i32, OrdCompare, 3> = (0..100).collect();
    let mut visited = Vec::new();

    loop {
        let first = set.iter().next().copied();
        let Some(k) = first else { break };
        assert!(set.remove(&k));
        visited.push(k);
        set.verify();
    }

    assert!(set.is_empty());
    assert_eq!(set.height(), 0);
    assert_eq!(visited, (0..100).collect::<Vec<_>>());
}

/// Symmetric drain from the back, exercising the left-sibling refill
/// preference.
#[test]
fn drain_from_the_back_visits_each_key_once() {
    let mut set: BTreeSet<i32, OrdCompare, 3> = (0..100).collect();
    let mut visited = Vec::new();

    loop {
        let last = set.iter().next_back().copied();
        let Some(k) = last else { break };
        assert!(set.remove(&k));
        visited.push(k);
        set.verify();
    }

    assert!(set.is_empty());
    visited.reverse();
    assert_eq!(visited, (0..100).collect::<Vec<_>>());
}

/// The container is fully reusable after emptying out.
#[test]
fn reuse_after_clear_and_after_drain() {
    let mut set = TinySet::new();
    set.extend(0..50);
    set.clear();
    assert!(set.is_empty());
    set.verify();

    set.extend(25..75);
    set.verify();
    assert_eq!(set.len(), 50);
    assert_eq!(set.iter().next(), Some(&25));
}

// ============================================================================
//  Multi-key scenarios
// ============================================================================

/// Four equal keys in a width-3 multiset: all stored, all counted, all
/// erased in one call.
#[test]
fn multiset_stores_and_erases_equal_run() {
    let mut bag = TinyMultiSet::new();
    for _ in 0..4 {
        bag.insert(5);
        bag.verify();
    }

    let keys: Vec<i32> = bag.iter().copied().collect();
    assert_eq!(keys, [5, 5, 5, 5]);
    assert_eq!(bag.count(&5), 4);

    assert_eq!(bag.remove_all(&5), 4);
    bag.verify();
    assert!(bag.is_empty());
}

/// `remove_all` takes exactly the equal run and nothing else.
#[test]
fn multiset_range_erase_leaves_neighbors() {
    let mut bag = TinyMultiSet::new();
    bag.extend([1, 7, 7, 2, 7, 3, 7, 7]);
    assert_eq!(bag.count(&7), 5);

    assert_eq!(bag.remove_all(&7), 5);
    bag.verify();
    let keys: Vec<i32> = bag.iter().copied().collect();
    assert_eq!(keys, [1, 2, 3]);
    assert_eq!(bag.remove_all(&7), 0);
}

/// `equal_range` brackets exactly `count` entries.
#[test]
fn multiset_equal_range_brackets_the_run() {
    let mut bag = TinyMultiSet::new();
    bag.extend([1, 2, 2, 2, 3]);

    let run: Vec<i32> = bag.equal_range(&2).copied().collect();
    assert_eq!(run, [2, 2, 2]);
    assert_eq!(bag.equal_range(&9).count(), 0);
    assert_eq!(bag.lower_bound(&2).count(), 4);
    assert_eq!(bag.upper_bound(&2).count(), 1);
}

// ============================================================================
//  Comparators
// ============================================================================

/// A stateful prefix comparator survives the whole search path: nothing
/// default-reconstructs it mid-descent.
#[test]
fn prefix_comparator_state_survives_search() {
    let prefix = 3usize;
    let by_prefix = LessThan::new(move |a: &&str, b: &&str| {
        a.as_bytes().iter().take(prefix).lt(b.as_bytes().iter().take(prefix))
    });

    let mut set = BTreeSet::<&str, _, 3>::with_compare(by_prefix);
    assert!(set.insert("aab"));
    assert!(set.insert("abb"));

    // "aaa" < "aab" < "abb" under the 3-byte prefix ordering.
    assert_eq!(set.upper_bound(&"aaa").next().copied(), Some("aab"));
    // Equal prefix means equal key.
    assert!(!set.insert("aabzzz"));
    assert_eq!(set.len(), 2);
}

/// `swap` exchanges comparators along with contents, so later inserts
/// order by the other tree's predicate.
#[test]
fn swap_exchanges_contents_and_comparators() {
    fn asc(a: &i32, b: &i32) -> bool {
        a < b
    }
    fn desc(a: &i32, b: &i32) -> bool {
        a > b
    }
    type Cmp = LessThan<fn(&i32, &i32) -> bool>;

    let mut forward: BTreeSet<i32, Cmp, 4> = BTreeSet::with_compare(LessThan::new(asc));
    let mut backward: BTreeSet<i32, Cmp, 4> = BTreeSet::with_compare(LessThan::new(desc));
    forward.extend([1, 2, 3]);
    backward.extend([1, 2, 3]);
    assert_eq!(forward.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
    assert_eq!(backward.iter().copied().collect::<Vec<_>>(), [3, 2, 1]);

    forward.swap(&mut backward);
    forward.verify();
    backward.verify();

    // `forward` now descends; inserting 0 must sort last, not first.
    forward.insert(0);
    assert_eq!(forward.iter().copied().collect::<Vec<_>>(), [3, 2, 1, 0]);
    backward.insert(0);
    assert_eq!(backward.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3]);
}

// ============================================================================
//  Iteration
// ============================================================================

/// Walking a few thousand elements by successor matches index identity in
/// both directions.
#[test]
fn iterator_walk_matches_index_identity() {
    let set: BTreeSet<i32, OrdCompare, 5> = (0..2341).collect();
    set.verify();

    for (i, k) in set.iter().enumerate() {
        assert_eq!(*k, i as i32);
    }
    for (i, k) in set.iter().rev().enumerate() {
        assert_eq!(*k, 2340 - i as i32);
    }
    assert_eq!(set.iter().count(), 2341);
}

/// Interleaving front and back pulls partitions the sequence exactly.
#[test]
fn meet_in_the_middle_iteration() {
    let set: BTreeSet<i32, OrdCompare, 4> = (0..101).collect();
    let mut iter = set.iter();
    let mut front = Vec::new();
    let mut back = Vec::new();

    loop {
        match iter.next() {
            Some(k) => front.push(*k),
            None => break,
        }
        match iter.next_back() {
            Some(k) => back.push(*k),
            None => break,
        }
    }

    back.reverse();
    front.extend(back);
    assert_eq!(front, (0..101).collect::<Vec<_>>());
}

// ============================================================================
//  Maps
// ============================================================================

/// Unique map: no-overwrite insert, lookup, update through `get_mut`.
#[test]
fn map_insert_lookup_update() {
    let mut map: BTreeMap<i32, String, OrdCompare, 4> = BTreeMap::new();
    assert!(map.insert(2, "two".to_owned()));
    assert!(map.insert(1, "one".to_owned()));
    assert!(!map.insert(2, "deux".to_owned()));
    map.verify();

    assert_eq!(map.get(&2).map(String::as_str), Some("two"));
    map.get_mut(&2).unwrap().push('!');
    assert_eq!(map.get(&2).map(String::as_str), Some("two!"));
    assert_eq!(map.remove(&2).as_deref(), Some("two!"));
    assert!(!map.contains_key(&2));
}

/// `get_or_default` inserts lazily and leaves existing entries alone.
#[test]
fn map_get_or_default_is_lazy() {
    let mut map: BTreeMap<i32, u32, OrdCompare, 4> = BTreeMap::new();

    *map.get_or_default(7) += 1;
    *map.get_or_default(7) += 1;
    assert_eq!(map.get(&7), Some(&2));
    assert_eq!(map.len(), 1);

    for k in 0..50 {
        *map.get_or_default(k) += 1;
    }
    map.verify();
    assert_eq!(map.len(), 50);
    assert_eq!(map.get(&7), Some(&3));
}

/// Keys stay immutable through `iter_mut`; mapped values change in place.
#[test]
fn map_iter_mut_updates_values_in_order() {
    let mut map: BTreeMap<i32, u64, OrdCompare, 4> = (0..40).map(|k| (k, k as u64)).collect();

    for (k, v) in map.iter_mut() {
        *v = *v * 2 + u64::from(*k == 0);
    }
    map.verify();

    assert_eq!(map.get(&0), Some(&1));
    assert_eq!(map.get(&10), Some(&20));
    let keys: Vec<i32> = map.keys().copied().collect();
    assert_eq!(keys, (0..40).collect::<Vec<_>>());
    let doubled: Vec<u64> = map.values().copied().collect();
    assert_eq!(doubled[39], 78);
}

/// Multimap keeps duplicate keys adjacent and erases the run as a unit.
#[test]
fn multimap_duplicate_keys() {
    let mut map: BTreeMultiMap<&str, i32, OrdCompare, 3> = BTreeMultiMap::new();
    map.insert("b", 1);
    map.insert("a", 2);
    map.insert("b", 3);
    map.insert("b", 4);
    map.verify();

    assert_eq!(map.len(), 4);
    assert_eq!(map.count(&"b"), 3);
    // Insertion order preserved within the equal run.
    let bs: Vec<i32> = map.equal_range(&"b").map(|(_, v)| *v).collect();
    assert_eq!(bs, [1, 3, 4]);

    assert_eq!(map.remove_all(&"b"), 3);
    map.verify();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(&"a"), Some(&2));
}

/// `get_mut` and `remove_first` both target the first entry of an equal
/// run, leaving the rest of the run in place.
#[test]
fn multimap_first_entry_access_and_removal() {
    let mut map: BTreeMultiMap<i32, i32, OrdCompare, 3> = BTreeMultiMap::new();
    for v in [10, 20, 30] {
        map.insert(7, v);
    }
    map.insert(1, 0);

    *map.get_mut(&7).unwrap() += 1;
    assert_eq!(map.get(&7), Some(&11));
    assert_eq!(map.get_mut(&99), None);

    assert_eq!(map.remove_first(&7), Some(11));
    map.verify();
    assert_eq!(map.count(&7), 2);
    let rest: Vec<i32> = map.equal_range(&7).map(|(_, v)| *v).collect();
    assert_eq!(rest, [20, 30]);

    assert_eq!(map.remove_first(&7), Some(20));
    assert_eq!(map.remove_first(&7), Some(30));
    assert_eq!(map.remove_first(&7), None);
    map.verify();
    assert_eq!(map.len(), 1);
}

// ============================================================================
//  Whole-container behavior
// ============================================================================

#[test]
fn empty_container_observations() {
    let set = TinySet::new();
    set.verify();
    assert_eq!(set.len(), 0);
    assert!(set.is_empty());
    assert_eq!(set.height(), 0);
    assert_eq!(set.leaf_node_count(), 0);
    assert_eq!(set.iter().next(), None);
    assert_eq!(set.fullness(), 0.0);
    assert_eq!(set.overhead(), 0.0);
    assert!(set.bytes_used() > 0);

    let mut set = set;
    assert!(!set.remove(&1));
    assert_eq!(set.take(&1), None);
}

#[test]
fn clone_equals_and_detaches() {
    let original: BTreeSet<i32, OrdCompare, 4> = (0..200).collect();
    let copy = original.clone();
    copy.verify();
    assert_eq!(copy, original);

    let mut copy = copy;
    copy.remove(&100);
    assert_ne!(copy, original);
    assert!(original.contains(&100));
}

#[test]
fn dump_renders_every_key_with_levels() {
    let mut set = TinySet::new();
    set.extend([1, 2, 3, 4, 5]);

    let mut out = String::new();
    set.dump(&mut out).unwrap();
    for k in 1..=5 {
        assert!(out.contains(&k.to_string()), "missing key {k} in dump:\n{out}");
    }
    // A two-level tree renders both level tags.
    assert!(out.contains("[0]"));
    assert!(out.contains("[1]"));
}

#[test]
fn memory_accounting_is_monotonic() {
    let mut set: BTreeSet<u64, OrdCompare, 5> = BTreeSet::new();
    let empty_bytes = set.bytes_used();
    set.extend(0..1000);

    assert!(set.bytes_used() > empty_bytes);
    assert!(set.overhead() > 0.0);
    assert!(BTreeSet::<u64, OrdCompare, 5>::average_bytes_per_value() > 8.0);
}
