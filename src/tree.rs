//! Filepath: src/tree.rs
//!
//! The B-tree engine shared by all four containers.
//!
//! [`BTree`] owns the root and enforces the structural invariants; the
//! public containers in [`crate::set`] and [`crate::map`] are thin facades
//! that fix the value-to-key projection and forward here. Every public
//! operation follows the same two-phase shape: *locate* a `(node,
//! position)` cursor by walking root to leaf, then *act* on it.
//!
//! The tree handle caches three things the hot paths need in O(1): the
//! element count, the leftmost leaf (`begin`), and the rightmost leaf
//! (`end`). The root is structurally an ordinary node whose parent link is
//! `None`.
//!
//! # Invariants
//!
//! Between public calls:
//!
//! 1. every non-root node holds `1..=B` values; the erase walk restores
//!    `B / 2` wherever a removal dips below it (insert-side splits may
//!    leave the growing edge under `B / 2` until later inserts pack it)
//! 2. a leaf root holds `0..=B` values, an internal root `1..=B`
//! 3. keys within a node are in non-decreasing order
//! 4. separators order their child subtrees
//! 5. every leaf sits at the same depth
//! 6. child back-links and positions are coherent
//! 7. the cached size equals the enumerated count
//! 8. the leftmost/rightmost caches agree with traversal
//!
//! [`BTree::verify`] asserts all eight.

use core::fmt;
use core::mem;
use core::ptr::NonNull;

use crate::compare::KeyCompare;
use crate::cursor::{leftmost_leaf, rightmost_leaf, Cursor};
use crate::node::Node;
use crate::params::TreeParams;

mod insert;
mod remove;

/// Trace one structural transition: a split, merge, sibling rebalance,
/// root growth, or height shrink.
///
/// Forwards to the `tracing` crate when the `tracing` feature is on;
/// without it the macro expands to nothing, so release builds carry no
/// logging cost. Filter with `RUST_LOG=packtree=trace`.
#[cfg(feature = "tracing")]
macro_rules! structure_trace {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "tracing"))]
macro_rules! structure_trace {
    ($($arg:tt)*) => {};
}

pub(crate) use structure_trace;

/// Outcome of a root-to-leaf locate.
enum MatchKind {
    /// A three-way comparison hit the key; the cursor is on it.
    Exact,

    /// Three-way search finished without an equal comparison: the key is
    /// definitively absent.
    MissThreeWay,

    /// Two-way search cannot detect equality; the caller decides with one
    /// more comparison at the leaf.
    Unknown,
}

/// The B-tree engine: an ordered sequence of values packed into wide
/// nodes, parameterized by projection `P`, comparator `C`, and node
/// width `B`.
pub(crate) struct BTree<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> {
    /// Root node; `None` for an empty tree.
    root: Option<NonNull<Node<P, B>>>,

    /// Cached first leaf, for O(1) `begin`.
    leftmost: Option<NonNull<Node<P, B>>>,

    /// Cached last leaf, for O(1) `end`.
    rightmost: Option<NonNull<Node<P, B>>>,

    /// Number of stored values.
    size: usize,

    /// The ordering, carried by value: `swap` exchanges it, `assign`
    /// copies it.
    comp: C,
}

// SAFETY: the raw pointers form an owned, unaliased node graph; nothing is
// shared behind them, so the tree moves between threads whenever its
// contents do.
unsafe impl<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> Send for BTree<P, C, B>
where
    P::Value: Send,
    C: Send,
{
}

// SAFETY: shared access only reads through the pointer graph; interior
// mutability does not exist here.
unsafe impl<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> Sync for BTree<P, C, B>
where
    P::Value: Sync,
    C: Sync,
{
}

impl<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> BTree<P, C, B> {
    /// Minimum value count for every node except the root.
    pub(crate) const MIN_COUNT: usize = B / 2;

    pub(crate) fn new(comp: C) -> Self {
        Self {
            root: None,
            leftmost: None,
            rightmost: None,
            size: 0,
            comp,
        }
    }

    // ========================================================================
    //  Observation
    // ========================================================================

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub(crate) fn key_comp(&self) -> &C {
        &self.comp
    }

    /// Cursor to the first value, or the null cursor when empty.
    pub(crate) fn begin(&self) -> Cursor<P, B> {
        match self.leftmost {
            Some(leaf) => Cursor::new(leaf, 0),
            None => Cursor::null(),
        }
    }

    /// Cursor one past the last value: `(rightmost leaf, count)`, or the
    /// null cursor when empty.
    pub(crate) fn end(&self) -> Cursor<P, B> {
        match self.rightmost {
            // SAFETY: the rightmost cache always points at a live leaf.
            Some(leaf) => Cursor::new(leaf, unsafe { leaf.as_ref().count() }),
            None => Cursor::null(),
        }
    }

    /// Levels between the root and the leaves, inclusive; 0 when empty.
    pub(crate) fn height(&self) -> usize {
        let mut h = 0;
        let mut node = self.leftmost;
        while let Some(ptr) = node {
            h += 1;
            // SAFETY: walking live parent links from a leaf to the root.
            node = unsafe { ptr.as_ref().parent() };
        }
        h
    }

    pub(crate) fn leaf_node_count(&self) -> usize {
        self.node_stats().0
    }

    pub(crate) fn internal_node_count(&self) -> usize {
        self.node_stats().1
    }

    pub(crate) fn node_count(&self) -> usize {
        let (leaves, internals) = self.node_stats();
        leaves + internals
    }

    fn node_stats(&self) -> (usize, usize) {
        // SAFETY: read-only walk over the owned node graph.
        unsafe fn count<P: TreeParams, const B: usize>(node: NonNull<Node<P, B>>) -> (usize, usize) {
            let n = node.as_ref();
            if n.is_leaf() {
                return (1, 0);
            }
            let mut stats = (0, 1);
            for &child in n.children() {
                let (l, i) = count(child);
                stats.0 += l;
                stats.1 += i;
            }
            stats
        }

        match self.root {
            Some(root) => unsafe { count(root) },
            None => (0, 0),
        }
    }

    /// Total bytes held by the tree: the handle, every node header, and
    /// every node's value and child storage.
    pub(crate) fn bytes_used(&self) -> usize {
        // SAFETY: read-only walk over the owned node graph.
        unsafe fn bytes<P: TreeParams, const B: usize>(node: NonNull<Node<P, B>>) -> usize {
            let n = node.as_ref();
            let mut total =
                mem::size_of::<Node<P, B>>() + n.max_count() * mem::size_of::<P::Value>();
            if !n.is_leaf() {
                total += (B + 1) * mem::size_of::<NonNull<Node<P, B>>>();
                for &child in n.children() {
                    total += bytes(child);
                }
            }
            total
        }

        let mut total = mem::size_of::<Self>();
        if let Some(root) = self.root {
            total += unsafe { bytes(root) };
        }
        total
    }

    /// Stored values divided by the capacity of the current node set.
    /// 1.0 is perfect packing; lower means slack.
    pub(crate) fn fullness(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.size as f64 / (self.node_count() * B) as f64
    }

    /// Structural bytes per stored value: everything `bytes_used` counts
    /// beyond the raw payload, averaged over the payload.
    pub(crate) fn overhead(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let payload = self.size * mem::size_of::<P::Value>();
        (self.bytes_used() - payload) as f64 / self.size as f64
    }

    /// Expected bytes per value on a leaf at 75% fill, the steady state of
    /// random insertion.
    pub(crate) fn average_bytes_per_value() -> f64 {
        let leaf = mem::size_of::<Node<P, B>>() + B * mem::size_of::<P::Value>();
        leaf as f64 / (B as f64 * 0.75)
    }

    // ========================================================================
    //  Search
    // ========================================================================

    /// Walk root to leaf. With a three-way comparator the walk stops at
    /// the first node reporting an exact match, which may be internal;
    /// otherwise it bottoms out at the leaf lower-bound position.
    fn locate(&self, key: &P::Key) -> (Cursor<P, B>, MatchKind) {
        // SAFETY: descending owned child links of a live tree.
        unsafe {
            let mut ptr = self.root.expect("locate on an empty tree");
            loop {
                let node = ptr.as_ref();
                let res = node.lower_bound(key, &self.comp);
                if res.exact {
                    return (Cursor::new(ptr, res.index), MatchKind::Exact);
                }
                if node.is_leaf() {
                    let kind = if C::THREE_WAY {
                        MatchKind::MissThreeWay
                    } else {
                        MatchKind::Unknown
                    };
                    return (Cursor::new(ptr, res.index), kind);
                }
                ptr = node.child(res.index);
            }
        }
    }

    /// Leaf-level lower bound, climbed off end-of-node positions; the null
    /// cursor when every value is less than `key`.
    fn lower_bound_raw(&self, key: &P::Key) -> Cursor<P, B> {
        let Some(mut ptr) = self.root else {
            return Cursor::null();
        };
        // SAFETY: descending owned child links of a live tree.
        unsafe {
            loop {
                let node = ptr.as_ref();
                let idx = node.lower_bound(key, &self.comp).index;
                if node.is_leaf() {
                    return Cursor::new(ptr, idx).into_last();
                }
                ptr = node.child(idx);
            }
        }
    }

    fn upper_bound_raw(&self, key: &P::Key) -> Cursor<P, B> {
        let Some(mut ptr) = self.root else {
            return Cursor::null();
        };
        // SAFETY: descending owned child links of a live tree.
        unsafe {
            loop {
                let node = ptr.as_ref();
                let idx = node.upper_bound(key, &self.comp);
                if node.is_leaf() {
                    return Cursor::new(ptr, idx).into_last();
                }
                ptr = node.child(idx);
            }
        }
    }

    /// First value not less than `key`, or `end`.
    pub(crate) fn lower_bound(&self, key: &P::Key) -> Cursor<P, B> {
        let cur = self.lower_bound_raw(key);
        if cur.is_null() {
            self.end()
        } else {
            cur
        }
    }

    /// First value greater than `key`, or `end`.
    pub(crate) fn upper_bound(&self, key: &P::Key) -> Cursor<P, B> {
        let cur = self.upper_bound_raw(key);
        if cur.is_null() {
            self.end()
        } else {
            cur
        }
    }

    /// The run of values equal to `key`: `(lower_bound, upper_bound)`.
    pub(crate) fn equal_range(&self, key: &P::Key) -> (Cursor<P, B>, Cursor<P, B>) {
        (self.lower_bound(key), self.upper_bound(key))
    }

    /// Any value equal to `key` in a unique tree.
    pub(crate) fn find_unique(&self, key: &P::Key) -> Option<Cursor<P, B>> {
        self.root?;
        let (cur, kind) = self.locate(key);
        match kind {
            MatchKind::Exact => Some(cur),

            MatchKind::MissThreeWay => None,

            MatchKind::Unknown => {
                // SAFETY: cursor freshly produced by locate on this tree.
                unsafe {
                    let cur = cur.into_last();
                    if !cur.is_null() && !self.comp.less(key, cur.node().key(cur.pos)) {
                        Some(cur)
                    } else {
                        None
                    }
                }
            }
        }
    }

    /// The first of possibly many values equal to `key`.
    pub(crate) fn find_multi(&self, key: &P::Key) -> Option<Cursor<P, B>> {
        let cur = self.lower_bound_raw(key);
        if cur.is_null() {
            return None;
        }
        // SAFETY: cursor freshly produced on this tree.
        unsafe {
            if !self.comp.less(key, cur.node().key(cur.pos)) {
                Some(cur)
            } else {
                None
            }
        }
    }

    pub(crate) fn count_unique(&self, key: &P::Key) -> usize {
        usize::from(self.find_unique(key).is_some())
    }

    pub(crate) fn count_multi(&self, key: &P::Key) -> usize {
        let (lo, hi) = self.equal_range(key);
        self.distance(lo, hi)
    }

    /// Steps from `from` to `to`; `to` must be reachable.
    pub(crate) fn distance(&self, from: Cursor<P, B>, to: Cursor<P, B>) -> usize {
        let mut cur = from;
        let mut n = 0;
        while cur != to {
            // SAFETY: both cursors belong to this tree and `to` is ahead
            // of `from` in iteration order.
            unsafe { cur.increment() };
            n += 1;
        }
        n
    }

    // ========================================================================
    //  Whole-tree operations
    // ========================================================================

    /// Drop every value and free every node.
    pub(crate) fn clear(&mut self) {
        // SAFETY: consumes the owned node graph exactly once, post-order.
        unsafe fn free_subtree<P: TreeParams, const B: usize>(node: NonNull<Node<P, B>>) {
            let boxed = Box::from_raw(node.as_ptr());
            for &child in boxed.children() {
                free_subtree(child);
            }
            drop(boxed);
        }

        if let Some(root) = self.root.take() {
            unsafe { free_subtree(root) };
        }
        self.leftmost = None;
        self.rightmost = None;
        self.size = 0;
    }

    /// Exchange the entire contents of two trees, comparators included.
    pub(crate) fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Make `self` an element-wise copy of `source`.
    ///
    /// The source is already ordered, so every value after the first goes
    /// in through the end-hint fast path and costs no full descent.
    pub(crate) fn assign(&mut self, source: &Self)
    where
        P::Value: Clone,
        C: Clone,
    {
        self.clear();
        self.comp = source.comp.clone();

        let mut cur = source.begin();
        let end = source.end();
        while cur != end {
            // SAFETY: cursor iterates the (unmodified) source tree.
            let value = unsafe { cur.node().value(cur.pos).clone() };
            if self.is_empty() {
                self.insert_multi(value);
            } else {
                let hint = self.end();
                self.internal_insert(hint, value);
            }
            // SAFETY: as above.
            unsafe { cur.increment() };
        }
    }

    // ========================================================================
    //  Diagnostics
    // ========================================================================

    /// Assert every structural invariant. O(size).
    pub(crate) fn verify(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.size, 0, "empty tree with a nonzero cached size");
            assert!(self.leftmost.is_none(), "empty tree with a leftmost cache");
            assert!(self.rightmost.is_none(), "empty tree with a rightmost cache");
            return;
        };

        // SAFETY: read-only traversal of the owned node graph.
        unsafe {
            assert!(root.as_ref().is_root(), "root has a parent link");
            let mut leaf_depth = None;
            let counted = self.verify_node(root, None, None, 1, &mut leaf_depth);
            assert_eq!(self.size, counted, "cached size disagrees with enumeration");
            assert_eq!(
                self.leftmost,
                Some(leftmost_leaf(root)),
                "leftmost cache disagrees with traversal"
            );
            assert_eq!(
                self.rightmost,
                Some(rightmost_leaf(root)),
                "rightmost cache disagrees with traversal"
            );
        }
    }

    /// Check one node against the key window `(lo, hi]` and recurse,
    /// returning the subtree value count.
    unsafe fn verify_node(
        &self,
        ptr: NonNull<Node<P, B>>,
        lo: Option<&P::Key>,
        hi: Option<&P::Key>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> usize {
        let node = ptr.as_ref();
        let is_root = Some(ptr) == self.root;

        assert!(node.count() <= node.max_count());
        assert!(node.max_count() <= B);
        if is_root {
            // A leaf root may hold zero values only transiently; an
            // internal root always keeps at least one separator.
            if !node.is_leaf() {
                assert!(node.count() >= 1, "internal root without separators");
            }
        } else {
            // Minimum fill is an erase-path discipline: the biased split
            // intentionally leaves the growing edge nearly empty so the
            // next inserts pack it, so only emptiness is structural.
            assert!(node.count() >= 1, "empty non-root node");
            assert_eq!(node.max_count(), B, "non-root node with a reduced capacity");
        }

        if node.count() > 0 {
            if let Some(lo) = lo {
                assert!(!self.comp.less(node.key(0), lo), "key below subtree window");
            }
            if let Some(hi) = hi {
                assert!(
                    !self.comp.less(hi, node.key(node.count() - 1)),
                    "key above subtree window"
                );
            }
        }
        for i in 1..node.count() {
            assert!(
                !self.comp.less(node.key(i), node.key(i - 1)),
                "keys out of order within a node"
            );
        }

        let mut total = node.count();
        if node.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(expected) => assert_eq!(expected, depth, "leaves at unequal depths"),
            }
        } else {
            for i in 0..=node.count() {
                let child = node.child(i);
                assert_eq!(child.as_ref().parent(), Some(ptr), "child parent link broken");
                assert_eq!(child.as_ref().position(), i, "child position stale");
                total += self.verify_node(
                    child,
                    if i == 0 { lo } else { Some(node.key(i - 1)) },
                    if i == node.count() { hi } else { Some(node.key(i)) },
                    depth + 1,
                    leaf_depth,
                );
            }
        }
        total
    }

    /// Write an indented in-order rendering of the tree, one key per line
    /// with its level.
    pub(crate) fn dump(&self, out: &mut impl fmt::Write) -> fmt::Result
    where
        P::Key: fmt::Debug,
    {
        // SAFETY: read-only traversal of the owned node graph.
        unsafe fn dump_node<P: TreeParams, const B: usize>(
            out: &mut impl fmt::Write,
            ptr: NonNull<Node<P, B>>,
            level: usize,
        ) -> fmt::Result
        where
            P::Key: fmt::Debug,
        {
            let node = ptr.as_ref();
            for i in 0..node.count() {
                if !node.is_leaf() {
                    dump_node(out, node.child(i), level + 1)?;
                }
                for _ in 0..level {
                    out.write_str("  ")?;
                }
                writeln!(out, "{:?} [{}]", node.key(i), level)?;
            }
            if !node.is_leaf() {
                dump_node(out, node.child(node.count()), level + 1)?;
            }
            Ok(())
        }

        if let Some(root) = self.root {
            unsafe { dump_node(out, root, 0)? };
        }
        Ok(())
    }
}

impl<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> Drop for BTree<P, C, B> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<P: TreeParams, C: KeyCompare<P::Key> + Clone, const B: usize> Clone for BTree<P, C, B>
where
    P::Value: Clone,
{
    fn clone(&self) -> Self {
        let mut tree = Self::new(self.comp.clone());
        tree.assign(self);
        tree
    }
}

impl<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> fmt::Debug for BTree<P, C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BTree")
            .field("size", &self.size)
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}
