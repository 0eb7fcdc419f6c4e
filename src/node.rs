//! Filepath: src/node.rs
//!
//! The packed B-tree block.
//!
//! One `Node` type serves both roles: leaves hold only values, internal
//! nodes additionally own `count + 1` children. Values live in a
//! fixed-capacity vector sized at node creation; nothing here ever grows a
//! node past its capacity, so value storage never reallocates after the
//! node is built (the lone exception is explicit root growth while the
//! tree is a single small leaf).
//!
//! Nodes are linked with raw pointers: a non-owning parent back-link plus
//! the node's position in that parent. Ownership is logical - a parent
//! owns its children, the tree owns the root - and deallocation is an
//! explicit post-order walk in the tree engine.
//!
//! # Invariants
//!
//! - `count <= max_count <= B`
//! - keys within a node are in non-decreasing comparator order
//! - an internal node has exactly `count + 1` children
//! - `child(i).parent == self` and `child(i).position == i`

use core::mem;
use core::ptr::NonNull;

use crate::compare::KeyCompare;
use crate::params::TreeParams;

/// Result of a node-level lower-bound search.
///
/// `exact` is only ever set by a three-way comparator; with a boolean
/// comparator the caller re-checks equality itself, once, at the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchResult {
    /// Position of the first value whose key is not less than the probe.
    pub index: usize,

    /// Whether the value at `index` compared equal to the probe.
    pub exact: bool,
}

/// A fixed-capacity block of up to `B` values.
pub struct Node<P: TreeParams, const B: usize> {
    /// Stored values, in key order. Capacity is `max_count`.
    values: Vec<P::Value>,

    /// Owned children, `None` for leaves. An internal node keeps exactly
    /// `values.len() + 1` entries; capacity is `B + 1`.
    children: Option<Vec<NonNull<Node<P, B>>>>,

    /// Non-owning back-link; `None` exactly for the root.
    parent: Option<NonNull<Node<P, B>>>,

    /// Index of this node in `parent`'s child array.
    position: u16,

    /// Value capacity. `B` everywhere except small leaf roots, which start
    /// at 1 and double on demand.
    max_count: u16,
}

impl<P: TreeParams, const B: usize> Node<P, B> {
    /// Splitting needs one value for each sibling plus a promoted
    /// separator, and positions must fit the in-node index type.
    const WIDTH_CHECK: () = {
        assert!(B >= 3, "node width must be at least 3");
        assert!(B < u16::MAX as usize, "node width does not fit the position type");
    };

    /// Allocate a leaf with the given value capacity.
    pub(crate) fn new_leaf(capacity: usize) -> Box<Self> {
        let () = Self::WIDTH_CHECK;
        debug_assert!(capacity >= 1 && capacity <= B);

        Box::new(Self {
            values: Vec::with_capacity(capacity),
            children: None,
            parent: None,
            position: 0,
            max_count: capacity as u16,
        })
    }

    /// Allocate an empty internal node at full capacity.
    pub(crate) fn new_internal() -> Box<Self> {
        let () = Self::WIDTH_CHECK;

        Box::new(Self {
            values: Vec::with_capacity(B),
            children: Some(Vec::with_capacity(B + 1)),
            parent: None,
            position: 0,
            max_count: B as u16,
        })
    }

    // ========================================================================
    //  Accessors
    // ========================================================================

    #[inline]
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub(crate) fn max_count(&self) -> usize {
        self.max_count as usize
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.position as usize
    }

    #[inline]
    pub(crate) fn parent(&self) -> Option<NonNull<Self>> {
        self.parent
    }

    /// Whether this node is the tree root.
    #[inline]
    pub(crate) fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Sever the parent link; the engine promotes this node to root.
    #[inline]
    pub(crate) fn make_root(&mut self) {
        self.parent = None;
        self.position = 0;
    }

    #[inline]
    pub(crate) fn key(&self, i: usize) -> &P::Key {
        P::key(&self.values[i])
    }

    #[inline]
    pub(crate) fn value(&self, i: usize) -> &P::Value {
        &self.values[i]
    }

    #[inline]
    pub(crate) fn value_mut(&mut self, i: usize) -> &mut P::Value {
        &mut self.values[i]
    }

    #[inline]
    pub(crate) fn child(&self, i: usize) -> NonNull<Self> {
        self.children.as_ref().expect("child access on a leaf")[i]
    }

    /// All children of an internal node, `count + 1` of them.
    #[inline]
    pub(crate) fn children(&self) -> &[NonNull<Self>] {
        self.children.as_deref().unwrap_or(&[])
    }

    // ========================================================================
    //  Binary search
    // ========================================================================

    /// Position of the first value whose key is not less than `key`.
    ///
    /// With a three-way comparator the search short-circuits on equality
    /// and narrows to the earliest equal position; with a boolean
    /// comparator `exact` is always `false`.
    pub(crate) fn lower_bound<C>(&self, key: &P::Key, comp: &C) -> SearchResult
    where
        C: KeyCompare<P::Key>,
    {
        if C::THREE_WAY {
            self.search_three_way(key, comp)
        } else {
            SearchResult {
                index: self.search_two_way(key, comp),
                exact: false,
            }
        }
    }

    /// Position of the first value whose key is greater than `key`.
    pub(crate) fn upper_bound<C>(&self, key: &P::Key, comp: &C) -> usize
    where
        C: KeyCompare<P::Key>,
    {
        let mut s = 0;
        let mut e = self.count();
        while s != e {
            let mid = (s + e) / 2;
            if comp.less(key, self.key(mid)) {
                e = mid;
            } else {
                s = mid + 1;
            }
        }
        s
    }

    fn search_three_way<C>(&self, key: &P::Key, comp: &C) -> SearchResult
    where
        C: KeyCompare<P::Key>,
    {
        use core::cmp::Ordering;

        let mut s = 0;
        let mut e = self.count();
        while s != e {
            let mid = (s + e) / 2;
            match comp.compare(self.key(mid), key) {
                Ordering::Less => s = mid + 1,

                Ordering::Greater => e = mid,

                Ordering::Equal => {
                    // Narrow to the earliest equal position. Everything in
                    // [s, mid) is still < or == key, so a plain two-way
                    // search finds the boundary.
                    let mut lo = s;
                    let mut hi = mid;
                    while lo != hi {
                        let m = (lo + hi) / 2;
                        if comp.compare(self.key(m), key) == Ordering::Less {
                            lo = m + 1;
                        } else {
                            hi = m;
                        }
                    }
                    return SearchResult { index: lo, exact: true };
                }
            }
        }
        SearchResult { index: s, exact: false }
    }

    fn search_two_way<C>(&self, key: &P::Key, comp: &C) -> usize
    where
        C: KeyCompare<P::Key>,
    {
        let mut s = 0;
        let mut e = self.count();
        while s != e {
            let mid = (s + e) / 2;
            if comp.less(self.key(mid), key) {
                s = mid + 1;
            } else {
                e = mid;
            }
        }
        s
    }

    // ========================================================================
    //  Value insertion and removal
    // ========================================================================

    /// Insert `value` at position `i`, shifting later values right.
    ///
    /// Leaves only; internal nodes acquire values exclusively through
    /// [`Node::insert_split`].
    pub(crate) fn insert_value(&mut self, i: usize, value: P::Value) {
        debug_assert!(self.is_leaf());
        debug_assert!(self.count() < self.max_count());
        self.values.insert(i, value);
    }

    /// Remove and return the value at position `i` of a leaf.
    pub(crate) fn remove_value(&mut self, i: usize) -> P::Value {
        debug_assert!(self.is_leaf());
        self.values.remove(i)
    }

    /// Grow a small leaf root's value capacity in place.
    pub(crate) fn grow(&mut self, new_capacity: usize) {
        debug_assert!(self.is_leaf() && self.is_root());
        debug_assert!(self.max_count() < new_capacity && new_capacity <= B);
        self.values.reserve_exact(new_capacity - self.values.len());
        self.max_count = new_capacity as u16;
    }

    // ========================================================================
    //  Child bookkeeping
    // ========================================================================

    /// Reset parent/position links for children at `from..`.
    ///
    /// Called after any operation that moved entries within or into the
    /// child array.
    fn refresh_children(&mut self, from: usize) {
        let me = NonNull::from(&mut *self);
        if let Some(children) = &mut self.children {
            for (i, child) in children.iter_mut().enumerate().skip(from) {
                // SAFETY: children are live, distinct nodes owned by this
                // one; we only touch their link fields.
                unsafe {
                    let c = child.as_mut();
                    c.parent = Some(me);
                    c.position = i as u16;
                }
            }
        }
    }

    /// Append a child, adopting it.
    pub(crate) fn push_child(&mut self, child: NonNull<Self>) {
        let children = self.children.as_mut().expect("push_child on a leaf");
        debug_assert!(children.len() < B + 1);
        children.push(child);
        let from = children.len() - 1;
        self.refresh_children(from);
    }

    /// Install `separator` at value position `i` and `right` as the child
    /// just after it. This is how an internal node absorbs a split below.
    pub(crate) fn insert_split(&mut self, i: usize, separator: P::Value, right: NonNull<Self>) {
        debug_assert!(!self.is_leaf());
        debug_assert!(self.count() < self.max_count());
        self.values.insert(i, separator);
        self.children
            .as_mut()
            .expect("insert_split on a leaf")
            .insert(i + 1, right);
        self.refresh_children(i + 1);
    }

    /// Remove the separator at value position `i` together with the child
    /// just after it, returning both. The caller absorbs the detached
    /// child's contents into its left sibling and frees it.
    pub(crate) fn remove_split(&mut self, i: usize) -> (P::Value, NonNull<Self>) {
        debug_assert!(!self.is_leaf());
        let separator = self.values.remove(i);
        let right = self
            .children
            .as_mut()
            .expect("remove_split on a leaf")
            .remove(i + 1);
        self.refresh_children(i + 1);
        (separator, right)
    }

    // ========================================================================
    //  Split, merge, rebalance
    // ========================================================================

    /// Move a run of values (and children) into the fresh right sibling
    /// `dest`, returning the separator to promote.
    ///
    /// The split point is biased by the pending insert position: inserting
    /// at the far left sends all but one value right, inserting at the far
    /// right sends none (the insert itself will populate `dest`), anything
    /// else splits in half.
    pub(crate) fn split_into(&mut self, dest: &mut Self, insert_position: usize) -> P::Value {
        debug_assert!(dest.count() == 0);
        debug_assert!(self.is_leaf() == dest.is_leaf());

        let count = self.count();
        let dest_count = if insert_position == 0 {
            count - 1
        } else if insert_position == self.max_count() {
            0
        } else {
            count / 2
        };

        dest.values.extend(self.values.drain(count - dest_count..));

        // The separator is the largest value remaining on the left.
        let separator = self
            .values
            .pop()
            .expect("split always leaves a value to promote");

        if !self.is_leaf() {
            // dest gets the children flanking its dest_count values.
            let src = self.children.as_mut().expect("internal split");
            let start = src.len() - (dest_count + 1);
            dest.children
                .as_mut()
                .expect("internal split")
                .extend(src.drain(start..));
            dest.refresh_children(0);
        }

        separator
    }

    /// Absorb the separator pulled down from the parent plus everything in
    /// `right`. The caller removes `right` from the parent and frees it.
    pub(crate) fn absorb(&mut self, separator: P::Value, right: &mut Self) {
        debug_assert!(self.is_leaf() == right.is_leaf());
        debug_assert!(1 + self.count() + right.count() <= self.max_count());

        self.values.push(separator);
        self.values.append(&mut right.values);

        if !self.is_leaf() {
            let from = self.children.as_ref().expect("internal merge").len();
            self.children
                .as_mut()
                .expect("internal merge")
                .append(right.children.as_mut().expect("internal merge"));
            self.refresh_children(from);
        }
    }

    /// Move `to_move` values from `right` to `left`, rotating the
    /// separator through `parent`.
    pub(crate) fn rebalance_right_to_left(
        parent: &mut Self,
        left: &mut Self,
        right: &mut Self,
        to_move: usize,
    ) {
        debug_assert!(left.position() + 1 == right.position());
        debug_assert!((1..=right.count()).contains(&to_move));
        debug_assert!(left.count() + to_move <= left.max_count());

        let sep_slot = left.position();

        // right[to_move - 1] becomes the new separator; the old separator
        // leads the run moving left.
        mem::swap(&mut parent.values[sep_slot], &mut right.values[to_move - 1]);
        right.values[..to_move].rotate_right(1);
        left.values.extend(right.values.drain(..to_move));

        if !left.is_leaf() {
            let from = left.children.as_ref().expect("internal rebalance").len();
            left.children
                .as_mut()
                .expect("internal rebalance")
                .extend(right.children.as_mut().expect("internal rebalance").drain(..to_move));
            left.refresh_children(from);
            right.refresh_children(0);
        }
    }

    /// Move `to_move` values from `left` to `right`, rotating the
    /// separator through `parent`.
    pub(crate) fn rebalance_left_to_right(
        parent: &mut Self,
        left: &mut Self,
        right: &mut Self,
        to_move: usize,
    ) {
        debug_assert!(left.position() + 1 == right.position());
        debug_assert!((1..=left.count()).contains(&to_move));
        debug_assert!(right.count() + to_move <= right.max_count());

        let n = left.count();
        let sep_slot = left.position();

        // left[n - to_move] becomes the new separator; the old separator
        // trails the run moving right.
        mem::swap(&mut parent.values[sep_slot], &mut left.values[n - to_move]);
        left.values[n - to_move..].rotate_left(1);
        right.values.extend(left.values.drain(n - to_move..));
        right.values.rotate_right(to_move);

        if !left.is_leaf() {
            let src = left.children.as_mut().expect("internal rebalance");
            let start = src.len() - to_move;
            let dest = right.children.as_mut().expect("internal rebalance");
            dest.extend(src.drain(start..));
            dest.rotate_right(to_move);
            right.refresh_children(0);
        }
    }
}
