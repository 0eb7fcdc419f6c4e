//! Insertion paths: unique, multi, hinted, producer, and range inserts,
//! plus the rebalance-or-split machinery that makes room on full nodes.

use core::ptr::NonNull;

use crate::compare::KeyCompare;
use crate::cursor::Cursor;
use crate::node::Node;
use crate::params::TreeParams;
use crate::tree::{structure_trace, BTree, MatchKind};

impl<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> BTree<P, C, B> {
    /// Insert `value` unless a value with an equal key already exists.
    ///
    /// Returns the cursor to the inserted (or blocking) value and whether
    /// the insert happened.
    pub(crate) fn insert_unique(&mut self, value: P::Value) -> (Cursor<P, B>, bool) {
        if self.is_empty() {
            self.make_root();
        }
        match self.locate_unique(P::key(&value)) {
            Err(existing) => (existing, false),
            Ok(pos) => (self.internal_insert(pos, value), true),
        }
    }

    /// Producer insert: search by `key`, and only materialize the value -
    /// by calling `make(key)` - when the key is absent.
    ///
    /// This backs the map facade's `get_or_default`, where constructing
    /// the mapped value on a hit would be waste.
    pub(crate) fn insert_unique_with<F>(&mut self, key: P::Key, make: F) -> (Cursor<P, B>, bool)
    where
        F: FnOnce(P::Key) -> P::Value,
    {
        if self.is_empty() {
            self.make_root();
        }
        match self.locate_unique(&key) {
            Err(existing) => (existing, false),
            Ok(pos) => {
                let value = make(key);
                (self.internal_insert(pos, value), true)
            }
        }
    }

    /// Unique insert with a position hint.
    ///
    /// When `prev < key < hint` holds (at most three comparisons), the
    /// insert lands in amortized O(1); otherwise this falls back to the
    /// full descent. No partial reuse of a wrong hint is attempted.
    pub(crate) fn insert_unique_hint(
        &mut self,
        hint: Cursor<P, B>,
        value: P::Value,
    ) -> (Cursor<P, B>, bool) {
        if !self.is_empty() {
            // SAFETY: the hint is the caller's claim of a valid position;
            // every dereference below is guarded by an end() check first.
            unsafe {
                let end = self.end();
                let key = P::key(&value);
                if hint == end || self.comp.less(key, hint.node().key(hint.pos)) {
                    let fits_before = hint == self.begin() || {
                        let mut prev = hint;
                        prev.decrement();
                        self.comp.less(prev.node().key(prev.pos), key)
                    };
                    if fits_before {
                        // prev < key < hint
                        return (self.internal_insert(hint, value), true);
                    }
                } else if self.comp.less(hint.node().key(hint.pos), key) {
                    let mut next = hint;
                    next.increment();
                    if next == end || self.comp.less(key, next.node().key(next.pos)) {
                        // hint < key < next
                        return (self.internal_insert(next, value), true);
                    }
                } else {
                    // hint is already the equal value.
                    return (hint, false);
                }
            }
        }
        self.insert_unique(value)
    }

    /// Insert every value of `iter`, skipping keys already present.
    ///
    /// Each value is offered with an end hint, so pre-sorted input inserts
    /// in amortized O(1) per value.
    pub(crate) fn insert_unique_iter<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = P::Value>,
    {
        for value in iter {
            let hint = self.end();
            self.insert_unique_hint(hint, value);
        }
    }

    /// Insert `value` after any existing values with an equal key.
    pub(crate) fn insert_multi(&mut self, value: P::Value) -> Cursor<P, B> {
        if self.is_empty() {
            self.make_root();
        }
        let pos = {
            let cur = self.upper_bound_raw(P::key(&value));
            if cur.is_null() {
                self.end()
            } else {
                cur
            }
        };
        self.internal_insert(pos, value)
    }

    /// Multi insert with a position hint; `prev <= key <= hint` admits the
    /// O(1) path.
    pub(crate) fn insert_multi_hint(&mut self, hint: Cursor<P, B>, value: P::Value) -> Cursor<P, B> {
        if !self.is_empty() {
            // SAFETY: as in `insert_unique_hint`.
            unsafe {
                let end = self.end();
                let key = P::key(&value);
                if hint == end || !self.comp.less(hint.node().key(hint.pos), key) {
                    let fits_before = hint == self.begin() || {
                        let mut prev = hint;
                        prev.decrement();
                        !self.comp.less(key, prev.node().key(prev.pos))
                    };
                    if fits_before {
                        // prev <= key <= hint
                        return self.internal_insert(hint, value);
                    }
                } else {
                    let mut next = hint;
                    next.increment();
                    if next == end || !self.comp.less(next.node().key(next.pos), key) {
                        // hint < key <= next
                        return self.internal_insert(next, value);
                    }
                }
            }
        }
        self.insert_multi(value)
    }

    /// Insert every value of `iter`, keeping duplicates.
    pub(crate) fn insert_multi_iter<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = P::Value>,
    {
        for value in iter {
            let hint = self.end();
            self.insert_multi_hint(hint, value);
        }
    }

    // ========================================================================
    //  Internals
    // ========================================================================

    /// First insert: a leaf root of capacity 1, grown on demand.
    fn make_root(&mut self) {
        debug_assert!(self.root.is_none());
        let root = NonNull::from(Box::leak(Node::new_leaf(1)));
        self.root = Some(root);
        self.leftmost = Some(root);
        self.rightmost = Some(root);
    }

    /// Classify where `key` goes in a unique tree: `Ok` is the leaf
    /// position to insert at, `Err` the cursor of the equal value already
    /// present.
    fn locate_unique(&self, key: &P::Key) -> Result<Cursor<P, B>, Cursor<P, B>> {
        let (cur, kind) = self.locate(key);
        match kind {
            MatchKind::Exact => Err(cur),

            MatchKind::MissThreeWay => Ok(cur),

            MatchKind::Unknown => {
                // Two-way search cannot flag equality; check the one value
                // the leaf position brackets.
                // SAFETY: cursor freshly produced by locate on this tree.
                unsafe {
                    let last = cur.into_last();
                    if !last.is_null() && !self.comp.less(key, last.node().key(last.pos)) {
                        Err(last)
                    } else {
                        Ok(cur)
                    }
                }
            }
        }
    }

    /// Insert `value` immediately before `pos`. Requires
    /// `prev_key <= key(value) <= key_at(pos)` in multi trees (strictly in
    /// unique trees).
    pub(crate) fn internal_insert(&mut self, mut pos: Cursor<P, B>, value: P::Value) -> Cursor<P, B> {
        // SAFETY: `pos` is a valid position produced by locate or a hint
        // check; node pointers stay valid across the local restructuring
        // because rebalance_or_split updates the cursor it is handed.
        unsafe {
            if !pos.node().is_leaf() {
                // Can't store into an internal slot; the in-order
                // predecessor is always on a leaf, insert right after it.
                pos.decrement();
                pos.pos += 1;
            }

            let node = pos.node_mut();
            if node.count() == node.max_count() {
                if node.max_count() < B {
                    // Still the small lone root: double its capacity.
                    debug_assert!(node.is_root());
                    let new_cap = (2 * node.max_count()).min(B);
                    structure_trace!(new_cap, "growing small root");
                    node.grow(new_cap);
                } else {
                    self.rebalance_or_split(&mut pos);
                }
            }

            pos.node_mut().insert_value(pos.pos, value);
            self.size += 1;
            pos
        }
    }

    /// Make room at the full node under `cur`, preferring to shift values
    /// to a sibling with slack and splitting only when both sides are
    /// packed. Adjusts `cur` to the equivalent position afterwards.
    ///
    /// # Safety
    ///
    /// `cur` must point at a full, full-capacity node of this tree.
    unsafe fn rebalance_or_split(&mut self, cur: &mut Cursor<P, B>) {
        let node_ptr = cur.node.expect("rebalance_or_split on the null cursor");
        debug_assert!(node_ptr.as_ref().count() == node_ptr.as_ref().max_count());
        debug_assert!(node_ptr.as_ref().max_count() == B);

        if let Some(parent_ptr) = node_ptr.as_ref().parent() {
            let node_position = node_ptr.as_ref().position();

            // Try the left sibling.
            if node_position > 0 {
                let left_ptr = parent_ptr.as_ref().child(node_position - 1);
                let left_count = left_ptr.as_ref().count();
                let left_max = left_ptr.as_ref().max_count();
                if left_count < left_max {
                    // Bias: inserting at the far right end means the left
                    // sibling can swallow every free slot; anywhere else,
                    // leave both sides room.
                    let split_free = 1 + usize::from(cur.pos < left_max);
                    let to_move = ((left_max - left_count) / split_free).max(1);

                    if cur.pos >= to_move || left_count + to_move < left_max {
                        Node::rebalance_right_to_left(
                            &mut *parent_ptr.as_ptr(),
                            &mut *left_ptr.as_ptr(),
                            &mut *node_ptr.as_ptr(),
                            to_move,
                        );
                        structure_trace!(to_move, "rebalanced into left sibling");

                        if cur.pos >= to_move {
                            cur.pos -= to_move;
                        } else {
                            // The insert position crossed the separator.
                            cur.pos += left_count + 1;
                            cur.node = Some(left_ptr);
                        }
                        debug_assert!(cur.node().count() < cur.node().max_count());
                        return;
                    }
                }
            }

            // Try the right sibling.
            if node_position < parent_ptr.as_ref().count() {
                let right_ptr = parent_ptr.as_ref().child(node_position + 1);
                let right_count = right_ptr.as_ref().count();
                let right_max = right_ptr.as_ref().max_count();
                if right_count < right_max {
                    // Mirror bias: inserting at the far left end lets the
                    // right sibling take every free slot.
                    let split_free = 1 + usize::from(cur.pos > 0);
                    let to_move = ((right_max - right_count) / split_free).max(1);

                    if cur.pos + to_move <= node_ptr.as_ref().count()
                        || right_count + to_move < right_max
                    {
                        Node::rebalance_left_to_right(
                            &mut *parent_ptr.as_ptr(),
                            &mut *node_ptr.as_ptr(),
                            &mut *right_ptr.as_ptr(),
                            to_move,
                        );
                        structure_trace!(to_move, "rebalanced into right sibling");

                        let node_count = node_ptr.as_ref().count();
                        if cur.pos > node_count {
                            cur.pos -= node_count + 1;
                            cur.node = Some(right_ptr);
                        }
                        debug_assert!(cur.node().count() < cur.node().max_count());
                        return;
                    }
                }
            }

            // No sibling slack. A split will promote a separator, so make
            // room on the parent first.
            if parent_ptr.as_ref().count() == parent_ptr.as_ref().max_count() {
                let mut parent_cur = Cursor::new(parent_ptr, node_ptr.as_ref().position());
                self.rebalance_or_split(&mut parent_cur);
            }
        } else {
            // Splitting the root: the tree grows a level upward.
            let new_root = NonNull::from(Box::leak(Node::new_internal()));
            (*new_root.as_ptr()).push_child(node_ptr);
            self.root = Some(new_root);
            structure_trace!("grew a new internal root");
        }

        // Split off a fresh right sibling. Parent and position are re-read:
        // the recursion above may have rebalanced this node sideways.
        let sibling = if node_ptr.as_ref().is_leaf() {
            Node::new_leaf(B)
        } else {
            Node::new_internal()
        };
        let sibling_ptr = NonNull::from(Box::leak(sibling));

        let separator = (*node_ptr.as_ptr()).split_into(&mut *sibling_ptr.as_ptr(), cur.pos);
        let parent_ptr = node_ptr
            .as_ref()
            .parent()
            .expect("split target acquired a parent above");
        (*parent_ptr.as_ptr()).insert_split(
            node_ptr.as_ref().position(),
            separator,
            sibling_ptr,
        );
        structure_trace!("split node");

        if node_ptr.as_ref().is_leaf() && self.rightmost == Some(node_ptr) {
            self.rightmost = Some(sibling_ptr);
        }

        let node_count = node_ptr.as_ref().count();
        if cur.pos > node_count {
            cur.pos -= node_count + 1;
            cur.node = Some(sibling_ptr);
        }
    }
}
