//! Erase paths: single-position, range, and by-key removal, plus the
//! merge/rebalance walk that restores minimum fill and the root shrink.

use core::mem;
use core::ptr::NonNull;

use crate::compare::KeyCompare;
use crate::cursor::Cursor;
use crate::node::Node;
use crate::params::TreeParams;
use crate::tree::{structure_trace, BTree};

impl<P: TreeParams, C: KeyCompare<P::Key>, const B: usize> BTree<P, C, B> {
    /// Remove the value under `cur`, returning it together with the
    /// cursor to its in-order successor (or `end`).
    ///
    /// `cur` must be a valid position, not `end`.
    pub(crate) fn erase(&mut self, mut cur: Cursor<P, B>) -> (P::Value, Cursor<P, B>) {
        // SAFETY: `cur` is a valid position by contract; every node
        // touched below is reached through live links, and the returned
        // cursor is rebuilt from the post-erase shape.
        unsafe {
            debug_assert!(!cur.is_null() && cur != self.end());

            let mut internal_delete = false;
            if !cur.node().is_leaf() {
                // A value on an internal node cannot be removed in place:
                // swap it with its in-order predecessor - the rightmost
                // value of the left subtree, always on a leaf - and erase
                // there.
                let mut pred = cur;
                pred.decrement();
                debug_assert!(pred.node().is_leaf());
                mem::swap(
                    cur.node_mut().value_mut(cur.pos),
                    pred.node_mut().value_mut(pred.pos),
                );
                internal_delete = true;
                cur = pred;
            }

            let removed = cur.node_mut().remove_value(cur.pos);
            self.size -= 1;

            // Walk back up, restoring minimum fill level by level.
            let mut res = cur;
            let mut iter = cur;
            loop {
                let node_ptr = iter.node.expect("erase walk lost its node");
                if Some(node_ptr) == self.root {
                    self.try_shrink();
                    if self.is_empty() {
                        return (removed, self.end());
                    }
                    break;
                }
                if node_ptr.as_ref().count() >= Self::MIN_COUNT {
                    break;
                }
                let merged = self.try_merge_or_rebalance(&mut iter);
                if iter.node().is_leaf() {
                    res = iter;
                }
                if !merged {
                    break;
                }
                iter.node = iter.node().parent();
            }

            // The successor of the erased value: step off an end-of-node
            // slot, and step once more past the value swapped down from an
            // internal position.
            if res.pos == res.node().count() {
                res.pos = res.node().count() - 1;
                res.increment();
            }
            if internal_delete {
                res.increment();
            }
            (removed, res)
        }
    }

    /// Erase `[begin, end)`, returning how many values went. The count is
    /// taken before the first removal; `end` must be reachable from
    /// `begin`.
    pub(crate) fn erase_range(&mut self, begin: Cursor<P, B>, end: Cursor<P, B>) -> usize {
        let count = self.distance(begin, end);
        let mut cur = begin;
        for _ in 0..count {
            let (_, next) = self.erase(cur);
            cur = next;
        }
        count
    }

    /// Erase the single value matching `key`, if any.
    pub(crate) fn erase_unique(&mut self, key: &P::Key) -> Option<P::Value> {
        let cur = self.find_unique(key)?;
        Some(self.erase(cur).0)
    }

    /// Erase every value matching `key`, returning how many there were.
    pub(crate) fn erase_multi(&mut self, key: &P::Key) -> usize {
        let begin = self.lower_bound(key);
        if begin == self.end() {
            return 0;
        }
        let end = self.upper_bound(key);
        self.erase_range(begin, end)
    }

    // ========================================================================
    //  Fill restoration
    // ========================================================================

    /// Fold the underfilled node under `iter` into a sibling if the two
    /// plus their separator fit in one node, otherwise refill it from a
    /// sibling holding more than the minimum.
    ///
    /// On merge the node is gone and `iter` is redirected into the
    /// surviving left node; returns whether a merge happened. `iter.pos`
    /// also biases donor choice: deleting at the front of a node prefers
    /// pulling from the right sibling (and symmetrically at the back), so
    /// drain-from-one-end workloads do not shuttle values backwards.
    ///
    /// # Safety
    ///
    /// `iter` must point at a live non-root node.
    unsafe fn try_merge_or_rebalance(&mut self, iter: &mut Cursor<P, B>) -> bool {
        let node_ptr = iter.node.expect("merge walk lost its node");
        let parent_ptr = node_ptr.as_ref().parent().expect("non-root node");
        let node_position = node_ptr.as_ref().position();
        let node_count = node_ptr.as_ref().count();

        if node_position > 0 {
            // Merge into the left sibling.
            let left_ptr = parent_ptr.as_ref().child(node_position - 1);
            let left_count = left_ptr.as_ref().count();
            if 1 + left_count + node_count <= left_ptr.as_ref().max_count() {
                iter.pos += 1 + left_count;
                self.merge_nodes(left_ptr, node_ptr);
                iter.node = Some(left_ptr);
                return true;
            }
        }

        if node_position < parent_ptr.as_ref().count() {
            // Merge the right sibling into this node.
            let right_ptr = parent_ptr.as_ref().child(node_position + 1);
            let right_count = right_ptr.as_ref().count();
            if 1 + node_count + right_count <= right_ptr.as_ref().max_count() {
                self.merge_nodes(node_ptr, right_ptr);
                return true;
            }
        }

        // No merge fits, so some sibling has slack to donate: a sibling
        // that cannot merge holds more than B / 2 values.
        let left_donor = node_position > 0 && {
            let left = parent_ptr.as_ref().child(node_position - 1);
            left.as_ref().count() > Self::MIN_COUNT
        };
        let right_donor = node_position < parent_ptr.as_ref().count() && {
            let right = parent_ptr.as_ref().child(node_position + 1);
            right.as_ref().count() > Self::MIN_COUNT
        };

        let take_right = if left_donor && right_donor {
            if node_count > 0 && iter.pos == 0 {
                true
            } else if node_count > 0 && iter.pos >= node_count {
                false
            } else {
                let left = parent_ptr.as_ref().child(node_position - 1);
                let right = parent_ptr.as_ref().child(node_position + 1);
                right.as_ref().count() >= left.as_ref().count()
            }
        } else {
            right_donor
        };

        if take_right {
            let right_ptr = parent_ptr.as_ref().child(node_position + 1);
            let right_count = right_ptr.as_ref().count();
            let to_move = ((right_count - node_count) / 2).min(right_count - 1).max(1);
            Node::rebalance_right_to_left(
                &mut *parent_ptr.as_ptr(),
                &mut *node_ptr.as_ptr(),
                &mut *right_ptr.as_ptr(),
                to_move,
            );
            structure_trace!(to_move, "refilled from right sibling");
        } else {
            debug_assert!(left_donor);
            let left_ptr = parent_ptr.as_ref().child(node_position - 1);
            let left_count = left_ptr.as_ref().count();
            let to_move = ((left_count - node_count) / 2).min(left_count - 1).max(1);
            Node::rebalance_left_to_right(
                &mut *parent_ptr.as_ptr(),
                &mut *left_ptr.as_ptr(),
                &mut *node_ptr.as_ptr(),
                to_move,
            );
            iter.pos += to_move;
            structure_trace!(to_move, "refilled from left sibling");
        }
        false
    }

    /// Pull the separator down into `left`, absorb `right`, and free it.
    ///
    /// # Safety
    ///
    /// `left` and `right` must be adjacent siblings whose combined count
    /// plus separator fits one node.
    unsafe fn merge_nodes(&mut self, left_ptr: NonNull<Node<P, B>>, right_ptr: NonNull<Node<P, B>>) {
        let left = &mut *left_ptr.as_ptr();
        let parent_ptr = left.parent().expect("merge below the root");
        let (separator, detached) = (*parent_ptr.as_ptr()).remove_split(left.position());
        debug_assert!(detached == right_ptr);

        let mut right = Box::from_raw(right_ptr.as_ptr());
        left.absorb(separator, &mut right);

        if right.is_leaf() && self.rightmost == Some(right_ptr) {
            self.rightmost = Some(left_ptr);
        }
        structure_trace!("merged sibling nodes");
        // `right` is drained; dropping the box frees it.
    }

    /// Shed a level once the root runs out of separators: free an empty
    /// leaf root, or promote the internal root's sole child.
    ///
    /// # Safety
    ///
    /// The tree must be non-empty.
    unsafe fn try_shrink(&mut self) {
        let root_ptr = self.root.expect("shrink of an empty tree");
        if root_ptr.as_ref().count() > 0 {
            return;
        }

        if root_ptr.as_ref().is_leaf() {
            // Erased the last value.
            debug_assert_eq!(self.size, 0);
            drop(Box::from_raw(root_ptr.as_ptr()));
            self.root = None;
            self.leftmost = None;
            self.rightmost = None;
            structure_trace!("tree emptied");
        } else {
            // Zero separators leave exactly one child; it becomes the
            // root. The box's child list only holds the pointer, so
            // dropping it does not free the child.
            let root = Box::from_raw(root_ptr.as_ptr());
            let child_ptr = root.child(0);
            (*child_ptr.as_ptr()).make_root();
            self.root = Some(child_ptr);
            drop(root);
            structure_trace!("tree height shrank");
        }
    }
}
