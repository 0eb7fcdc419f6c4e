//! Filepath: src/cursor.rs
//!
//! The raw `(node, position)` cursor.
//!
//! Every public iterator wraps one of these. A cursor is two words and
//! `Copy`; it holds no borrow, so validity is a protocol, not a type
//! guarantee: any insert or erase may relocate values between nodes and
//! invalidate every live cursor. The engine only hands cursors across a
//! boundary where that protocol is upheld (facade iterators tie them to a
//! tree borrow).
//!
//! `end` is represented as `(rightmost leaf, count)` - one past the last
//! value of the last leaf - or as the null cursor when the tree is empty.

use core::ptr::NonNull;

use crate::node::Node;
use crate::params::TreeParams;

/// Position of one value in the tree: a node and an index into it.
pub struct Cursor<P: TreeParams, const B: usize> {
    pub(crate) node: Option<NonNull<Node<P, B>>>,
    pub(crate) pos: usize,
}

impl<P: TreeParams, const B: usize> Clone for Cursor<P, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: TreeParams, const B: usize> Copy for Cursor<P, B> {}

impl<P: TreeParams, const B: usize> PartialEq for Cursor<P, B> {
    /// Identity comparison: same node, same slot.
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.pos == other.pos
    }
}

impl<P: TreeParams, const B: usize> Eq for Cursor<P, B> {}

impl<P: TreeParams, const B: usize> Cursor<P, B> {
    /// The null cursor: `end()` of an empty tree, or "not found".
    #[inline]
    pub(crate) fn null() -> Self {
        Self { node: None, pos: 0 }
    }

    #[inline]
    pub(crate) fn new(node: NonNull<Node<P, B>>, pos: usize) -> Self {
        Self { node: Some(node), pos }
    }

    #[inline]
    pub(crate) fn is_null(&self) -> bool {
        self.node.is_none()
    }

    /// Borrow the node under the cursor.
    ///
    /// # Safety
    ///
    /// The cursor must be non-null and still valid (no structural mutation
    /// since it was produced), and the returned borrow must not outlive
    /// the tree. The lifetime is unbound; the caller constrains it.
    #[inline]
    pub(crate) unsafe fn node<'a>(&self) -> &'a Node<P, B> {
        &*self.node.expect("null cursor dereference").as_ptr()
    }

    /// Mutable variant of [`Cursor::node`].
    ///
    /// # Safety
    ///
    /// As [`Cursor::node`], plus the usual exclusivity requirement.
    #[inline]
    pub(crate) unsafe fn node_mut<'a>(&self) -> &'a mut Node<P, B> {
        &mut *self.node.expect("null cursor dereference").as_ptr()
    }

    // ========================================================================
    //  In-order stepping
    // ========================================================================

    /// Advance to the in-order successor.
    ///
    /// Stepping from the last value lands on `end`; stepping from `end`
    /// stays at `end`.
    ///
    /// # Safety
    ///
    /// Cursor must be valid and non-null.
    pub(crate) unsafe fn increment(&mut self) {
        let node = self.node();
        if node.is_leaf() {
            self.pos += 1;
            if self.pos < node.count() {
                return;
            }
            self.increment_slow();
        } else {
            // Successor of an internal slot: leftmost leaf of the child
            // just after it.
            self.node = Some(leftmost_leaf(node.child(self.pos + 1)));
            self.pos = 0;
        }
    }

    unsafe fn increment_slow(&mut self) {
        // Ran off a leaf: climb while sitting one past the last slot.
        let save = *self;
        loop {
            let node = self.node();
            if self.pos < node.count() {
                return;
            }
            match node.parent() {
                Some(parent) => {
                    self.pos = node.position();
                    self.node = Some(parent);
                }

                // Climbed off the root: we were already at `end`.
                None => {
                    *self = save;
                    return;
                }
            }
        }
    }

    /// Step to the in-order predecessor.
    ///
    /// Stepping from `end` lands on the last value. Stepping from the
    /// first value is undefined.
    ///
    /// # Safety
    ///
    /// Cursor must be valid and non-null.
    pub(crate) unsafe fn decrement(&mut self) {
        let node = self.node();
        if node.is_leaf() {
            if self.pos > 0 {
                self.pos -= 1;
                return;
            }
            self.decrement_slow();
        } else {
            // Predecessor of an internal slot: rightmost leaf of the child
            // just before it.
            let leaf = rightmost_leaf(node.child(self.pos));
            self.node = Some(leaf);
            self.pos = leaf.as_ref().count() - 1;
        }
    }

    unsafe fn decrement_slow(&mut self) {
        let save = *self;
        loop {
            let node = self.node();
            match node.parent() {
                Some(parent) => {
                    let slot = node.position();
                    self.node = Some(parent);
                    if slot > 0 {
                        self.pos = slot - 1;
                        return;
                    }
                }

                None => {
                    *self = save;
                    return;
                }
            }
        }
    }

    /// Climb off end-of-node positions: the first ancestor slot holding a
    /// real value, or the null cursor when past the last value.
    ///
    /// Locate can leave a cursor at `(node, count)` after descending along
    /// a rightmost edge; this normalizes it to the value it actually
    /// brackets.
    ///
    /// # Safety
    ///
    /// Cursor must be valid.
    pub(crate) unsafe fn into_last(mut self) -> Self {
        while let Some(ptr) = self.node {
            let node = ptr.as_ref();
            if self.pos < node.count() {
                break;
            }
            match node.parent() {
                Some(parent) => {
                    self.pos = node.position();
                    self.node = Some(parent);
                }

                None => {
                    self = Self::null();
                    break;
                }
            }
        }
        self
    }
}

/// Descend to the leftmost leaf under `node`.
///
/// # Safety
///
/// `node` must point into a live, well-formed tree.
pub(crate) unsafe fn leftmost_leaf<P: TreeParams, const B: usize>(
    mut node: NonNull<Node<P, B>>,
) -> NonNull<Node<P, B>> {
    while !node.as_ref().is_leaf() {
        node = node.as_ref().child(0);
    }
    node
}

/// Descend to the rightmost leaf under `node`.
///
/// # Safety
///
/// `node` must point into a live, well-formed tree.
pub(crate) unsafe fn rightmost_leaf<P: TreeParams, const B: usize>(
    mut node: NonNull<Node<P, B>>,
) -> NonNull<Node<P, B>> {
    while !node.as_ref().is_leaf() {
        let last = node.as_ref().count();
        node = node.as_ref().child(last);
    }
    node
}
