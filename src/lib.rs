//! # Packtree
//!
//! Ordered associative containers built on a B-tree whose nodes pack many
//! values into a single cache-friendly block.
//!
//! A red-black tree pays three pointers plus color per stored value; the
//! trees here store a whole run of values per node and keep child pointers
//! only on internal nodes, so per-value overhead drops to a few bytes and
//! lookups touch far fewer cache lines.
//!
//! ## Containers
//!
//! - [`BTreeSet`] / [`BTreeMultiSet`] - ordered sets of keys
//! - [`BTreeMap`] / [`BTreeMultiMap`] - ordered key-value maps
//!
//! All four share one crate-internal engine and differ only in the
//! value-to-key projection and in whether equal keys may coexist.
//!
//! ## Node width
//!
//! Every container carries a `const B: usize` parameter: the maximum number
//! of values per node. The default, [`DEFAULT_NODE_WIDTH`], suits word-sized
//! values in roughly 256-byte nodes; [`node_width`] derives a width from a
//! byte budget:
//!
//! ```rust
//! use packtree::{node_width, BTreeSet};
//!
//! // i64 keys packed into ~256-byte nodes.
//! let mut set: BTreeSet<i64, packtree::OrdCompare, { node_width(256, 8) }> =
//!     BTreeSet::new();
//! set.insert(7);
//! assert!(set.contains(&7));
//! ```
//!
//! ## Iterator invalidation
//!
//! Splits, merges, and rebalances move values between nodes, so **any
//! insert or erase may invalidate every live iterator**, not just those at
//! the affected element. Removal APIs return the successor so that
//! drain-style loops stay valid.

pub mod compare;
pub mod map;
pub mod set;

mod cursor;
mod node;
mod params;
mod tree;

pub use compare::{KeyCompare, LessThan, OrdCompare};
pub use map::{BTreeMap, BTreeMultiMap};
pub use set::{BTreeMultiSet, BTreeSet};

/// Default number of values per node.
///
/// Chosen so word-sized values land near the 256-byte node budget the
/// engine was tuned for. Override per container via the `B` parameter.
pub const DEFAULT_NODE_WIDTH: usize = 29;

/// Derive a node width from a target node size in bytes.
///
/// Reserves three words for the node header and divides the rest among
/// values, never returning less than 3 (a split needs one value for each
/// sibling plus a separator promoted to the parent).
///
/// # Example
///
/// ```rust
/// use packtree::node_width;
///
/// assert_eq!(node_width(256, 8), 29);
/// assert_eq!(node_width(64, 1024), 3);
/// ```
#[must_use]
pub const fn node_width(target_node_size: usize, value_size: usize) -> usize {
    let header = 3 * core::mem::size_of::<usize>();
    let space = if target_node_size > header {
        target_node_size - header
    } else {
        0
    };
    let width = if value_size == 0 { 0 } else { space / value_size };
    if width < 3 {
        3
    } else {
        width
    }
}
