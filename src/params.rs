//! Value-to-key projections shared by the four containers.
//!
//! The engine stores whole values and never looks inside them except
//! through [`TreeParams::key`]. Sets store the key itself; maps store a
//! `(key, mapped)` pair and project the first element.

use core::marker::PhantomData;

/// Fixes what the engine stores and how it extracts the ordering key.
pub trait TreeParams {
    /// The key the comparator sees.
    type Key;

    /// The value a node slot holds.
    type Value;

    /// Borrow the key out of a stored value.
    fn key(value: &Self::Value) -> &Self::Key;
}

/// Set projection: the value is the key.
pub struct SetParams<K>(PhantomData<K>);

impl<K> TreeParams for SetParams<K> {
    type Key = K;
    type Value = K;

    #[inline]
    fn key(value: &K) -> &K {
        value
    }
}

/// Map projection: the value is a `(key, mapped)` pair.
pub struct MapParams<K, M>(PhantomData<(K, M)>);

impl<K, M> TreeParams for MapParams<K, M> {
    type Key = K;
    type Value = (K, M);

    #[inline]
    fn key(value: &(K, M)) -> &K {
        &value.0
    }
}
