use crate::entry::KeyQueue;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<H: BuildHasher>(hasher: &H, key: &str) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

pub(crate) type ShardMap<V, H> = HashMap<Arc<str>, Arc<KeyQueue<V>>, H>;

/// The fixed lock-shard table fused with the per-key queue storage.
///
/// A key maps deterministically to one shard by hash; the shard's `RwLock`
/// serializes all structural operations on the queues stored under it, so
/// keys in different shards never contend. The table never resizes and the
/// shard count is a power of two for cheap masking.
pub(crate) struct QueueStore<V, H> {
  shards: Box<[CachePadded<RwLock<ShardMap<V, H>>>]>,
  hasher: H,
}

impl<V, H> fmt::Debug for QueueStore<V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<V, H> QueueStore<V, H> {
  /// Returns an iterator over all the shard locks, for whole-table
  /// operations like the janitor's expiry sweep.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &RwLock<ShardMap<V, H>>> {
    self.shards.iter().map(|padded_lock| &**padded_lock)
  }
}

impl<V, H> QueueStore<V, H>
where
  H: BuildHasher + Clone,
{
  /// Creates a new store. `num_shards` must already be a power of two; the
  /// builder clamps it before construction.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      let shard_map = ShardMap::with_hasher(hasher.clone());
      shards.push(CachePadded::new(RwLock::new(shard_map)));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  /// Returns a reference to the `RwLock` guarding the shard for a given key.
  ///
  /// The caller then acquires a read or write lock on this shard.
  #[inline]
  pub(crate) fn get_shard(&self, key: &str) -> &RwLock<ShardMap<V, H>> {
    let hash = hash_key(&self.hasher, key);
    let index = hash as usize & (self.shards.len() - 1);
    &self.shards[index]
  }
}
