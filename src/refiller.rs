use crate::error::GenerationError;

use std::collections::VecDeque;

/// The contract for the external value generator.
///
/// The queue never produces values itself; whenever a key's buffer runs low a
/// filler thread calls `fill_queue_for_key` to top it up. The call is assumed
/// to be the long-latency operation the whole cache exists to hide from
/// consumers (e.g., a round trip to a remote key-management service).
///
/// Implementations must be safe to invoke concurrently for *different* keys.
/// The deduplicating work queue guarantees the same key is never refilled by
/// two threads at once.
pub trait QueueRefiller<V>: Send + Sync {
  /// Appends up to `num_values` freshly generated values for `key_name` to
  /// `queue`. `num_values` is always greater than zero. Producing fewer
  /// values than requested is allowed; producing more is tolerated but the
  /// excess is discarded by the caller.
  fn fill_queue_for_key(
    &self,
    key_name: &str,
    queue: &mut VecDeque<V>,
    num_values: usize,
  ) -> Result<(), GenerationError>;
}

/// Closures with the right shape are refillers, so simple generators don't
/// need a named type.
impl<V, F> QueueRefiller<V> for F
where
  F: Fn(&str, &mut VecDeque<V>, usize) -> Result<(), GenerationError> + Send + Sync,
{
  fn fill_queue_for_key(
    &self,
    key_name: &str,
    queue: &mut VecDeque<V>,
    num_values: usize,
  ) -> Result<(), GenerationError> {
    self(key_name, queue, num_values)
  }
}
