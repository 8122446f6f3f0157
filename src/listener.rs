use std::fmt;

/// Describes the reason a key's queue was evicted from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The queue was removed because the cache was over its key capacity.
  Capacity,
  /// The queue was removed because the key was idle longer than `expiry`.
  Expired,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to key capacity"),
      EvictionReason::Expired => write!(f, "evicted due to idle expiry"),
    }
  }
}

/// A listener that can be registered with the queue to receive notifications
/// when a key's buffer is evicted.
///
/// Only the key name and the reason are reported. Buffered values are often
/// pre-generated secrets, so they are dropped rather than handed to user
/// code. The callback runs on a dedicated background thread and therefore
/// never blocks consumers or filler threads.
pub trait EvictionListener: Send + Sync {
  fn on_evict(&self, key_name: String, reason: EvictionReason);
}

impl<F> EvictionListener for F
where
  F: Fn(String, EvictionReason) + Send + Sync,
{
  fn on_evict(&self, key_name: String, reason: EvictionReason) {
    self(key_name, reason)
  }
}
