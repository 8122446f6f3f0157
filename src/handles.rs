use crate::entry::WaitOutcome;
use crate::error::QueueError;
use crate::metrics::MetricsSnapshot;
use crate::shared::QueueShared;

use std::fmt;
use std::hash::BuildHasher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Controls how a consumer call behaves when it finds a key's buffer empty.
///
/// Regardless of policy, every successful pop that leaves the buffer at or
/// below the low watermark triggers a deduplicated background refill, so in
/// steady state consumers rarely reach the empty case at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncGenerationPolicy {
  /// Block until at least one value is available.
  AtLeastOne,
  /// Rely on the watermark to have refilled ahead of demand. `get_at_most`
  /// returns whatever is buffered (possibly nothing) without blocking;
  /// `get_next` must produce a value and therefore still blocks for one
  /// when the buffer is genuinely empty.
  LowWatermark,
  /// Block until the buffer is restored to full capacity before popping.
  All,
}

/// A key-partitioned, asynchronously replenished value queue.
///
/// Consumers pop pre-generated values per key; a bounded filler pool keeps
/// every key's buffer topped up by calling the configured `QueueRefiller` off
/// the consumer path. Handles are cheap to share via `Arc`.
pub struct ValueQueue<V: Send + 'static, H = ahash::RandomState> {
  pub(crate) shared: Arc<QueueShared<V, H>>,
}

impl<V: Send + 'static, H> fmt::Debug for ValueQueue<V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ValueQueue")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<V, H> ValueQueue<V, H>
where
  V: Send + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// Pops the next value for `key_name`.
  ///
  /// Fast path: a non-empty buffer yields a value immediately. On empty,
  /// the call submits a refill and blocks per the configured policy, bounded
  /// by `refill_timeout`. A refill failure while blocked surfaces as
  /// `QueueError::Generation`.
  pub fn get_next(&self, key_name: &str) -> Result<V, QueueError> {
    let mut values = self.fetch(key_name, 1, true)?;
    values.pop().ok_or(QueueError::Empty)
  }

  /// Pops up to `num` values for `key_name` without blocking while at least
  /// one is available.
  ///
  /// On an empty buffer the policy decides: `LowWatermark` submits a refill
  /// and returns an empty vec, `AtLeastOne` blocks for one value, `All`
  /// blocks until the buffer is full. The returned values preserve FIFO
  /// order.
  pub fn get_at_most(&self, key_name: &str, num: usize) -> Result<Vec<V>, QueueError> {
    self.fetch(key_name, num, false)
  }

  /// Discards and returns every value currently buffered for `key_name`,
  /// and cancels the key's queued refill task if one is pending.
  pub fn drain(&self, key_name: &str) -> Vec<V> {
    let shared = &self.shared;
    if shared.refill_queue.cancel(key_name).is_some() {
      shared
        .metrics
        .tasks_cancelled
        .fetch_add(1, Ordering::Relaxed);
    }
    let shard = shared.store.get_shard(key_name);
    let guard = shard.read();
    match guard.get(key_name) {
      Some(queue) => queue.take_all(),
      None => Vec::new(),
    }
  }

  /// Stops accepting work, drains the filler pool, and releases background
  /// resources. Idempotent; later `get_*` calls return
  /// `QueueError::ShutDown`.
  pub fn shutdown(&self) {
    self.shared.shutdown();
  }

  fn fetch(&self, key_name: &str, num: usize, is_get_next: bool) -> Result<Vec<V>, QueueError> {
    let shared = &self.shared;
    let deadline = Instant::now() + shared.refill_timeout;

    // Retried from the top if the queue retires (is evicted) under a
    // blocked waiter; the next pass creates a fresh queue for the key. The
    // shutdown check runs before the key is resolved so a retry never
    // repopulates a torn-down store.
    loop {
      if shared.is_shut_down() {
        return Err(QueueError::ShutDown);
      }
      let queue = shared.queue_for(key_name);

      if num == 0 {
        shared.maybe_top_up(&queue, queue.len());
        return Ok(Vec::new());
      }

      // Fast path: pop under the shard read lock.
      let (popped, remaining) = {
        let shard = shared.store.get_shard(key_name);
        let _guard = shard.read();
        queue.try_pop(num)
      };
      if !popped.is_empty() {
        shared.metrics.hits.fetch_add(1, Ordering::Relaxed);
        shared
          .metrics
          .values_dispensed
          .fetch_add(popped.len() as u64, Ordering::Relaxed);
        shared.maybe_top_up(&queue, remaining);
        return Ok(popped);
      }

      shared.metrics.misses.fetch_add(1, Ordering::Relaxed);

      let want = match shared.policy {
        SyncGenerationPolicy::LowWatermark if !is_get_next => {
          // Non-blocking exhaustion: kick a refill and hand back nothing.
          shared.submit_refill(&queue);
          return Ok(Vec::new());
        }
        // An empty buffer leaves `get_next` nothing to return, so
        // LowWatermark blocks for one value here just like AtLeastOne.
        SyncGenerationPolicy::AtLeastOne | SyncGenerationPolicy::LowWatermark => 1,
        SyncGenerationPolicy::All => shared.num_values,
      };

      let failures_at_entry = queue.failure_count();
      loop {
        if shared.is_shut_down() {
          return Err(QueueError::ShutDown);
        }
        // Baseline before submitting, so an install that lands before we
        // start waiting still counts as progress.
        let installs_at_entry = queue.install_count();
        shared.submit_refill(&queue);
        match queue.await_values(want, num, failures_at_entry, installs_at_entry, deadline) {
          WaitOutcome::Ready { values, remaining } => {
            shared
              .metrics
              .values_dispensed
              .fetch_add(values.len() as u64, Ordering::Relaxed);
            shared.maybe_top_up(&queue, remaining);
            return Ok(values);
          }
          // A partial refill landed; resubmit and keep waiting.
          WaitOutcome::Progress => continue,
          WaitOutcome::Failed(error) => return Err(QueueError::Generation(error)),
          WaitOutcome::Retired => break,
          WaitOutcome::TimedOut => return Err(QueueError::Timeout),
        }
      }
    }
  }
}
