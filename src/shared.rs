use crate::entry::KeyQueue;
use crate::handles::SyncGenerationPolicy;
use crate::listener::EvictionReason;
use crate::metrics::Metrics;
use crate::store::QueueStore;
use crate::task::filler::FillerPool;
use crate::task::janitor::Janitor;
use crate::task::notifier::{Notification, Notifier};
use crate::task::refill_queue::{RefillQueue, RefillTask, SubmitOutcome};

use std::fmt;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fibre::mpsc;
use parking_lot::Mutex;

/// The internal, thread-safe core of the value queue.
///
/// Every piece of shared mutable state is owned here and torn down by
/// `shutdown`; nothing is process-global, so independent instances coexist.
pub(crate) struct QueueShared<V: Send, H> {
  pub(crate) store: Arc<QueueStore<V, H>>,
  pub(crate) refill_queue: Arc<RefillQueue<V>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) fillers: Mutex<Option<FillerPool>>,
  pub(crate) janitor: Mutex<Option<Janitor>>,
  pub(crate) notifier: Mutex<Option<Notifier>>,
  pub(crate) notification_sender: Mutex<Option<mpsc::BoundedSender<Notification>>>,
  pub(crate) num_values: usize,
  /// Buffer level at or below which a pop triggers a background top-up.
  pub(crate) watermark_count: usize,
  pub(crate) policy: SyncGenerationPolicy,
  pub(crate) refill_timeout: Duration,
  /// Per-shard share of `max_keys`; `usize::MAX` disables LRU eviction.
  pub(crate) per_shard_capacity: usize,
  pub(crate) shut_down: AtomicBool,
}

impl<V: Send, H> fmt::Debug for QueueShared<V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueShared")
      .field("num_values", &self.num_values)
      .field("watermark_count", &self.watermark_count)
      .field("policy", &self.policy)
      .field("refill_timeout", &self.refill_timeout)
      .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl<V: Send, H> Drop for QueueShared<V, H> {
  fn drop(&mut self) {
    self.shutdown();
  }
}

impl<V: Send, H> QueueShared<V, H> {
  /// Stops intake and tears the background machinery down. Idempotent;
  /// queued-but-undequeued refill tasks are discarded, in-flight ones
  /// finish before their worker exits.
  pub(crate) fn shutdown(&self) {
    if self.shut_down.swap(true, Ordering::SeqCst) {
      return;
    }
    self.refill_queue.shutdown();
    if let Some(pool) = self.fillers.lock().take() {
      pool.join();
    }
    // Retire every queue so blocked waiters wake and observe the shutdown
    // instead of sleeping out their timeout.
    for shard in self.store.iter_shards() {
      let mut guard = shard.write();
      for queue in guard.values() {
        queue.retire();
      }
      guard.clear();
    }
    if let Some(janitor) = self.janitor.lock().take() {
      janitor.stop();
    }
    drop(self.notification_sender.lock().take());
    if let Some(notifier) = self.notifier.lock().take() {
      notifier.stop();
    }
  }

  pub(crate) fn is_shut_down(&self) -> bool {
    self.shut_down.load(Ordering::SeqCst)
  }

  fn notify_eviction(&self, key: &str, reason: EvictionReason) {
    if let Some(sender) = &*self.notification_sender.lock() {
      let _ = sender.try_send((key.to_string(), reason));
    }
  }
}

impl<V: Send, H> QueueShared<V, H>
where
  H: BuildHasher + Clone,
{
  /// Returns the key's queue, creating an empty one on miss.
  ///
  /// Creation never populates: the new queue is empty and filling it is the
  /// filler pool's job. A full shard makes room by evicting its
  /// least-recently-used queue first, so creation always succeeds.
  pub(crate) fn queue_for(&self, key_name: &str) -> Arc<KeyQueue<V>> {
    let shard = self.store.get_shard(key_name);
    {
      let guard = shard.read();
      if let Some(queue) = guard.get(key_name) {
        queue.touch();
        return queue.clone();
      }
    }

    let mut guard = shard.write();
    // Double-check: another thread may have created it while we escalated.
    if let Some(queue) = guard.get(key_name) {
      queue.touch();
      return queue.clone();
    }

    if guard.len() >= self.per_shard_capacity {
      let victim_key = guard
        .iter()
        .min_by_key(|(_, queue)| queue.last_access())
        .map(|(key, _)| key.clone());
      if let Some(victim_key) = victim_key {
        if let Some(victim) = guard.remove(&victim_key) {
          victim.retire();
          if self.refill_queue.cancel(&victim_key).is_some() {
            self.metrics.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
          }
          self
            .metrics
            .evicted_by_capacity
            .fetch_add(1, Ordering::Relaxed);
          self.notify_eviction(&victim_key, EvictionReason::Capacity);
        }
      }
    }

    let name: Arc<str> = Arc::from(key_name);
    let queue = Arc::new(KeyQueue::new(name.clone()));
    guard.insert(name, queue.clone());
    self.metrics.keys_created.fetch_add(1, Ordering::Relaxed);
    queue
  }

  /// Submits a deduplicated refill task for the queue. Cheap to call
  /// unconditionally: a key already queued for refill is dropped here.
  pub(crate) fn submit_refill(&self, queue: &Arc<KeyQueue<V>>) {
    if self.is_shut_down() || queue.is_retired() {
      return;
    }
    let task = Arc::new(RefillTask::new(queue.clone()));
    match self.refill_queue.submit(task) {
      SubmitOutcome::Queued => {
        self
          .metrics
          .refills_submitted
          .fetch_add(1, Ordering::Relaxed);
      }
      SubmitOutcome::AlreadyQueued => {
        self
          .metrics
          .refills_deduplicated
          .fetch_add(1, Ordering::Relaxed);
      }
      // A submission racing shutdown is neither accepted nor a duplicate.
      SubmitOutcome::ShutDown => {}
    }
  }

  /// The steady-state top-up: after a pop, refill in the background once
  /// the buffer sinks to the watermark, keeping future callers off the
  /// blocking path.
  pub(crate) fn maybe_top_up(&self, queue: &Arc<KeyQueue<V>>, remaining: usize) {
    if remaining <= self.watermark_count {
      self.submit_refill(queue);
    }
  }
}
