use crate::listener::EvictionReason;
use crate::metrics::Metrics;
use crate::store::QueueStore;
use crate::task::notifier::Notification;
use crate::task::refill_queue::RefillQueue;
use crate::time;

use std::hash::BuildHasher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fibre::mpsc;

/// A context object holding the thread-safe parts of the queue that the
/// janitor needs to access.
pub(crate) struct JanitorContext<V: Send, H> {
  pub(crate) store: Arc<QueueStore<V, H>>,
  pub(crate) refill_queue: Arc<RefillQueue<V>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) notification_sender: Option<mpsc::BoundedSender<Notification>>,
  pub(crate) expiry: Duration,
}

/// The background task that evicts key queues left idle longer than the
/// configured expiry.
pub(crate) struct Janitor {
  _handle: JoinHandle<()>,
  stop_flag: Arc<AtomicBool>,
}

impl Janitor {
  /// Spawns a new janitor thread.
  pub(crate) fn spawn<V, H>(context: JanitorContext<V, H>, tick_interval: Duration) -> Self
  where
    V: Send + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_clone = stop_flag.clone();

    let handle = thread::spawn(move || {
      while !stop_clone.load(Ordering::Relaxed) {
        let sweep_start = std::time::Instant::now();

        Self::sweep(&context);

        // Sleep for the remaining duration of the tick interval.
        if let Some(remaining) = tick_interval.checked_sub(sweep_start.elapsed()) {
          thread::sleep(remaining);
        }
      }
    });

    Self {
      _handle: handle,
      stop_flag,
    }
  }

  /// Removes every queue whose last access or install is older than the
  /// expiry. Eviction cancels the key's queued refill task; a task already
  /// running is left alone and discards its own results at install time.
  fn sweep<V, H>(context: &JanitorContext<V, H>)
  where
    V: Send,
    H: BuildHasher + Clone,
  {
    let expiry_nanos = context.expiry.as_nanos() as u64;
    let now = time::now_nanos();

    for shard in context.store.iter_shards() {
      // Cheap pass under the read lock first; the write lock re-checks.
      let candidates: Vec<Arc<str>> = {
        let guard = shard.read();
        guard
          .iter()
          .filter(|(_, queue)| now.saturating_sub(queue.last_access()) > expiry_nanos)
          .map(|(key, _)| key.clone())
          .collect()
      };
      if candidates.is_empty() {
        continue;
      }

      let mut guard = shard.write();
      for key in candidates {
        let still_expired = guard
          .get(&key)
          .map_or(false, |queue| {
            now.saturating_sub(queue.last_access()) > expiry_nanos
          });
        if !still_expired {
          continue;
        }
        if let Some(queue) = guard.remove(&key) {
          queue.retire();
          if context.refill_queue.cancel(&key).is_some() {
            context
              .metrics
              .tasks_cancelled
              .fetch_add(1, Ordering::Relaxed);
          }
          context
            .metrics
            .evicted_by_expiry
            .fetch_add(1, Ordering::Relaxed);
          if let Some(sender) = &context.notification_sender {
            let _ = sender.try_send((key.to_string(), EvictionReason::Expired));
          }
        }
      }
    }
  }

  /// Signals the janitor thread to stop; it exits within one tick.
  pub(crate) fn stop(self) {
    self.stop_flag.store(true, Ordering::Relaxed);
  }
}
