use crate::entry::KeyQueue;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::HashMap;
use parking_lot::{Condvar, Mutex};

/// One unit of refill work: top the key's buffer back up to capacity.
///
/// The key and the cancel flag are first-class fields so nothing in the
/// pipeline ever has to recover a task's identity by downcasting.
pub(crate) struct RefillTask<V> {
  key: Arc<str>,
  queue: Arc<KeyQueue<V>>,
  cancelled: AtomicBool,
}

impl<V> RefillTask<V> {
  pub(crate) fn new(queue: Arc<KeyQueue<V>>) -> Self {
    Self {
      key: queue.name_arc().clone(),
      queue,
      cancelled: AtomicBool::new(false),
    }
  }

  pub(crate) fn key(&self) -> &str {
    &self.key
  }

  pub(crate) fn queue(&self) -> &Arc<KeyQueue<V>> {
    &self.queue
  }

  /// Requests cancellation. Idempotent; a task that is already running will
  /// observe the flag before installing results.
  pub(crate) fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  pub(crate) fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }
}

/// How a `submit` call was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitOutcome {
  /// The task was enqueued.
  Queued,
  /// A task for the same key is already queued or running; this one was
  /// dropped.
  AlreadyQueued,
  /// The work queue has been shut down and accepts nothing.
  ShutDown,
}

struct RefillQueueInner<V> {
  tasks: VecDeque<Arc<RefillTask<V>>>,
  /// Keys with a task queued or running. An entry is added atomically with
  /// the enqueue and stays until the worker finishes the task (or `cancel`
  /// claims it), so the same key is never refilled by two workers at once.
  keys_in_progress: HashMap<Arc<str>, Arc<RefillTask<V>>>,
  shut_down: bool,
}

/// A blocking work queue that holds at most one queued-or-running refill
/// task per key.
///
/// Submitting a key that is already tracked is silently dropped: the task
/// already in flight will satisfy the need. This is what keeps a hundred
/// consumers draining the same key from producing a hundred generator calls,
/// and what guarantees the refiller is never invoked concurrently for one
/// key.
pub(crate) struct RefillQueue<V> {
  inner: Mutex<RefillQueueInner<V>>,
  available: Condvar,
}

impl<V> RefillQueue<V> {
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(RefillQueueInner {
        tasks: VecDeque::new(),
        keys_in_progress: HashMap::default(),
        shut_down: false,
      }),
      available: Condvar::new(),
    }
  }

  /// Enqueues the task unless one for the same key is already queued or
  /// running.
  pub(crate) fn submit(&self, task: Arc<RefillTask<V>>) -> SubmitOutcome {
    let mut inner = self.inner.lock();
    if inner.shut_down {
      return SubmitOutcome::ShutDown;
    }
    if inner.keys_in_progress.contains_key(task.key()) {
      return SubmitOutcome::AlreadyQueued;
    }
    inner
      .keys_in_progress
      .insert(task.queue().name_arc().clone(), task.clone());
    inner.tasks.push_back(task);
    drop(inner);
    self.available.notify_one();
    SubmitOutcome::Queued
  }

  /// Dequeues the next task, waiting up to `timeout`. The key stays tracked
  /// while the worker runs it; the worker releases it via `finish` once the
  /// generator call has returned.
  pub(crate) fn poll(&self, timeout: Duration) -> Option<Arc<RefillTask<V>>> {
    let deadline = Instant::now() + timeout;
    let mut inner = self.inner.lock();
    loop {
      if let Some(task) = inner.tasks.pop_front() {
        return Some(task);
      }
      if inner.shut_down || Instant::now() >= deadline {
        return None;
      }
      self.available.wait_until(&mut inner, deadline);
    }
  }

  /// Releases the key of a task a worker has finished executing, so the
  /// next submission for it is accepted. Only removes the marker if it
  /// still belongs to this task; `cancel` may have handed the key to a
  /// successor in the meantime.
  pub(crate) fn finish(&self, task: &Arc<RefillTask<V>>) {
    let mut inner = self.inner.lock();
    let owned = inner
      .keys_in_progress
      .get(task.key())
      .map_or(false, |tracked| Arc::ptr_eq(tracked, task));
    if owned {
      inner.keys_in_progress.remove(task.key());
    }
  }

  /// Cancels the key's tracked task, removing it from the queue if it has
  /// not been dequeued yet. A running task keeps executing but its cancel
  /// flag (and the cache mapping check) stops it from installing results;
  /// releasing the marker here lets a recreated key resubmit immediately.
  pub(crate) fn cancel(&self, key: &str) -> Option<Arc<RefillTask<V>>> {
    let mut inner = self.inner.lock();
    let task = inner.keys_in_progress.remove(key)?;
    task.cancel();
    inner.tasks.retain(|queued| !Arc::ptr_eq(queued, &task));
    Some(task)
  }

  /// Stops intake, discards queued-but-undequeued tasks, and wakes every
  /// blocked worker so the pool can drain.
  pub(crate) fn shutdown(&self) {
    let mut inner = self.inner.lock();
    inner.shut_down = true;
    for task in inner.tasks.drain(..) {
      task.cancel();
    }
    inner.keys_in_progress.clear();
    drop(inner);
    self.available.notify_all();
  }

  pub(crate) fn is_shut_down(&self) -> bool {
    self.inner.lock().shut_down
  }

  #[cfg(test)]
  pub(crate) fn queued_len(&self) -> usize {
    self.inner.lock().tasks.len()
  }
}
