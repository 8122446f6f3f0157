use crate::error::GenerationError;
use crate::time;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// The mutable interior of a `KeyQueue`, guarded by its mutex.
pub(crate) struct QueueState<V> {
  /// Buffered values, dispensed strictly FIFO. Never longer than the
  /// configured per-key capacity.
  values: VecDeque<V>,
  /// Monotonic count of completed installs. Lets a blocked waiter tell a
  /// partial refill apart from a spurious wakeup.
  installs: u64,
  /// Monotonic count of refill failures for this queue.
  failures: u64,
  last_error: Option<GenerationError>,
  /// Set once when the queue is evicted. A retired queue never receives
  /// another install; waiters re-resolve the key.
  retired: bool,
}

/// How a blocking wait on a `KeyQueue` ended.
pub(crate) enum WaitOutcome<V> {
  /// The wanted level was reached; `values` were popped and `remaining` is
  /// the buffer length afterwards.
  Ready { values: Vec<V>, remaining: usize },
  /// A refill completed but the wanted level was not reached. The caller
  /// should resubmit (deduplicated, so cheap) and wait again.
  Progress,
  /// A refill this caller was waiting on failed.
  Failed(GenerationError),
  /// The queue was evicted while waiting.
  Retired,
  TimedOut,
}

/// The bounded, ordered buffer of pending values for one key.
///
/// Mutation of the buffer goes through the interior mutex; the owning shard's
/// read/write lock additionally serializes structural operations (creation,
/// eviction, refill installation) against lookups, mirroring how the sharded
/// store guards its maps.
pub(crate) struct KeyQueue<V> {
  name: Arc<str>,
  state: Mutex<QueueState<V>>,
  /// Signalled on install, refill failure, and retirement.
  refilled: Condvar,
  /// Nanoseconds since the process epoch of the last access or install.
  last_access: AtomicU64,
}

impl<V> KeyQueue<V> {
  pub(crate) fn new(name: Arc<str>) -> Self {
    Self {
      name,
      state: Mutex::new(QueueState {
        values: VecDeque::new(),
        installs: 0,
        failures: 0,
        last_error: None,
        retired: false,
      }),
      refilled: Condvar::new(),
      last_access: AtomicU64::new(time::now_nanos()),
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn name_arc(&self) -> &Arc<str> {
    &self.name
  }

  /// Refreshes the recency stamp used by LRU eviction and idle expiry.
  #[inline]
  pub(crate) fn touch(&self) {
    self.last_access.store(time::now_nanos(), Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn last_access(&self) -> u64 {
    self.last_access.load(Ordering::Relaxed)
  }

  pub(crate) fn len(&self) -> usize {
    self.state.lock().values.len()
  }

  pub(crate) fn is_retired(&self) -> bool {
    self.state.lock().retired
  }

  pub(crate) fn failure_count(&self) -> u64 {
    self.state.lock().failures
  }

  pub(crate) fn install_count(&self) -> u64 {
    self.state.lock().installs
  }

  /// Pops up to `num` values, returning them with the remaining length.
  pub(crate) fn try_pop(&self, num: usize) -> (Vec<V>, usize) {
    let mut state = self.state.lock();
    let take = num.min(state.values.len());
    let popped = state.values.drain(..take).collect();
    (popped, state.values.len())
  }

  /// Removes and returns every buffered value.
  pub(crate) fn take_all(&self) -> Vec<V> {
    let mut state = self.state.lock();
    state.values.drain(..).collect()
  }

  /// Appends refill results, truncating to `capacity`, and wakes waiters.
  /// Returns how many values were actually installed; zero if the queue has
  /// been retired in the meantime.
  pub(crate) fn install(&self, mut generated: VecDeque<V>, capacity: usize) -> usize {
    let mut state = self.state.lock();
    if state.retired {
      return 0;
    }
    let room = capacity.saturating_sub(state.values.len());
    let installed = generated.len().min(room);
    state.values.extend(generated.drain(..).take(room));
    state.installs += 1;
    state.last_error = None;
    drop(state);
    self.touch();
    self.refilled.notify_all();
    installed
  }

  /// Records a refill failure and wakes waiters so they can surface it.
  pub(crate) fn record_failure(&self, error: GenerationError) {
    let mut state = self.state.lock();
    state.failures += 1;
    state.last_error = Some(error);
    drop(state);
    self.refilled.notify_all();
  }

  /// Marks the queue as evicted and wakes any blocked waiters. Buffered
  /// values are dropped with the queue once the last reference goes away.
  pub(crate) fn retire(&self) {
    let mut state = self.state.lock();
    state.retired = true;
    drop(state);
    self.refilled.notify_all();
  }

  /// Blocks until the buffer holds at least `want` values, then pops up to
  /// `take` of them.
  ///
  /// Both baselines must be sampled *before* the caller submits its refill
  /// task. An install or failure that lands in the window between submission
  /// and this call is then still observed, instead of the waiter sleeping
  /// through it; and an old error cannot leak into a fresh wait.
  pub(crate) fn await_values(
    &self,
    want: usize,
    take: usize,
    failures_at_entry: u64,
    installs_at_entry: u64,
    deadline: Instant,
  ) -> WaitOutcome<V> {
    let mut state = self.state.lock();
    loop {
      if state.retired {
        return WaitOutcome::Retired;
      }
      if state.failures > failures_at_entry {
        let error = state
          .last_error
          .clone()
          .unwrap_or_else(|| GenerationError::new("refill failed"));
        return WaitOutcome::Failed(error);
      }
      if state.values.len() >= want {
        let n = take.min(state.values.len());
        let values = state.values.drain(..n).collect();
        return WaitOutcome::Ready {
          values,
          remaining: state.values.len(),
        };
      }
      if state.installs > installs_at_entry {
        // A refill landed but fell short of `want`.
        return WaitOutcome::Progress;
      }
      if Instant::now() >= deadline {
        return WaitOutcome::TimedOut;
      }
      self.refilled.wait_until(&mut state, deadline);
    }
  }
}
