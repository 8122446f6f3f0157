use crate::metrics::Metrics;
use crate::refiller::QueueRefiller;
use crate::store::QueueStore;
use crate::task::refill_queue::{RefillQueue, RefillTask};

use std::collections::VecDeque;
use std::hash::BuildHasher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long an idle worker waits for work before re-checking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A context object holding the thread-safe parts of the queue that the
/// filler workers need to access.
pub(crate) struct FillerContext<V: Send, H> {
  pub(crate) store: Arc<QueueStore<V, H>>,
  pub(crate) refill_queue: Arc<RefillQueue<V>>,
  pub(crate) refiller: Arc<dyn QueueRefiller<V>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) num_values: usize,
}

impl<V: Send, H> Clone for FillerContext<V, H> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      refill_queue: Arc::clone(&self.refill_queue),
      refiller: Arc::clone(&self.refiller),
      metrics: Arc::clone(&self.metrics),
      num_values: self.num_values,
    }
  }
}

/// The fixed pool of background threads that drain the refill work queue and
/// invoke the external refiller.
pub(crate) struct FillerPool {
  handles: Vec<JoinHandle<()>>,
}

impl FillerPool {
  pub(crate) fn spawn<V, H>(context: FillerContext<V, H>, num_threads: usize) -> Self
  where
    V: Send + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let mut handles = Vec::with_capacity(num_threads);
    for _ in 0..num_threads {
      let ctx = context.clone();
      handles.push(thread::spawn(move || worker_loop(ctx)));
    }
    Self { handles }
  }

  /// Waits for every worker to observe the work queue's shutdown and exit.
  /// In-flight refills run to completion first.
  pub(crate) fn join(self) {
    for handle in self.handles {
      let _ = handle.join();
    }
  }
}

fn worker_loop<V, H>(ctx: FillerContext<V, H>)
where
  V: Send,
  H: BuildHasher + Clone,
{
  loop {
    match ctx.refill_queue.poll(POLL_INTERVAL) {
      Some(task) => run_task(&ctx, task),
      None => {
        if ctx.refill_queue.is_shut_down() {
          break;
        }
      }
    }
  }
}

fn run_task<V, H>(ctx: &FillerContext<V, H>, task: Arc<RefillTask<V>>)
where
  V: Send,
  H: BuildHasher + Clone,
{
  // Cancellation of a tracked task is counted by whoever cancelled it.
  if task.is_cancelled() {
    ctx.refill_queue.finish(&task);
    return;
  }

  // The deficit is computed at execution time, not submission time: a task
  // submitted against a fuller queue must not overfill it.
  let needed = ctx.num_values.saturating_sub(task.queue().len());
  if needed == 0 {
    ctx.refill_queue.finish(&task);
    return;
  }

  // Generate into an intermediate buffer so the refiller never touches the
  // live queue; results are merged atomically afterwards.
  let mut generated = VecDeque::with_capacity(needed);
  let result = ctx
    .refiller
    .fill_queue_for_key(task.key(), &mut generated, needed);

  // Release the key before publishing the outcome. A waiter woken by the
  // install below can then immediately submit a follow-up refill instead of
  // being deduplicated against a task that is already done.
  ctx.refill_queue.finish(&task);

  match result {
    Ok(()) => install(ctx, &task, generated),
    Err(error) => {
      // A failed refill is dropped, counted, and reported to waiters; the
      // queue is left as-is so the next demand retries.
      ctx.metrics.refills_failed.fetch_add(1, Ordering::Relaxed);
      task.queue().record_failure(error);
    }
  }
}

fn install<V, H>(ctx: &FillerContext<V, H>, task: &RefillTask<V>, generated: VecDeque<V>)
where
  V: Send,
  H: BuildHasher + Clone,
{
  let shard = ctx.store.get_shard(task.key());
  let guard = shard.write();

  // Cancellation observed after the generator call, or an eviction that
  // replaced or removed this queue: discard the results instead of
  // installing them. An explicit cancel was already counted by the caller
  // that issued it; only the silent unmap case is counted here.
  let still_mapped = guard
    .get(task.key())
    .map_or(false, |current| Arc::ptr_eq(current, task.queue()));
  if task.is_cancelled() || !still_mapped {
    if !task.is_cancelled() {
      ctx.metrics.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
    }
    return;
  }

  let installed = task.queue().install(generated, ctx.num_values);
  ctx
    .metrics
    .values_installed
    .fetch_add(installed as u64, Ordering::Relaxed);
  ctx
    .metrics
    .refills_completed
    .fetch_add(1, Ordering::Relaxed);
}
