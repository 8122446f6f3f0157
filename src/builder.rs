use crate::error::BuildError;
use crate::handles::{SyncGenerationPolicy, ValueQueue};
use crate::listener::EvictionListener;
use crate::metrics::Metrics;
use crate::refiller::QueueRefiller;
use crate::shared::QueueShared;
use crate::store::QueueStore;
use crate::task::filler::{FillerContext, FillerPool};
use crate::task::janitor::{Janitor, JanitorContext};
use crate::task::notifier::Notifier;
use crate::task::refill_queue::RefillQueue;

use core::fmt;
use std::hash::BuildHasher;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// A builder for creating `ValueQueue` instances.
pub struct ValueQueueBuilder<V: Send, H = ahash::RandomState> {
  num_values: usize,
  low_watermark: f32,
  expiry: Duration,
  filler_threads: usize,
  policy: SyncGenerationPolicy,
  max_keys: usize,
  shards: usize,
  refill_timeout: Duration,
  janitor_tick_interval: Option<Duration>,
  hasher: H,
  refiller: Option<Arc<dyn QueueRefiller<V>>>,
  listener: Option<Arc<dyn EvictionListener>>,
}

impl<V: Send, H> fmt::Debug for ValueQueueBuilder<V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ValueQueueBuilder")
      .field("num_values", &self.num_values)
      .field("low_watermark", &self.low_watermark)
      .field("expiry", &self.expiry)
      .field("filler_threads", &self.filler_threads)
      .field("policy", &self.policy)
      .field("shards", &self.shards)
      .field("has_refiller", &self.refiller.is_some())
      .finish_non_exhaustive()
  }
}

impl<V: Send, H: BuildHasher + Default> ValueQueueBuilder<V, H> {
  /// Creates a new builder with default settings.
  pub fn new() -> Self {
    Self {
      num_values: 100,
      low_watermark: 0.3,
      expiry: Duration::from_secs(600),
      filler_threads: 2,
      policy: SyncGenerationPolicy::AtLeastOne,
      max_keys: usize::MAX,
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      refill_timeout: Duration::from_secs(30),
      janitor_tick_interval: None,
      hasher: H::default(),
      refiller: None,
      listener: None,
    }
  }
}

impl<V: Send> Default for ValueQueueBuilder<V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- General configuration methods ---
impl<V: Send, H> ValueQueueBuilder<V, H> {
  /// Sets the per-key buffer capacity. Required to be greater than zero.
  pub fn num_values(mut self, num_values: usize) -> Self {
    self.num_values = num_values;
    self
  }

  /// Sets the fraction of capacity at or below which a pop triggers a
  /// background top-up. Must be in `(0, 1]`.
  pub fn low_watermark(mut self, low_watermark: f32) -> Self {
    self.low_watermark = low_watermark;
    self
  }

  /// Sets how long an untouched key's buffer survives before the janitor
  /// evicts it.
  pub fn expiry(mut self, expiry: Duration) -> Self {
    self.expiry = expiry;
    self
  }

  /// Sets the number of background filler threads.
  pub fn filler_threads(mut self, filler_threads: usize) -> Self {
    self.filler_threads = filler_threads;
    self
  }

  /// Sets the blocking policy applied when a consumer finds a buffer empty.
  pub fn policy(mut self, policy: SyncGenerationPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Bounds the number of distinct keys tracked. When a shard is full, the
  /// least-recently-used queue is evicted to make room. Defaults to
  /// unbounded.
  pub fn max_keys(mut self, max_keys: usize) -> Self {
    self.max_keys = max_keys;
    self
  }

  /// Sets the number of lock shards.
  pub fn shards(mut self, shards: usize) -> Self {
    // Ensure shards is at least 1 and a power of two for fast masking.
    self.shards = shards.max(1).next_power_of_two();
    self
  }

  /// Bounds every blocking wait inside `get_next` / `get_at_most`. A wait
  /// that outlives this duration returns `QueueError::Timeout` instead of
  /// hanging.
  pub fn refill_timeout(mut self, refill_timeout: Duration) -> Self {
    self.refill_timeout = refill_timeout;
    self
  }

  /// Sets the external generator that tops up key buffers. Required.
  pub fn refiller<R>(mut self, refiller: R) -> Self
  where
    R: QueueRefiller<V> + 'static,
  {
    self.refiller = Some(Arc::new(refiller));
    self
  }

  /// Sets the eviction listener for the queue.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// Sets the tick interval for the background expiry sweep.
  /// (Primarily for testing purposes).
  #[doc(hidden)]
  pub fn janitor_tick_interval(mut self, duration: Duration) -> Self {
    self.janitor_tick_interval = Some(duration);
    self
  }
}

// --- Build methods ---
impl<V, H> ValueQueueBuilder<V, H>
where
  V: Send + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Sets the hasher used for key-to-shard mapping.
  pub fn hasher(mut self, hasher: H) -> Self {
    self.hasher = hasher;
    self
  }

  /// Builds the queue, spawning the filler pool and the janitor.
  pub fn build(mut self) -> Result<ValueQueue<V, H>, BuildError> {
    self.validate()?;
    let refiller = match self.refiller.take() {
      Some(refiller) => refiller,
      None => return Err(BuildError::RefillerRequired),
    };

    let store = Arc::new(QueueStore::new(self.shards, self.hasher.clone()));
    let metrics = Arc::new(Metrics::new());
    let refill_queue = Arc::new(RefillQueue::new());

    let (notifier, notification_sender) = match self.listener.take() {
      Some(listener) => {
        let (notifier, sender) = Notifier::spawn(listener);
        (Some(notifier), Some(sender))
      }
      None => (None, None),
    };

    let fillers = FillerPool::spawn(
      FillerContext {
        store: Arc::clone(&store),
        refill_queue: Arc::clone(&refill_queue),
        refiller,
        metrics: Arc::clone(&metrics),
        num_values: self.num_values,
      },
      self.filler_threads,
    );

    let janitor = Janitor::spawn(
      JanitorContext {
        store: Arc::clone(&store),
        refill_queue: Arc::clone(&refill_queue),
        metrics: Arc::clone(&metrics),
        notification_sender: notification_sender.clone(),
        expiry: self.expiry,
      },
      self.janitor_tick_interval.unwrap_or(Duration::from_secs(1)),
    );

    let per_shard_capacity = if self.max_keys == usize::MAX {
      usize::MAX
    } else {
      (self.max_keys / self.shards).max(1)
    };
    let watermark_count = (self.num_values as f32 * self.low_watermark) as usize;

    Ok(ValueQueue {
      shared: Arc::new(QueueShared {
        store,
        refill_queue,
        metrics,
        fillers: Mutex::new(Some(fillers)),
        janitor: Mutex::new(Some(janitor)),
        notifier: Mutex::new(notifier),
        notification_sender: Mutex::new(notification_sender),
        num_values: self.num_values,
        watermark_count,
        policy: self.policy,
        refill_timeout: self.refill_timeout,
        per_shard_capacity,
        shut_down: AtomicBool::new(false),
      }),
    })
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.num_values == 0 {
      return Err(BuildError::ZeroValues);
    }
    if !(self.low_watermark > 0.0 && self.low_watermark <= 1.0) {
      return Err(BuildError::InvalidWatermark);
    }
    if self.filler_threads == 0 {
      return Err(BuildError::ZeroFillerThreads);
    }
    if self.refiller.is_none() {
      return Err(BuildError::RefillerRequired);
    }
    Ok(())
  }
}
