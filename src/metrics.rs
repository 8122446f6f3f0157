use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the value queue.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Consumer-facing path ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) values_dispensed: CachePadded<AtomicU64>,

  // --- Refill pipeline ---
  pub(crate) refills_submitted: CachePadded<AtomicU64>,
  pub(crate) refills_deduplicated: CachePadded<AtomicU64>,
  pub(crate) refills_completed: CachePadded<AtomicU64>,
  pub(crate) refills_failed: CachePadded<AtomicU64>,
  pub(crate) tasks_cancelled: CachePadded<AtomicU64>,
  pub(crate) values_installed: CachePadded<AtomicU64>,

  // --- Key lifecycle ---
  pub(crate) keys_created: CachePadded<AtomicU64>,
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) evicted_by_expiry: CachePadded<AtomicU64>,

  created_at: Instant,
}

// Manual implementation of Default to handle the non-default `Instant`.
impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      values_dispensed: CachePadded::new(AtomicU64::new(0)),
      refills_submitted: CachePadded::new(AtomicU64::new(0)),
      refills_deduplicated: CachePadded::new(AtomicU64::new(0)),
      refills_completed: CachePadded::new(AtomicU64::new(0)),
      refills_failed: CachePadded::new(AtomicU64::new(0)),
      tasks_cancelled: CachePadded::new(AtomicU64::new(0)),
      values_installed: CachePadded::new(AtomicU64::new(0)),
      keys_created: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      evicted_by_expiry: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      values_dispensed: self.values_dispensed.load(Ordering::Relaxed),
      refills_submitted: self.refills_submitted.load(Ordering::Relaxed),
      refills_deduplicated: self.refills_deduplicated.load(Ordering::Relaxed),
      refills_completed: self.refills_completed.load(Ordering::Relaxed),
      refills_failed: self.refills_failed.load(Ordering::Relaxed),
      tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
      values_installed: self.values_installed.load(Ordering::Relaxed),
      keys_created: self.keys_created.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      evicted_by_expiry: self.evicted_by_expiry.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the queue's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Calls served at least one value straight off the buffer.
  pub hits: u64,
  /// Calls that found the key's buffer empty on arrival.
  pub misses: u64,
  /// The hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// The total number of values handed to consumers.
  pub values_dispensed: u64,
  /// Refill tasks accepted by the work queue.
  pub refills_submitted: u64,
  /// Refill submissions dropped because the key was already in flight.
  pub refills_deduplicated: u64,
  /// Refill tasks whose results were installed.
  pub refills_completed: u64,
  /// Refill tasks dropped because the refiller reported a failure.
  pub refills_failed: u64,
  /// Refill tasks cancelled before (or instead of) installing results.
  pub tasks_cancelled: u64,
  /// The total number of values appended to key buffers by refills.
  pub values_installed: u64,
  /// The number of key buffers created on first access.
  pub keys_created: u64,
  /// Key buffers evicted because the cache was over its key capacity.
  pub evicted_by_capacity: u64,
  /// Key buffers evicted after sitting idle longer than `expiry`.
  pub evicted_by_expiry: u64,
  /// The number of seconds the queue has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("values_dispensed", &self.values_dispensed)
      .field("refills_submitted", &self.refills_submitted)
      .field("refills_deduplicated", &self.refills_deduplicated)
      .field("refills_completed", &self.refills_completed)
      .field("refills_failed", &self.refills_failed)
      .field("tasks_cancelled", &self.tasks_cancelled)
      .field("values_installed", &self.values_installed)
      .field("keys_created", &self.keys_created)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("evicted_by_expiry", &self.evicted_by_expiry)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
