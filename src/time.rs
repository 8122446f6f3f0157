use once_cell::sync::Lazy;
use std::time::Instant;

// The single, static reference point for all recency stamps in the queue
// cache. It is initialized lazily on its first use.
static QUEUE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns the current time as whole nanoseconds since the process epoch.
///
/// Stamps produced here are only ever compared against each other, so the
/// epoch itself is arbitrary.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  Instant::now()
    .saturating_duration_since(*QUEUE_EPOCH)
    .as_nanos() as u64
}
