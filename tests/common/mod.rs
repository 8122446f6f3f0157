#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use value_queue::{GenerationError, QueueRefiller};

/// A refiller producing globally unique, monotonically increasing `usize`
/// values. Values appended for one key are therefore strictly ascending,
/// which makes FIFO and no-double-dispense assertions easy.
#[derive(Clone, Default)]
pub struct CountingRefiller {
  inner: Arc<RefillerInner>,
}

#[derive(Default)]
struct RefillerInner {
  counter: AtomicUsize,
  fill_calls: AtomicUsize,
  delay_ms: AtomicU64,
  /// 0 means "produce exactly what was requested".
  max_per_call: AtomicUsize,
  fail: AtomicBool,
  /// Extra values to overproduce per call, to exercise capacity clamping.
  overproduce: AtomicUsize,
}

impl CountingRefiller {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_delay(delay: Duration) -> Self {
    let refiller = Self::default();
    refiller.set_delay(delay);
    refiller
  }

  /// How many times `fill_queue_for_key` has been invoked.
  pub fn fill_calls(&self) -> usize {
    self.inner.fill_calls.load(Ordering::SeqCst)
  }

  pub fn set_delay(&self, delay: Duration) {
    self
      .inner
      .delay_ms
      .store(delay.as_millis() as u64, Ordering::SeqCst);
  }

  /// Caps how many values a single call produces, to force partial refills.
  pub fn set_max_per_call(&self, max: usize) {
    self.inner.max_per_call.store(max, Ordering::SeqCst);
  }

  pub fn set_fail(&self, fail: bool) {
    self.inner.fail.store(fail, Ordering::SeqCst);
  }

  pub fn set_overproduce(&self, extra: usize) {
    self.inner.overproduce.store(extra, Ordering::SeqCst);
  }
}

impl QueueRefiller<usize> for CountingRefiller {
  fn fill_queue_for_key(
    &self,
    key_name: &str,
    queue: &mut VecDeque<usize>,
    num_values: usize,
  ) -> Result<(), GenerationError> {
    self.inner.fill_calls.fetch_add(1, Ordering::SeqCst);

    let delay_ms = self.inner.delay_ms.load(Ordering::SeqCst);
    if delay_ms > 0 {
      std::thread::sleep(Duration::from_millis(delay_ms));
    }

    if self.inner.fail.load(Ordering::SeqCst) {
      return Err(GenerationError::new(format!(
        "generator unavailable for {}",
        key_name
      )));
    }

    let max_per_call = self.inner.max_per_call.load(Ordering::SeqCst);
    let mut produce = if max_per_call == 0 {
      num_values
    } else {
      num_values.min(max_per_call)
    };
    produce += self.inner.overproduce.load(Ordering::SeqCst);

    for _ in 0..produce {
      queue.push_back(self.inner.counter.fetch_add(1, Ordering::SeqCst));
    }
    Ok(())
  }
}
