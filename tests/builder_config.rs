mod common;

use common::CountingRefiller;
use value_queue::{BuildError, ValueQueueBuilder};

#[test]
fn build_requires_a_refiller() {
  let result = ValueQueueBuilder::<usize>::default().build();
  assert_eq!(result.err(), Some(BuildError::RefillerRequired));
}

#[test]
fn build_rejects_zero_capacity() {
  let result = ValueQueueBuilder::<usize>::default()
    .num_values(0)
    .refiller(CountingRefiller::new())
    .build();
  assert_eq!(result.err(), Some(BuildError::ZeroValues));
}

#[test]
fn build_rejects_watermark_out_of_range() {
  let result = ValueQueueBuilder::<usize>::default()
    .low_watermark(0.0)
    .refiller(CountingRefiller::new())
    .build();
  assert_eq!(result.err(), Some(BuildError::InvalidWatermark));

  let result = ValueQueueBuilder::<usize>::default()
    .low_watermark(1.5)
    .refiller(CountingRefiller::new())
    .build();
  assert_eq!(result.err(), Some(BuildError::InvalidWatermark));
}

#[test]
fn build_rejects_zero_filler_threads() {
  let result = ValueQueueBuilder::<usize>::default()
    .filler_threads(0)
    .refiller(CountingRefiller::new())
    .build();
  assert_eq!(result.err(), Some(BuildError::ZeroFillerThreads));
}

#[test]
fn build_succeeds_with_defaults() {
  let queue = ValueQueueBuilder::<usize>::default()
    .refiller(CountingRefiller::new())
    .build()
    .unwrap();

  let metrics = queue.metrics();
  assert_eq!(metrics.hits, 0);
  assert_eq!(metrics.misses, 0);
  assert_eq!(metrics.keys_created, 0);
  assert_eq!(metrics.values_dispensed, 0);

  queue.shutdown();
}

#[test]
fn zero_shards_is_clamped_to_one() {
  // The setter clamps rather than erroring, so construction still succeeds
  // and the queue works off a single shard.
  let queue = ValueQueueBuilder::<usize>::default()
    .shards(0)
    .refiller(CountingRefiller::new())
    .build()
    .unwrap();

  assert_eq!(queue.get_next("key-a").unwrap(), 0);

  queue.shutdown();
}

#[test]
fn full_watermark_is_accepted() {
  // A watermark of 1.0 means every pop schedules a top-up.
  let queue = ValueQueueBuilder::<usize>::default()
    .low_watermark(1.0)
    .refiller(CountingRefiller::new())
    .build()
    .unwrap();
  queue.shutdown();
}
