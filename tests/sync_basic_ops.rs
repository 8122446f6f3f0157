mod common;

use std::thread;
use std::time::Duration;

use common::CountingRefiller;
use value_queue::{SyncGenerationPolicy, ValueQueueBuilder};

const SETTLE: Duration = Duration::from_millis(300);

#[test]
fn get_next_dispenses_in_fifo_order() {
  let refiller = CountingRefiller::new();
  let queue = ValueQueueBuilder::<usize>::default()
    .num_values(10)
    .refiller(refiller.clone())
    .build()
    .unwrap();

  // The first call finds a cold key, blocks for the refill, and pops the
  // oldest value. Later calls are served straight off the buffer.
  for expected in 0..5 {
    assert_eq!(queue.get_next("key-a").unwrap(), expected);
  }

  let metrics = queue.metrics();
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.hits, 4);
  assert_eq!(metrics.values_dispensed, 5);
  assert_eq!(metrics.keys_created, 1);

  queue.shutdown();
}

#[test]
fn keys_are_buffered_independently() {
  let refiller = CountingRefiller::new();
  let queue = ValueQueueBuilder::<usize>::default()
    .num_values(4)
    .refiller(refiller.clone())
    .build()
    .unwrap();

  let first_a = queue.get_next("key-a").unwrap();
  let first_b = queue.get_next("key-b").unwrap();

  // The counter is global, so the two keys' buffers hold disjoint ranges.
  assert_ne!(first_a, first_b);
  assert_eq!(queue.metrics().keys_created, 2);
  assert_eq!(refiller.fill_calls(), 2);

  queue.shutdown();
}

#[test]
fn get_at_most_returns_at_most_what_is_buffered() {
  let refiller = CountingRefiller::new();
  let queue = ValueQueueBuilder::<usize>::default()
    .num_values(10)
    .refiller(refiller.clone())
    .build()
    .unwrap();

  // Warm the key; nine values remain buffered afterwards.
  assert_eq!(queue.get_next("key-a").unwrap(), 0);

  let batch = queue.get_at_most("key-a", 100).unwrap();
  assert_eq!(batch, (1..10).collect::<Vec<_>>());

  queue.shutdown();
}

#[test]
fn get_at_most_zero_is_a_no_op() {
  let queue = ValueQueueBuilder::<usize>::default()
    .refiller(CountingRefiller::new())
    .build()
    .unwrap();

  assert!(queue.get_at_most("key-a", 0).unwrap().is_empty());

  queue.shutdown();
}

#[test]
fn drain_empties_the_buffer() {
  let refiller = CountingRefiller::new();
  let queue = ValueQueueBuilder::<usize>::default()
    .num_values(10)
    .refiller(refiller.clone())
    .build()
    .unwrap();

  assert_eq!(queue.get_next("key-a").unwrap(), 0);

  let drained = queue.drain("key-a");
  assert_eq!(drained, (1..10).collect::<Vec<_>>());
  assert!(queue.drain("key-a").is_empty());

  queue.shutdown();
}

#[test]
fn drain_cancels_a_pending_refill() {
  // A single slow filler thread is kept busy on key-a, so key-b's refill
  // task is still queued when drain cancels it.
  let refiller = CountingRefiller::with_delay(Duration::from_millis(400));
  let queue = ValueQueueBuilder::<usize>::default()
    .num_values(10)
    .filler_threads(1)
    .policy(SyncGenerationPolicy::LowWatermark)
    .refiller(refiller.clone())
    .build()
    .unwrap();

  assert!(queue.get_at_most("key-a", 1).unwrap().is_empty());
  thread::sleep(Duration::from_millis(50));
  assert!(queue.get_at_most("key-b", 1).unwrap().is_empty());

  queue.drain("key-b");
  thread::sleep(Duration::from_millis(600));

  // Only key-a was ever refilled.
  assert_eq!(refiller.fill_calls(), 1);
  let metrics = queue.metrics();
  assert_eq!(metrics.tasks_cancelled, 1);
  assert_eq!(metrics.values_installed, 10);

  queue.shutdown();
}

#[test]
fn overproduced_values_are_clamped_to_capacity() {
  let refiller = CountingRefiller::new();
  refiller.set_overproduce(3);
  let queue = ValueQueueBuilder::<usize>::default()
    .num_values(5)
    .refiller(refiller.clone())
    .build()
    .unwrap();

  assert_eq!(queue.get_next("key-a").unwrap(), 0);
  thread::sleep(SETTLE);

  // The refiller produced eight values but only five fit.
  assert_eq!(queue.metrics().values_installed, 5);
  assert_eq!(queue.drain("key-a"), vec![1, 2, 3, 4]);

  queue.shutdown();
}
