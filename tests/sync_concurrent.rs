mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use common::CountingRefiller;
use value_queue::{ValueQueue, ValueQueueBuilder};

const NUM_THREADS: usize = 8;
const POPS_PER_THREAD: usize = 50;

#[test]
fn values_are_never_dispensed_twice_under_contention() {
  let refiller = CountingRefiller::new();
  let queue: Arc<ValueQueue<usize>> = Arc::new(
    ValueQueueBuilder::default()
      .num_values(20)
      .refiller(refiller.clone())
      .build()
      .unwrap(),
  );

  let handles: Vec<_> = (0..NUM_THREADS)
    .map(|_| {
      let queue = Arc::clone(&queue);
      thread::spawn(move || {
        let mut seen = Vec::with_capacity(POPS_PER_THREAD);
        for _ in 0..POPS_PER_THREAD {
          seen.push(queue.get_next("key-a").unwrap());
        }
        seen
      })
    })
    .collect();

  let mut all_values = HashSet::new();
  for handle in handles {
    for value in handle.join().unwrap() {
      // A duplicate here means two consumers popped the same value.
      assert!(all_values.insert(value), "value dispensed twice");
    }
  }

  let total = (NUM_THREADS * POPS_PER_THREAD) as u64;
  assert_eq!(all_values.len() as u64, total);
  assert_eq!(queue.metrics().values_dispensed, total);

  queue.shutdown();
}

#[test]
fn contended_keys_in_different_shards_do_not_interfere() {
  let refiller = CountingRefiller::new();
  let queue: Arc<ValueQueue<usize>> = Arc::new(
    ValueQueueBuilder::default()
      .num_values(20)
      .shards(8)
      .refiller(refiller.clone())
      .build()
      .unwrap(),
  );

  let handles: Vec<_> = (0..NUM_THREADS)
    .map(|thread_id| {
      let queue = Arc::clone(&queue);
      thread::spawn(move || {
        let key = format!("key-{}", thread_id);
        let mut seen = Vec::with_capacity(POPS_PER_THREAD);
        for _ in 0..POPS_PER_THREAD {
          seen.push(queue.get_next(&key).unwrap());
        }
        seen
      })
    })
    .collect();

  let mut all_values = HashSet::new();
  for handle in handles {
    for value in handle.join().unwrap() {
      assert!(all_values.insert(value), "value dispensed twice");
    }
  }

  assert_eq!(all_values.len(), NUM_THREADS * POPS_PER_THREAD);
  assert_eq!(queue.metrics().keys_created, NUM_THREADS as u64);

  queue.shutdown();
}
