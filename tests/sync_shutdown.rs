mod common;

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::CountingRefiller;
use value_queue::{GenerationError, QueueError, ValueQueue, ValueQueueBuilder};

#[test]
fn shutdown_is_idempotent_and_rejects_later_calls() {
  let queue = ValueQueueBuilder::<usize>::default()
    .num_values(10)
    .refiller(CountingRefiller::new())
    .build()
    .unwrap();

  assert_eq!(queue.get_next("key-a").unwrap(), 0);

  queue.shutdown();
  queue.shutdown();

  assert_eq!(queue.get_next("key-a").err(), Some(QueueError::ShutDown));
  assert_eq!(
    queue.get_at_most("key-a", 5).err(),
    Some(QueueError::ShutDown)
  );
}

#[test]
fn shutdown_wakes_a_blocked_waiter() {
  // The refiller reports success without producing anything, so the waiter
  // would otherwise sleep out its full ten-second timeout.
  let refiller = |_key: &str, _queue: &mut VecDeque<usize>, _num: usize| {
    thread::sleep(Duration::from_millis(20));
    Ok::<(), GenerationError>(())
  };
  let queue: Arc<ValueQueue<usize>> = Arc::new(
    ValueQueueBuilder::default()
      .num_values(10)
      .refill_timeout(Duration::from_secs(10))
      .refiller(refiller)
      .build()
      .unwrap(),
  );

  let waiter = {
    let queue = Arc::clone(&queue);
    thread::spawn(move || queue.get_next("key-a"))
  };
  thread::sleep(Duration::from_millis(100));

  let start = Instant::now();
  queue.shutdown();
  let result = waiter.join().unwrap();

  assert_eq!(result.err(), Some(QueueError::ShutDown));
  assert!(
    start.elapsed() < Duration::from_secs(2),
    "waiter was not woken promptly"
  );

  // The woken waiter bails out before re-resolving its key, so it does not
  // repopulate the cleared store.
  assert_eq!(queue.metrics().keys_created, 1);
}
