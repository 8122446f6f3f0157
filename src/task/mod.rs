pub(crate) mod filler;
pub(crate) mod janitor;
pub(crate) mod notifier;
pub(crate) mod refill_queue;
