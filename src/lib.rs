//! A key-partitioned, asynchronously replenished value cache.
//!
//! Consumer threads pop pre-generated opaque values for a named key (e.g.,
//! pre-fetched cryptographic key material from a slow remote generator) with
//! low latency, while a bounded pool of filler threads keeps each key's
//! supply topped up. The slow generator sits behind the [`QueueRefiller`]
//! trait and is never called on the consumer path.
//!
//! # Features
//! - **High Concurrency**: a sharded lock table keeps operations on keys in
//!   different shards fully parallel.
//! - **Single-Flight Refills**: a deduplicating work queue guarantees at most
//!   one queued refill per key, so a hundred consumers draining the same key
//!   cost one generator call.
//! - **Watermark Top-Up**: every pop that leaves a buffer at or below the low
//!   watermark schedules a background refill, keeping consumers off the
//!   blocking path in steady state.
//! - **Bounded Blocking**: the `AtLeastOne`/`All` policies block an empty-case
//!   caller only until the refill lands, a failure surfaces, or the
//!   configured timeout expires.
//! - **Observability**: exposes detailed metrics and an optional eviction
//!   listener.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;
pub mod refiller;

// Internal, crate-only modules
mod entry;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::ValueQueueBuilder;
pub use error::{BuildError, GenerationError, QueueError};
pub use handles::{SyncGenerationPolicy, ValueQueue};
pub use listener::{EvictionListener, EvictionReason};
pub use metrics::MetricsSnapshot;
pub use refiller::QueueRefiller;
