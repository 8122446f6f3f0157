use crate::listener::{EvictionListener, EvictionReason};

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use fibre::mpsc;

/// A message sent to the notifier task.
pub(crate) type Notification = (String, EvictionReason);

/// The background task responsible for calling the user-provided eviction
/// listener, so eviction paths never block on user code.
pub(crate) struct Notifier {
  _handle: JoinHandle<()>,
  _sender: mpsc::BoundedSender<Notification>,
}

impl Notifier {
  /// Spawns a new notifier thread.
  pub(crate) fn spawn(
    listener: Arc<dyn EvictionListener>,
  ) -> (Self, mpsc::BoundedSender<Notification>) {
    // A simple, bounded MPSC channel for notifications.
    const NOTIFICATION_CHANNEL_CAPACITY: usize = 128;
    let (tx, rx): (
      mpsc::BoundedSender<Notification>,
      mpsc::BoundedReceiver<Notification>,
    ) = mpsc::bounded(NOTIFICATION_CHANNEL_CAPACITY);

    let handle = thread::spawn(move || {
      // The loop ends when the channel is disconnected, i.e. when every
      // sender clone held by the queue has been dropped.
      while let Ok((key, reason)) = rx.recv() {
        listener.on_evict(key, reason);
      }
    });

    let notifier = Self {
      _handle: handle,
      _sender: tx.clone(),
    };

    (notifier, tx)
  }

  /// Drops this task's sender clone; the thread terminates once the
  /// remaining clones held by the queue are dropped too.
  pub(crate) fn stop(self) {
    drop(self._sender);
  }
}
