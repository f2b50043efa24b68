// src/broadcast/gate.rs

//! The pending-value signal shared by every caught-up listener.

use super::state::ListenerId;

use std::fmt;
use std::task::Waker;

/// One outstanding "next value" signal.
///
/// Holds a waiter record per blocked listener. Each record can be withdrawn
/// on its own (cancellation, drop) without disturbing the others. The whole
/// signal is taken out of the state and resolved at once when a value is
/// appended or the upstream ends.
pub(crate) struct PendingValue {
  waiters: Vec<(ListenerId, Waker)>,
}

impl PendingValue {
  pub(crate) fn new() -> Self {
    Self {
      waiters: Vec::new(),
    }
  }

  /// Records `waker` as the wake-up target for `id`.
  ///
  /// A listener that is polled again while still waiting replaces its old
  /// record instead of adding a second one.
  pub(crate) fn register(&mut self, id: ListenerId, waker: &Waker) {
    match self.waiters.iter_mut().find(|(waiter, _)| *waiter == id) {
      Some((_, existing)) => {
        if !existing.will_wake(waker) {
          existing.clone_from(waker);
        }
      }
      None => self.waiters.push((id, waker.clone())),
    }
  }

  /// Withdraws `id`'s record, if it has one.
  pub(crate) fn deregister(&mut self, id: ListenerId) {
    self.waiters.retain(|(waiter, _)| *waiter != id);
  }

  pub(crate) fn len(&self) -> usize {
    self.waiters.len()
  }

  #[cfg(test)]
  pub(crate) fn is_waiting(&self, id: ListenerId) -> bool {
    self.waiters.iter().any(|(waiter, _)| *waiter == id)
  }

  /// Wakes every recorded waiter. Must be called after the state lock has
  /// been released.
  pub(crate) fn resolve(self) {
    for (_, waker) in self.waiters {
      waker.wake();
    }
  }
}

impl fmt::Debug for PendingValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PendingValue")
      .field("waiters", &self.waiters.len())
      .finish()
  }
}
