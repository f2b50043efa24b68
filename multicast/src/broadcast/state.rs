// src/broadcast/state.rs

//! The shared buffer, the listener registry and the trimmer.
//!
//! [`State`] is plain data with no synchronization of its own. Every method
//! on it is one indivisible step; [`Shared`] wraps it in a mutex, keeps the
//! counters, logs, and wakes waiters only after the lock is released.

use super::gate::PendingValue;
use crate::error::UpstreamError;
use crate::stats::Stats;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::task::Waker;

use parking_lot::Mutex;

/// Identity of one listener, unique for the lifetime of its broadcaster.
///
/// Ids are handed out from a monotonically increasing counter and are never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
  /// The raw counter value behind this id.
  pub fn as_u64(self) -> u64 {
    self.0
  }
}

impl fmt::Display for ListenerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "L{}", self.0)
  }
}

/// Where the ingestion loop stands with respect to its upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamState {
  /// The upstream may still produce values. A broadcaster built with
  /// [`Broadcaster::empty`](crate::Broadcaster::empty) stays here forever.
  Active,
  /// The upstream finished normally.
  Completed,
  /// The upstream yielded an error; see
  /// [`Broadcaster::upstream_error`](crate::Broadcaster::upstream_error).
  Failed,
}

impl UpstreamState {
  /// Returns `true` once no further values will be appended.
  pub fn is_finished(self) -> bool {
    !matches!(self, UpstreamState::Active)
  }
}

/// Outcome of one pull attempt by a listener.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pull<T> {
  /// The value at the listener's cursor; the cursor has been advanced.
  Value(T),
  /// The listener is caught up and the upstream is still active.
  Empty,
  /// The listener is caught up and nothing more will arrive, or the
  /// listener is no longer registered.
  Ended,
}

pub(crate) struct State<T> {
  buffer: VecDeque<T>,
  cursors: HashMap<ListenerId, usize>,
  next_id: u64,
  pending: Option<PendingValue>,
  upstream: UpstreamState,
  failure: Option<UpstreamError>,
}

impl<T> State<T> {
  pub(crate) fn new() -> Self {
    Self {
      buffer: VecDeque::new(),
      cursors: HashMap::new(),
      next_id: 0,
      pending: None,
      upstream: UpstreamState::Active,
      failure: None,
    }
  }

  /// Registers a new listener positioned at the current end of the buffer.
  pub(crate) fn register(&mut self) -> ListenerId {
    let id = ListenerId(self.next_id);
    self.next_id += 1;
    self.cursors.insert(id, self.buffer.len());
    id
  }

  /// Removes `id` from the registry and the gate, then trims.
  ///
  /// Returns the number of values trimmed, or `None` if `id` was not
  /// registered.
  pub(crate) fn remove(&mut self, id: ListenerId) -> Option<usize> {
    self.cursors.remove(&id)?;
    if let Some(pending) = self.pending.as_mut() {
      pending.deregister(id);
    }
    Some(self.trim())
  }

  /// Appends a value and takes the outstanding signal, if any.
  pub(crate) fn append(&mut self, value: T) -> Option<PendingValue> {
    self.buffer.push_back(value);
    self.pending.take()
  }

  /// Records the end of the upstream and takes the outstanding signal so
  /// that waiting listeners can observe the end.
  pub(crate) fn finish(&mut self, outcome: Result<(), UpstreamError>) -> Option<PendingValue> {
    match outcome {
      Ok(()) => self.upstream = UpstreamState::Completed,
      Err(err) => {
        self.upstream = UpstreamState::Failed;
        self.failure = Some(err);
      }
    }
    self.pending.take()
  }

  /// Records `waker` in the pending-value signal, creating it if needed.
  pub(crate) fn wait(&mut self, id: ListenerId, waker: &Waker) {
    self
      .pending
      .get_or_insert_with(PendingValue::new)
      .register(id, waker);
  }

  /// Drops every leading value that all registered listeners have consumed
  /// and rebases the cursors. Returns the number of values dropped.
  pub(crate) fn trim(&mut self) -> usize {
    let min = match self.cursors.values().min() {
      Some(&min) if min > 0 => min,
      _ => return 0,
    };
    self.buffer.drain(..min);
    for cursor in self.cursors.values_mut() {
      *cursor -= min;
    }
    min
  }

  pub(crate) fn unread(&self, id: ListenerId) -> usize {
    self
      .cursors
      .get(&id)
      .map_or(0, |&cursor| self.buffer.len() - cursor)
  }

  #[cfg(test)]
  pub(crate) fn cursor(&self, id: ListenerId) -> Option<usize> {
    self.cursors.get(&id).copied()
  }

  pub(crate) fn listener_count(&self) -> usize {
    self.cursors.len()
  }

  pub(crate) fn buffered_len(&self) -> usize {
    self.buffer.len()
  }

  pub(crate) fn waiting_count(&self) -> usize {
    self.pending.as_ref().map_or(0, PendingValue::len)
  }

  pub(crate) fn upstream(&self) -> UpstreamState {
    self.upstream
  }

  pub(crate) fn failure(&self) -> Option<&UpstreamError> {
    self.failure.as_ref()
  }
}

impl<T: Clone> State<T> {
  /// Reads the value under `id`'s cursor, advances the cursor and trims.
  ///
  /// Returns the pull outcome together with the number of values trimmed.
  pub(crate) fn pull(&mut self, id: ListenerId) -> (Pull<T>, usize) {
    let Some(cursor) = self.cursors.get_mut(&id) else {
      return (Pull::Ended, 0);
    };
    if let Some(value) = self.buffer.get(*cursor) {
      let value = value.clone();
      *cursor += 1;
      let trimmed = self.trim();
      return (Pull::Value(value), trimmed);
    }
    if self.upstream.is_finished() {
      return (Pull::Ended, 0);
    }
    (Pull::Empty, 0)
  }
}

/// The state plus its counters, shared by a broadcaster, its listeners and
/// its ingestion loop.
pub(crate) struct Shared<T> {
  state: Mutex<State<T>>,
  pub(crate) stats: Stats,
}

impl<T> Shared<T> {
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(State::new()),
      stats: Stats::new(),
    }
  }

  pub(crate) fn register(&self) -> ListenerId {
    let (id, cursor) = {
      let mut state = self.state.lock();
      let id = state.register();
      (id, state.buffered_len())
    };
    Stats::bump(&self.stats.listeners_joined, 1);
    tracing::debug!(listener = %id, cursor, "listener registered");
    id
  }

  /// Removes a listener. Safe to call more than once for the same id.
  pub(crate) fn deregister(&self, id: ListenerId) {
    let removed = self.state.lock().remove(id);
    if let Some(trimmed) = removed {
      Stats::bump(&self.stats.listeners_departed, 1);
      self.record_trim(trimmed);
      tracing::debug!(listener = %id, trimmed, "listener removed");
    }
  }

  pub(crate) fn publish(&self, value: T) {
    let pending = {
      let mut state = self.state.lock();
      let pending = state.append(value);
      self.stats.observe_buffered(state.buffered_len());
      pending
    };
    Stats::bump(&self.stats.values_ingested, 1);
    if let Some(pending) = pending {
      tracing::trace!(waiters = pending.len(), "waking listeners for new value");
      pending.resolve();
    }
  }

  pub(crate) fn finish(&self, outcome: Result<(), UpstreamError>) {
    let pending = self.state.lock().finish(outcome);
    if let Some(pending) = pending {
      pending.resolve();
    }
  }

  pub(crate) fn unread(&self, id: ListenerId) -> usize {
    self.state.lock().unread(id)
  }

  pub(crate) fn listener_count(&self) -> usize {
    self.state.lock().listener_count()
  }

  pub(crate) fn buffered_len(&self) -> usize {
    self.state.lock().buffered_len()
  }

  pub(crate) fn waiting_count(&self) -> usize {
    self.state.lock().waiting_count()
  }

  pub(crate) fn upstream(&self) -> UpstreamState {
    self.state.lock().upstream()
  }

  pub(crate) fn failure(&self) -> Option<UpstreamError> {
    self.state.lock().failure().cloned()
  }

  fn record_trim(&self, trimmed: usize) {
    if trimmed > 0 {
      Stats::bump(&self.stats.values_trimmed, trimmed as u64);
      tracing::trace!(trimmed, "buffer trimmed");
    }
  }
}

impl<T: Clone> Shared<T> {
  /// One pull attempt for `id`.
  ///
  /// With a waker, a caught-up listener is recorded in the pending-value
  /// signal in the same critical section that found it caught up, so an
  /// append can never slip in between. A listener whose sequence has ended
  /// is removed in that same section.
  pub(crate) fn pull(&self, id: ListenerId, waker: Option<&Waker>) -> Pull<T> {
    let (pull, trimmed, removed) = {
      let mut state = self.state.lock();
      let (pull, mut trimmed) = state.pull(id);
      let mut removed = false;
      match (&pull, waker) {
        (Pull::Empty, Some(waker)) => state.wait(id, waker),
        (Pull::Ended, _) => {
          if let Some(n) = state.remove(id) {
            trimmed += n;
            removed = true;
          }
        }
        _ => {}
      }
      (pull, trimmed, removed)
    };
    self.record_trim(trimmed);
    if let Pull::Value(_) = pull {
      Stats::bump(&self.stats.values_delivered, 1);
    }
    if removed {
      Stats::bump(&self.stats.listeners_departed, 1);
      tracing::debug!(listener = %id, "listener reached end of upstream");
    }
    pull
  }
}

impl<T> fmt::Debug for Shared<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("Shared")
      .field("buffered", &state.buffered_len())
      .field("listeners", &state.listener_count())
      .field("upstream", &state.upstream())
      .finish_non_exhaustive()
  }
}
