use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free counters describing a broadcaster's activity.
///
/// Updates happen inside the state lock's critical sections, but reads go
/// through atomics so that [`Broadcaster::stats`](crate::Broadcaster::stats)
/// never contends with listeners.
#[derive(Debug)]
pub(crate) struct Stats {
  pub(crate) values_ingested: AtomicU64,
  pub(crate) values_delivered: AtomicU64,
  pub(crate) values_trimmed: AtomicU64,
  pub(crate) listeners_joined: AtomicU64,
  pub(crate) listeners_departed: AtomicU64,
  pub(crate) peak_buffered: AtomicU64,
  created_at: Instant,
}

impl Default for Stats {
  fn default() -> Self {
    Self {
      values_ingested: AtomicU64::new(0),
      values_delivered: AtomicU64::new(0),
      values_trimmed: AtomicU64::new(0),
      listeners_joined: AtomicU64::new(0),
      listeners_departed: AtomicU64::new(0),
      peak_buffered: AtomicU64::new(0),
      created_at: Instant::now(),
    }
  }
}

impl Stats {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn observe_buffered(&self, len: usize) {
    self.peak_buffered.fetch_max(len as u64, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      values_ingested: self.values_ingested.load(Ordering::Relaxed),
      values_delivered: self.values_delivered.load(Ordering::Relaxed),
      values_trimmed: self.values_trimmed.load(Ordering::Relaxed),
      listeners_joined: self.listeners_joined.load(Ordering::Relaxed),
      listeners_departed: self.listeners_departed.load(Ordering::Relaxed),
      peak_buffered: self.peak_buffered.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time snapshot of a broadcaster's counters.
#[derive(Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
  /// Values appended to the shared buffer by the ingestion loop.
  pub values_ingested: u64,
  /// Values handed out to listeners, counting one per listener per value.
  pub values_delivered: u64,
  /// Values reclaimed from the front of the buffer.
  pub values_trimmed: u64,
  /// Listeners registered so far.
  pub listeners_joined: u64,
  /// Listeners that have terminated and been removed from the registry.
  pub listeners_departed: u64,
  /// The largest buffer length observed.
  pub peak_buffered: u64,
  /// Seconds since the broadcaster was created.
  pub uptime_secs: u64,
}

impl StatsSnapshot {
  /// Listeners currently registered, derived from the join/depart counters.
  pub fn active_listeners(&self) -> u64 {
    self.listeners_joined.saturating_sub(self.listeners_departed)
  }
}

impl fmt::Debug for StatsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StatsSnapshot")
      .field("values_ingested", &self.values_ingested)
      .field("values_delivered", &self.values_delivered)
      .field("values_trimmed", &self.values_trimmed)
      .field("active_listeners", &self.active_listeners())
      .field("peak_buffered", &self.peak_buffered)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
