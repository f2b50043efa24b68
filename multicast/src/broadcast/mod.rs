// src/broadcast/mod.rs

//! The broadcaster: one upstream source, any number of listeners.
//!
//! ## Behavior
//!
//! - **Join from now on**: a listener starts at the current end of the shared
//!   buffer. It sees every value appended after it was created and none of
//!   the values appended before.
//! - **Independent pace**: every listener has its own cursor. A slow listener
//!   makes the buffer grow; it never slows down the upstream or other
//!   listeners.
//! - **Reclamation**: after every cursor advance and every listener removal,
//!   values that every registered listener has already consumed are dropped
//!   from the front of the buffer.
//! - **No producer backpressure**: the ingestion loop drains the upstream as
//!   fast as it yields. Memory is the only signal of slow consumers.
//! - **Upstream errors stay put**: a failing upstream stops ingestion.
//!   Listeners drain what is buffered and then end; the error itself is
//!   available through [`Broadcaster::upstream_error`].
//! - **`T: Clone` Requirement**: every listener gets its own copy of every
//!   value. Wrap large values in `Arc` to keep this cheap.
//!
//! # Examples
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use fibre_multicast::Broadcaster;
//! use futures_util::{stream, StreamExt};
//!
//! let (broadcaster, ingestion) = Broadcaster::split(stream::iter(0..5));
//! let first = broadcaster.listen();
//! let second = broadcaster.listen();
//! tokio::spawn(ingestion);
//!
//! let (a, b): (Vec<_>, Vec<_>) = tokio::join!(first.collect(), second.collect());
//! assert_eq!(a, vec![0, 1, 2, 3, 4]);
//! assert_eq!(a, b);
//! # }
//! ```

mod gate;
mod ingest;
mod listener;
mod state;

pub use ingest::Ingestion;
pub use listener::{Listener, Recv};
pub use state::{ListenerId, UpstreamState};

use crate::error::UpstreamError;
use crate::options::ListenOptions;
use crate::runtime::TaskSpawner;
use crate::stats::StatsSnapshot;
use state::Shared;

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use futures_core::{Stream, TryStream};
use futures_util::StreamExt;

/// A multicast adapter over a single-consumer asynchronous source.
///
/// Cloning a `Broadcaster` is cheap and yields another handle to the same
/// buffer and listener registry.
pub struct Broadcaster<T> {
  shared: Arc<Shared<T>>,
}

impl<T> Clone for Broadcaster<T> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

// --- Constructors ---

impl<T: Clone + Send + 'static> Broadcaster<T> {
  /// Creates a broadcaster with no upstream source.
  ///
  /// Its buffer stays empty and its upstream state stays
  /// [`UpstreamState::Active`], so listeners wait until they are cancelled,
  /// closed or dropped.
  pub fn empty() -> Self {
    Self {
      shared: Arc::new(Shared::new()),
    }
  }

  /// Creates a broadcaster over `upstream` and returns its ingestion loop
  /// for the caller to spawn or poll.
  ///
  /// Values the upstream yields before any listener exists are buffered but
  /// unreachable; create listeners before starting the ingestion to observe
  /// the whole sequence.
  pub fn split<S>(upstream: S) -> (Self, Ingestion)
  where
    S: Stream<Item = T> + Send + 'static,
  {
    Self::try_split(upstream.map(Ok::<T, Infallible>))
  }

  /// Like [`split`](Broadcaster::split), for a fallible upstream.
  ///
  /// The first `Err` stops ingestion; see
  /// [`upstream_error`](Broadcaster::upstream_error).
  pub fn try_split<S>(upstream: S) -> (Self, Ingestion)
  where
    S: TryStream<Ok = T> + Send + 'static,
    S::Error: fmt::Display,
  {
    let broadcaster = Self::empty();
    let ingestion = Ingestion::new(Arc::downgrade(&broadcaster.shared), upstream);
    (broadcaster, ingestion)
  }

  /// Creates a broadcaster over `upstream`, running ingestion on `spawner`.
  pub fn with_spawner<S>(upstream: S, spawner: &dyn TaskSpawner) -> Self
  where
    S: Stream<Item = T> + Send + 'static,
  {
    let (broadcaster, ingestion) = Self::split(upstream);
    spawner.spawn(ingestion.into_inner());
    broadcaster
  }

  /// Like [`with_spawner`](Broadcaster::with_spawner), for a fallible
  /// upstream.
  pub fn try_with_spawner<S>(upstream: S, spawner: &dyn TaskSpawner) -> Self
  where
    S: TryStream<Ok = T> + Send + 'static,
    S::Error: fmt::Display,
  {
    let (broadcaster, ingestion) = Self::try_split(upstream);
    spawner.spawn(ingestion.into_inner());
    broadcaster
  }

  /// Creates a broadcaster over `upstream`, running ingestion on the current
  /// Tokio runtime.
  ///
  /// # Panics
  ///
  /// Panics if called outside of a Tokio runtime.
  #[cfg(feature = "tokio")]
  pub fn new<S>(upstream: S) -> Self
  where
    S: Stream<Item = T> + Send + 'static,
  {
    Self::with_spawner(upstream, &crate::runtime::TokioSpawner::new())
  }

  /// Like [`new`](Broadcaster::new), for a fallible upstream.
  ///
  /// # Panics
  ///
  /// Panics if called outside of a Tokio runtime.
  #[cfg(feature = "tokio")]
  pub fn try_new<S>(upstream: S) -> Self
  where
    S: TryStream<Ok = T> + Send + 'static,
    S::Error: fmt::Display,
  {
    Self::try_with_spawner(upstream, &crate::runtime::TokioSpawner::new())
  }
}

// --- Multicast accessor ---

impl<T: Clone> Broadcaster<T> {
  /// Starts a new listener at the current end of the buffer.
  pub fn listen(&self) -> Listener<T> {
    self.listen_with(ListenOptions::default())
  }

  /// Starts a new listener configured by `options`.
  pub fn listen_with(&self, options: ListenOptions) -> Listener<T> {
    Listener::new(Arc::clone(&self.shared), options)
  }
}

// --- Introspection ---

impl<T> Broadcaster<T> {
  /// Number of listeners currently registered.
  pub fn listener_count(&self) -> usize {
    self.shared.listener_count()
  }

  /// Number of values currently held in the shared buffer.
  pub fn buffered_len(&self) -> usize {
    self.shared.buffered_len()
  }

  /// Number of listeners currently suspended waiting for a new value.
  pub fn waiting_count(&self) -> usize {
    self.shared.waiting_count()
  }

  /// Where ingestion stands.
  pub fn upstream_state(&self) -> UpstreamState {
    self.shared.upstream()
  }

  /// The error that stopped a fallible upstream, if it failed.
  pub fn upstream_error(&self) -> Option<UpstreamError> {
    self.shared.failure()
  }

  /// A snapshot of this broadcaster's activity counters.
  pub fn stats(&self) -> StatsSnapshot {
    self.shared.stats.snapshot()
  }
}

impl<T> fmt::Debug for Broadcaster<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Broadcaster")
      .field("shared", &self.shared)
      .finish()
  }
}
