#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! Multicast adapter for single-consumer async streams.
//!
//! `fibre_multicast` wraps one upstream [`Stream`](futures_core::Stream), a
//! producer that can only be pulled from once, in a [`Broadcaster`]. Any
//! number of [`Listener`]s can then pull from the broadcaster concurrently.
//! Each one moves at its own pace and sees every value produced from the
//! moment it started listening.
//!
//! Values live in one shared buffer. Every listener keeps a cursor into it,
//! caught-up listeners park on a shared wake-up signal, and the buffer is
//! trimmed as soon as every listener has moved past its front.

pub mod broadcast;
pub mod error;
pub mod options;
pub mod runtime;
mod stats;

pub use broadcast::{Broadcaster, Ingestion, Listener, ListenerId, Recv, UpstreamState};
pub use error::{CloseError, RecvError, TryRecvError, UpstreamError};
pub use options::ListenOptions;
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
pub use runtime::TaskSpawner;
pub use stats::StatsSnapshot;

// Re-exported so callers can build `ListenOptions` without naming tokio-util.
pub use tokio_util::sync::CancellationToken;
