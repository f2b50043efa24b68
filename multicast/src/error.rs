// src/error.rs

//! Error types returned by listeners and recorded from the upstream.

use core::fmt;

/// Error returned by [`Listener::recv`](crate::Listener::recv) once the
/// listener's sequence has ended.
///
/// A sequence ends when the listener is cancelled or closed, or when the
/// upstream source has finished and every buffered value has been consumed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvError {
  /// No further values will ever be delivered to this listener.
  Disconnected,
}
impl std::error::Error for RecvError {}
impl fmt::Display for RecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecvError::Disconnected => write!(f, "listener disconnected (sequence ended)"),
    }
  }
}

/// Error returned by [`Listener::try_recv`](crate::Listener::try_recv) when a
/// value could not be taken immediately.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
  /// The listener is caught up, but the upstream may still produce values.
  Empty,
  /// The listener's sequence has ended.
  Disconnected,
}
impl std::error::Error for TryRecvError {}
impl fmt::Display for TryRecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryRecvError::Empty => write!(f, "listener caught up"),
      TryRecvError::Disconnected => write!(f, "listener disconnected (sequence ended)"),
    }
  }
}

/// Error returned when attempting to close an already closed listener.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CloseError;
impl std::error::Error for CloseError {}
impl fmt::Display for CloseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "listener is already closed")
  }
}

/// The failure that stopped a fallible upstream source.
///
/// Upstream failures are never forwarded into listener sequences. The
/// broadcaster keeps the rendered message so callers can inspect why
/// ingestion stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream source failed: {message}")]
pub struct UpstreamError {
  message: String,
}

impl UpstreamError {
  pub(crate) fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  /// The upstream error's `Display` output.
  pub fn message(&self) -> &str {
    &self.message
  }
}
