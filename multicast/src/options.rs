//! Listener configuration.

use tokio_util::sync::CancellationToken;

/// Per-listener configuration accepted by
/// [`Broadcaster::listen_with`](crate::Broadcaster::listen_with).
///
/// ```
/// use fibre_multicast::{CancellationToken, ListenOptions};
///
/// let token = CancellationToken::new();
/// let options = ListenOptions::new().cancellation_token(token.clone());
/// assert!(options.has_cancellation_token());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ListenOptions {
  pub(crate) cancellation_token: Option<CancellationToken>,
}

impl ListenOptions {
  /// Options with every setting at its default: no cancellation token.
  pub fn new() -> Self {
    Self::default()
  }

  /// Ends the listener's sequence as soon as `token` is cancelled.
  ///
  /// A pending wait is aborted and the listener is deregistered. No value is
  /// yielded after cancellation, even if one was already buffered.
  pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
    self.cancellation_token = Some(token);
    self
  }

  /// Returns `true` if a cancellation token has been configured.
  pub fn has_cancellation_token(&self) -> bool {
    self.cancellation_token.is_some()
  }
}
