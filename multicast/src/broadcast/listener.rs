// src/broadcast/listener.rs

use super::state::{ListenerId, Pull, Shared};
use crate::error::{CloseError, RecvError, TryRecvError};
use crate::options::ListenOptions;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::{FusedStream, Stream};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// A cancellation token together with the future that observes it.
struct Cancellation {
  token: CancellationToken,
  fired: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl Cancellation {
  fn new(token: CancellationToken) -> Self {
    let fired = Box::pin(token.clone().cancelled_owned());
    Self { token, fired }
  }

  /// Polls the token, registering the task's waker with it.
  fn poll_fired(&mut self, cx: &mut Context<'_>) -> bool {
    self.fired.as_mut().poll(cx).is_ready()
  }
}

/// One independent consumer of a [`Broadcaster`](crate::Broadcaster).
///
/// A listener sees every value the upstream produces from the moment it was
/// created, in upstream order. It implements [`Stream`], so it can be
/// consumed with `futures_util::StreamExt::next`:
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fibre_multicast::Broadcaster;
/// use futures_util::{stream, StreamExt};
///
/// let (broadcaster, ingestion) = Broadcaster::split(stream::iter(vec![1, 2, 3]));
/// let mut listener = broadcaster.listen();
/// tokio::spawn(ingestion);
///
/// let mut seen = Vec::new();
/// while let Some(value) = listener.next().await {
///   seen.push(value);
/// }
/// assert_eq!(seen, vec![1, 2, 3]);
/// # }
/// ```
///
/// The sequence ends when the listener's cancellation token fires, when
/// [`close`](Listener::close) is called, or once the upstream has finished
/// and every buffered value has been consumed. Dropping a listener removes
/// it from the broadcaster straight away, so an abandoned listener never
/// holds back buffer reclamation.
pub struct Listener<T> {
  shared: Arc<Shared<T>>,
  id: ListenerId,
  cancellation: Option<Cancellation>,
  terminated: bool,
}

impl<T: Clone> Listener<T> {
  pub(crate) fn new(shared: Arc<Shared<T>>, options: ListenOptions) -> Self {
    let id = shared.register();
    Self {
      shared,
      id,
      cancellation: options.cancellation_token.map(Cancellation::new),
      terminated: false,
    }
  }

  /// This listener's identity within its broadcaster.
  pub fn id(&self) -> ListenerId {
    self.id
  }

  /// Waits for the next value.
  ///
  /// Resolves to `Err(RecvError::Disconnected)` once the sequence has ended.
  pub fn recv(&mut self) -> Recv<'_, T> {
    Recv { listener: self }
  }

  /// Takes the next value if one is already buffered, without waiting.
  ///
  /// # Errors
  ///
  /// - `Err(TryRecvError::Empty)`: the listener is caught up and the upstream
  ///   is still active.
  /// - `Err(TryRecvError::Disconnected)`: the sequence has ended.
  pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
    if self.terminated {
      return Err(TryRecvError::Disconnected);
    }
    if self
      .cancellation
      .as_ref()
      .is_some_and(|c| c.token.is_cancelled())
    {
      self.terminate();
      return Err(TryRecvError::Disconnected);
    }
    match self.shared.pull(self.id, None) {
      Pull::Value(value) => Ok(value),
      Pull::Empty => Err(TryRecvError::Empty),
      Pull::Ended => {
        self.terminated = true;
        Err(TryRecvError::Disconnected)
      }
    }
  }

  /// Ends this listener's sequence and removes it from the broadcaster.
  ///
  /// # Errors
  ///
  /// Returns `CloseError` if the sequence had already ended.
  pub fn close(&mut self) -> Result<(), CloseError> {
    if self.terminated {
      return Err(CloseError);
    }
    self.terminate();
    Ok(())
  }

  /// Number of buffered values this listener has not consumed yet.
  pub fn len(&self) -> usize {
    if self.terminated {
      return 0;
    }
    self.shared.unread(self.id)
  }

  /// Returns `true` if no buffered value is waiting for this listener.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if this listener was created with a cancellation token.
  pub fn is_cancellable(&self) -> bool {
    self.cancellation.is_some()
  }
}

impl<T> Listener<T> {
  fn terminate(&mut self) {
    if !self.terminated {
      self.terminated = true;
      self.shared.deregister(self.id);
    }
  }
}

impl<T: Clone> Stream for Listener<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
    let this = self.get_mut();
    if this.terminated {
      return Poll::Ready(None);
    }

    // Cancellation wins over buffered data.
    if let Some(cancellation) = this.cancellation.as_mut() {
      if cancellation.poll_fired(cx) {
        tracing::debug!(listener = %this.id, "listener cancelled");
        this.terminate();
        return Poll::Ready(None);
      }
    }

    match this.shared.pull(this.id, Some(cx.waker())) {
      Pull::Value(value) => Poll::Ready(Some(value)),
      Pull::Empty => Poll::Pending,
      Pull::Ended => {
        this.terminated = true;
        Poll::Ready(None)
      }
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    if self.terminated {
      (0, Some(0))
    } else {
      (self.shared.unread(self.id), None)
    }
  }
}

impl<T: Clone> FusedStream for Listener<T> {
  fn is_terminated(&self) -> bool {
    self.terminated
  }
}

impl<T> Drop for Listener<T> {
  fn drop(&mut self) {
    self.terminate();
  }
}

impl<T> fmt::Debug for Listener<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Listener")
      .field("id", &self.id)
      .field("cancellable", &self.cancellation.is_some())
      .field("terminated", &self.terminated)
      .finish()
  }
}

/// Future returned by [`Listener::recv`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct Recv<'a, T> {
  listener: &'a mut Listener<T>,
}

impl<T: Clone> Future for Recv<'_, T> {
  type Output = Result<T, RecvError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut *self.listener)
      .poll_next(cx)
      .map(|next| next.ok_or(RecvError::Disconnected))
  }
}

impl<T> fmt::Debug for Recv<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Recv")
      .field("listener", &self.listener.id)
      .finish()
  }
}
