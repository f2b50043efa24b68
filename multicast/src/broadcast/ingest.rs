// src/broadcast/ingest.rs

use super::state::Shared;
use crate::error::UpstreamError;

use std::fmt;
use std::future::Future;
use std::pin::{pin, Pin};
use std::sync::Weak;
use std::task::{Context, Poll};

use futures_core::TryStream;
use futures_util::TryStreamExt;

/// The task that drains a broadcaster's upstream source into its buffer.
///
/// Returned by [`Broadcaster::split`](crate::Broadcaster::split) and
/// [`Broadcaster::try_split`](crate::Broadcaster::try_split) for callers that
/// want to drive ingestion on a runtime of their choosing. The future
/// resolves when the upstream completes or fails, or when every handle to
/// the broadcaster (including every listener) has been dropped.
#[must_use = "ingestion does nothing unless polled or spawned"]
pub struct Ingestion {
  inner: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Ingestion {
  pub(crate) fn new<T, S>(shared: Weak<Shared<T>>, upstream: S) -> Self
  where
    T: Clone + Send + 'static,
    S: TryStream<Ok = T> + Send + 'static,
    S::Error: fmt::Display,
  {
    Self {
      inner: Box::pin(run(shared, upstream)),
    }
  }

  pub(crate) fn into_inner(self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    self.inner
  }
}

impl Future for Ingestion {
  type Output = ();

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    self.inner.as_mut().poll(cx)
  }
}

impl fmt::Debug for Ingestion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Ingestion").finish_non_exhaustive()
  }
}

async fn run<T, S>(shared: Weak<Shared<T>>, upstream: S)
where
  T: Clone + Send + 'static,
  S: TryStream<Ok = T> + Send + 'static,
  S::Error: fmt::Display,
{
  let mut upstream = pin!(upstream.into_stream());
  tracing::debug!("ingestion started");

  loop {
    if shared.strong_count() == 0 {
      tracing::debug!("broadcaster dropped, stopping ingestion");
      return;
    }

    let next = upstream.try_next().await;

    let Some(shared) = shared.upgrade() else {
      tracing::debug!("broadcaster dropped, stopping ingestion");
      return;
    };

    match next {
      Ok(Some(value)) => shared.publish(value),
      Ok(None) => {
        tracing::debug!("upstream completed");
        shared.finish(Ok(()));
        return;
      }
      Err(err) => {
        let err = UpstreamError::new(err.to_string());
        tracing::warn!(error = %err, "upstream failed, ingestion stopped");
        shared.finish(Err(err));
        return;
      }
    }
  }
}
