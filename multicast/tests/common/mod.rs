#![allow(dead_code)]

use futures_util::stream::{self, Stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;

pub const SHORT_TIMEOUT: Duration = Duration::from_millis(100);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(3);
pub const ITEMS_LOW: usize = 50;
pub const ITEMS_HIGH: usize = 1000;

pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter("fibre_multicast=trace")
    .with_test_writer()
    .try_init();
}

/// An upstream fed by hand through the returned sender. Dropping the sender
/// completes the upstream.
pub fn manual_upstream<T: Send + 'static>(
) -> (mpsc::UnboundedSender<T>, impl Stream<Item = T> + Send + 'static) {
  let (tx, rx) = mpsc::unbounded_channel();
  let upstream = stream::unfold(rx, |mut rx| async move {
    let value = rx.recv().await?;
    Some((value, rx))
  });
  (tx, upstream)
}

/// Pulls the next item, failing the test if the stream stalls.
pub async fn next_within<S: Stream + Unpin>(stream: &mut S) -> Option<S::Item> {
  tokio::time::timeout(LONG_TIMEOUT, stream.next())
    .await
    .expect("stream stalled")
}

/// Yields to the runtime until `condition` holds, failing the test if it
/// never does.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
  tokio::time::timeout(LONG_TIMEOUT, async {
    while !condition() {
      tokio::task::yield_now().await;
    }
  })
  .await
  .expect("condition never became true");
}
