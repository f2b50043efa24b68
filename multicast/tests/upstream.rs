mod common;
use common::*;

use fibre_multicast::{Broadcaster, UpstreamState};
use futures_util::{stream, StreamExt};

#[tokio::test]
async fn upstream_failure_is_not_forwarded() {
  init_tracing();
  let upstream = stream::iter(vec![Ok(1), Ok(2), Err("disk on fire"), Ok(3)]);
  let (broadcaster, ingestion) = Broadcaster::try_split(upstream);
  let listener = broadcaster.listen();
  tokio::spawn(ingestion);

  let seen: Vec<i32> = listener.collect().await;
  assert_eq!(seen, vec![1, 2]);
  assert_eq!(broadcaster.upstream_state(), UpstreamState::Failed);

  let err = broadcaster.upstream_error().expect("failure is recorded");
  assert_eq!(err.message(), "disk on fire");
  assert_eq!(err.to_string(), "upstream source failed: disk on fire");
}

#[tokio::test]
async fn buffered_values_survive_failure() {
  let (tx, upstream) = manual_upstream::<Result<u8, String>>();
  let broadcaster = Broadcaster::try_new(upstream);
  let mut slow = broadcaster.listen();

  tx.send(Ok(1)).unwrap();
  tx.send(Ok(2)).unwrap();
  tx.send(Err("lost connection".to_string())).unwrap();
  wait_until(|| broadcaster.upstream_state().is_finished()).await;

  assert_eq!(broadcaster.buffered_len(), 2);
  assert_eq!(next_within(&mut slow).await, Some(1));
  assert_eq!(next_within(&mut slow).await, Some(2));
  assert_eq!(next_within(&mut slow).await, None);
  assert_eq!(broadcaster.listener_count(), 0);
}

#[tokio::test]
async fn listener_joining_after_completion_ends_at_once() {
  let (broadcaster, ingestion) = Broadcaster::split(stream::iter(vec![1, 2, 3]));
  ingestion.await;
  assert_eq!(broadcaster.upstream_state(), UpstreamState::Completed);
  assert!(broadcaster.upstream_error().is_none());

  let mut late = broadcaster.listen();
  assert_eq!(next_within(&mut late).await, None);
  assert_eq!(broadcaster.listener_count(), 0);
}

#[tokio::test]
async fn waiting_listeners_are_woken_by_completion() {
  let (tx, upstream) = manual_upstream::<u16>();
  let broadcaster = Broadcaster::new(upstream);
  let handles: Vec<_> = (0..3)
    .map(|_| {
      let listener = broadcaster.listen();
      tokio::spawn(listener.collect::<Vec<_>>())
    })
    .collect();

  wait_until(|| broadcaster.waiting_count() == 3).await;
  drop(tx);

  for handle in handles {
    assert!(handle.await.unwrap().is_empty());
  }
  assert_eq!(broadcaster.upstream_state(), UpstreamState::Completed);
}

#[tokio::test]
async fn stats_track_ingestion_delivery_and_trimming() {
  let (broadcaster, ingestion) = Broadcaster::split(stream::iter(0..3u32));
  let a = broadcaster.listen();
  let b = broadcaster.listen();
  tokio::spawn(ingestion);

  let (seen_a, seen_b): (Vec<_>, Vec<_>) = tokio::join!(a.collect(), b.collect());
  assert_eq!(seen_a, seen_b);

  let stats = broadcaster.stats();
  assert_eq!(stats.values_ingested, 3);
  assert_eq!(stats.values_delivered, 6);
  assert_eq!(stats.values_trimmed, 3);
  assert_eq!(stats.listeners_joined, 2);
  assert_eq!(stats.listeners_departed, 2);
  assert_eq!(stats.active_listeners(), 0);
}
