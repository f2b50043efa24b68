mod common;
use common::*;

use fibre_multicast::Broadcaster;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use tokio::sync::Barrier;

#[tokio::test]
async fn listener_sees_upstream_order() {
  let (broadcaster, ingestion) = Broadcaster::split(stream::iter(0..ITEMS_LOW));
  let listener = broadcaster.listen();
  tokio::spawn(ingestion);

  let seen: Vec<usize> = listener.collect().await;
  assert_eq!(seen, (0..ITEMS_LOW).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_early_listener_sees_everything() {
  init_tracing();
  let (broadcaster, ingestion) = Broadcaster::split(stream::iter(0..ITEMS_HIGH));
  let listeners: Vec<_> = (0..4).map(|_| broadcaster.listen()).collect();

  let handles: Vec<_> = listeners
    .into_iter()
    .map(|listener| tokio::spawn(listener.collect::<Vec<_>>()))
    .collect();
  tokio::spawn(ingestion);

  for handle in handles {
    let seen = handle.await.unwrap();
    assert_eq!(seen, (0..ITEMS_HIGH).collect::<Vec<_>>());
  }
  assert_eq!(broadcaster.listener_count(), 0);
  assert_eq!(broadcaster.buffered_len(), 0);
}

#[tokio::test]
async fn staggered_listeners_scenario() {
  let (tx, upstream) = manual_upstream();
  let broadcaster = Broadcaster::new(upstream);
  let mut a = broadcaster.listen();

  tx.send(1).unwrap();
  tx.send(2).unwrap();
  assert_eq!(next_within(&mut a).await, Some(1));
  assert_eq!(next_within(&mut a).await, Some(2));

  let mut b = broadcaster.listen();
  tx.send(3).unwrap();
  tx.send(4).unwrap();
  for expected in [3, 4] {
    assert_eq!(next_within(&mut a).await, Some(expected));
  }
  for expected in [3, 4] {
    assert_eq!(next_within(&mut b).await, Some(expected));
  }

  tx.send(5).unwrap();
  assert_eq!(next_within(&mut a).await, Some(5));
  assert_eq!(next_within(&mut b).await, Some(5));

  drop(tx);
  assert_eq!(next_within(&mut a).await, None);
  assert_eq!(next_within(&mut b).await, None);
  assert_eq!(broadcaster.listener_count(), 0);
  assert_eq!(broadcaster.buffered_len(), 0);
}

#[tokio::test]
async fn late_listener_skips_history() {
  let (tx, upstream) = manual_upstream();
  let broadcaster = Broadcaster::new(upstream);

  for v in 0..3 {
    tx.send(v).unwrap();
  }
  wait_until(|| broadcaster.stats().values_ingested == 3).await;
  // Nobody was listening, so nothing could be reclaimed yet.
  assert_eq!(broadcaster.buffered_len(), 3);

  let mut late = broadcaster.listen();
  assert!(late.is_empty());

  tx.send(3).unwrap();
  assert_eq!(next_within(&mut late).await, Some(3));
  // The first advance makes the unreachable history reclaimable.
  assert_eq!(broadcaster.buffered_len(), 0);
}

#[tokio::test]
async fn late_listener_behind_an_active_one() {
  let (tx, upstream) = manual_upstream();
  let broadcaster = Broadcaster::new(upstream);
  let mut early = broadcaster.listen();

  for v in 0..ITEMS_LOW {
    tx.send(v).unwrap();
  }
  for v in 0..ITEMS_LOW {
    assert_eq!(next_within(&mut early).await, Some(v));
  }

  let mut late = broadcaster.listen();
  tx.send(ITEMS_LOW).unwrap();
  drop(tx);

  assert_eq!(next_within(&mut late).await, Some(ITEMS_LOW));
  assert_eq!(next_within(&mut late).await, None);
  assert_eq!(next_within(&mut early).await, Some(ITEMS_LOW));
  assert_eq!(next_within(&mut early).await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fast_and_slow_listeners_keep_their_own_pace() {
  let (broadcaster, ingestion) = Broadcaster::split(stream::iter(0..ITEMS_LOW));
  let mut fast = broadcaster.listen();
  let mut slow = broadcaster.listen();
  let barrier = Arc::new(Barrier::new(2));

  let fast_handle = {
    let barrier = barrier.clone();
    tokio::spawn(async move {
      let mut seen = Vec::new();
      while let Some(v) = fast.next().await {
        seen.push(v);
      }
      barrier.wait().await;
      seen
    })
  };
  let slow_handle = {
    let barrier = barrier.clone();
    tokio::spawn(async move {
      // Hold off until the fast listener has drained the whole upstream.
      barrier.wait().await;
      let mut seen = Vec::new();
      while let Some(v) = slow.next().await {
        seen.push(v);
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
      }
      seen
    })
  };
  tokio::spawn(ingestion);

  let expected: Vec<_> = (0..ITEMS_LOW).collect();
  assert_eq!(fast_handle.await.unwrap(), expected);
  assert_eq!(slow_handle.await.unwrap(), expected);
  // The slow listener pinned the whole sequence in memory.
  assert_eq!(broadcaster.stats().peak_buffered, ITEMS_LOW as u64);
  assert_eq!(broadcaster.buffered_len(), 0);
}
