// examples/ticker.rs
use fibre_multicast::{Broadcaster, CancellationToken, ListenOptions};
use futures_util::{stream, StreamExt};
use std::time::Duration;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter("fibre_multicast=debug")
    .init();

  // A one-shot upstream: ten ticks, 20ms apart.
  let ticks = stream::unfold(0u32, |n| async move {
    if n == 10 {
      return None;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    Some((n, n + 1))
  });
  let broadcaster = Broadcaster::new(ticks);

  println!("--- Early listener sees every tick ---");
  let early = broadcaster.listen();
  let early_handle = tokio::spawn(async move {
    let seen: Vec<u32> = early.collect().await;
    println!("[early] {:?}", seen);
  });

  tokio::time::sleep(Duration::from_millis(90)).await;

  println!("--- Late listener only sees ticks from now on ---");
  let late = broadcaster.listen();
  let late_handle = tokio::spawn(async move {
    let seen: Vec<u32> = late.collect().await;
    println!("[late] {:?}", seen);
  });

  println!("--- Cancellable listener stops after a short while ---");
  let token = CancellationToken::new();
  let mut cancellable = broadcaster.listen_with(ListenOptions::new().cancellation_token(token.clone()));
  let cancel_handle = tokio::spawn(async move {
    while let Some(tick) = cancellable.next().await {
      println!("[cancellable] tick {}", tick);
    }
    println!("[cancellable] sequence ended");
  });
  tokio::time::sleep(Duration::from_millis(50)).await;
  token.cancel();

  early_handle.await.unwrap();
  late_handle.await.unwrap();
  cancel_handle.await.unwrap();

  println!("Final stats: {:?}", broadcaster.stats());
}
