// Tests for the background sync worker

use std::time::Duration;

use super::super::worker::{SyncCommand, SyncWorker};
use super::test_helpers::*;

#[cfg(test)]
mod worker_tests {
  use super::*;

  #[tokio::test]
  async fn test_worker_submits_and_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let (worker, tx) = SyncWorker::new(h.pipeline.clone(), h.cancel.clone());
    let handle = tokio::spawn(worker.run());

    tx.send(SyncCommand::Submit(ranked_match("1", "Gold", 3, 10)))
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.matches.calls(), 1);

    h.cancel.cancel();
    handle.await.unwrap();
    assert_eq!(h.pipeline.state().await.cursor.as_deref(), Some("1"));
  }

  /// Scenario: captures are still queued in the channel at shutdown.
  /// Expected: they are persisted as pending, not sent.
  #[tokio::test]
  async fn test_shutdown_drains_channel_into_pending() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let (worker, tx) = SyncWorker::new(h.pipeline.clone(), h.cancel.clone());

    tx.send(SyncCommand::Submit(ranked_match("1", "Gold", 3, 10)))
      .await
      .unwrap();
    tx.send(SyncCommand::Submit(ranked_match("2", "Gold", 3, 11)))
      .await
      .unwrap();
    h.cancel.cancel();
    worker.run().await;

    assert_eq!(h.matches.calls(), 0);
    assert_eq!(h.pipeline.state().await.pending.len(), 2);
  }

  #[tokio::test]
  async fn test_worker_flushes_pending_on_start() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    h.pipeline.enqueue(&ranked_match("1", "Gold", 3, 10)).await;

    let (worker, tx) = SyncWorker::new(h.pipeline.clone(), h.cancel.clone());
    let handle = tokio::spawn(worker.with_flush_interval(Duration::from_secs(3600)).run());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.matches.calls(), 1);
    assert!(h.pipeline.state().await.pending.is_empty());

    drop(tx);
    handle.await.unwrap();
  }
}
