// Background task that owns submissions so polling never waits on the network

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pipeline::{Ack, SyncFailure, SyncPipeline};
use crate::types::CapturedMatch;

// Capacity of the capture queue between watcher and worker
const COMMAND_BUFFER: usize = 32;
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub enum SyncCommand {
  Submit(CapturedMatch),
  FlushPending,
}

pub struct SyncWorker {
  pipeline: Arc<SyncPipeline>,
  rx: mpsc::Receiver<SyncCommand>,
  cancel: CancellationToken,
  flush_every: Duration,
}

impl SyncWorker {
  pub fn new(
    pipeline: Arc<SyncPipeline>,
    cancel: CancellationToken,
  ) -> (Self, mpsc::Sender<SyncCommand>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let worker = Self {
      pipeline,
      rx,
      cancel,
      flush_every: FLUSH_INTERVAL,
    };
    (worker, tx)
  }

  pub fn with_flush_interval(mut self, every: Duration) -> Self {
    self.flush_every = every;
    self
  }

  /// Runs until cancelled or every sender is dropped. Pending matches are
  /// flushed on start and then every `flush_every`.
  pub async fn run(mut self) {
    info!("[Sync Worker] Started");
    let mut flush_timer = tokio::time::interval(self.flush_every);
    flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => break,
        cmd = self.rx.recv() => match cmd {
          Some(cmd) => self.handle(cmd).await,
          None => {
            debug!("[Sync Worker] Command channel closed");
            break;
          }
        },
        _ = flush_timer.tick() => self.flush().await,
      }
    }

    self.drain().await;
    info!("[Sync Worker] Stopped");
  }

  async fn handle(&self, cmd: SyncCommand) {
    match cmd {
      SyncCommand::Submit(captured) => {
        let game_id = captured.external_game_id.clone();
        match self.pipeline.submit(captured).await {
          Ok(Ack::Submitted { match_id }) => {
            debug!("[Sync Worker] Game {} acknowledged as match {}", game_id, match_id)
          }
          Ok(Ack::AlreadySynced) => {}
          Err(SyncFailure::Rejected { .. }) => {}
          Err(e) => debug!("[Sync Worker] Game {} not delivered: {}", game_id, e),
        }
      }
      SyncCommand::FlushPending => self.flush().await,
    }
  }

  async fn flush(&self) {
    let report = self.pipeline.flush_pending().await;
    if report.submitted > 0 || report.rejected > 0 {
      info!(
        "[Sync Worker] Flush: {} submitted, {} rejected, {} still pending",
        report.submitted, report.rejected, report.still_pending
      );
    }
  }

  // Captures still in the channel are persisted, never sent, after shutdown
  async fn drain(&mut self) {
    self.rx.close();
    let mut queued = 0;
    while let Ok(cmd) = self.rx.try_recv() {
      if let SyncCommand::Submit(captured) = cmd {
        self.pipeline.enqueue(&captured).await;
        queued += 1;
      }
    }
    if queued > 0 {
      warn!("[Sync Worker] Queued {} unsent capture(s) for the next run", queued);
    }
  }
}
