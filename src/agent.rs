// Agent composition: watcher loop in front, sync worker behind a channel

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::lcu::{
  candidate_dirs, watch_lockfile, ClientProbe, Discovery, LcuClient, LockfileDiscovery,
  PollingStateMachine, WatchState,
};
use crate::milestone::{MilestoneRecorder, MILESTONE_STATE_FILE};
use crate::sync::{
  FlushReport, JsonFile, RemoteTokenProvider, RetryPolicy, SyncCommand, SyncPipeline, SyncWorker,
  TrackerApi, SYNC_STATE_FILE,
};
use crate::types::CapturedMatch;

pub struct Agent {
  settings: Settings,
  data_dir: PathBuf,
  cancel: CancellationToken,
}

impl Agent {
  pub fn new(settings: Settings, data_dir: PathBuf) -> Self {
    Self {
      settings,
      data_dir,
      cancel: CancellationToken::new(),
    }
  }

  /// Cancelling this token stops the watcher loop and the sync worker.
  pub fn cancel_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  fn build_pipeline(&self) -> Result<Arc<SyncPipeline>> {
    let timeout = self.settings.request_timeout();
    let api = Arc::new(TrackerApi::new(&self.settings.api_base_url, timeout)?);
    let tokens = Arc::new(RemoteTokenProvider::new(
      &self.settings.api_base_url,
      timeout,
      self.settings.api_token.clone(),
      self.settings.refresh_token.clone(),
    )?);
    let recorder = Arc::new(MilestoneRecorder::new(
      api.clone(),
      tokens.clone(),
      JsonFile::new(self.data_dir.join(MILESTONE_STATE_FILE)),
    ));
    Ok(Arc::new(SyncPipeline::new(
      api,
      tokens,
      recorder,
      JsonFile::new(self.data_dir.join(SYNC_STATE_FILE)),
      RetryPolicy::from_settings(&self.settings),
      self.cancel.clone(),
    )))
  }

  /// Deliver whatever is pending from earlier runs, then return.
  pub async fn flush_only(&self) -> Result<FlushReport> {
    let pipeline = self.build_pipeline()?;
    let report = pipeline.flush_pending().await;
    let state = pipeline.state().await;
    info!(
      "[Agent] Flush finished: {} submitted, {} rejected, {} pending, {} dead letter(s)",
      report.submitted,
      report.rejected,
      report.still_pending,
      state.dead_letters.len()
    );
    Ok(report)
  }

  /// Poll the client until cancelled. Captures are handed to the sync worker
  /// so a slow tracker never delays the next poll.
  pub async fn run(&self) -> Result<()> {
    let pipeline = self.build_pipeline()?;
    let probe = LcuClient::new()?;
    let (worker, tx) = SyncWorker::new(pipeline.clone(), self.cancel.clone());
    let worker_handle = tokio::spawn(worker.run());

    let dirs = candidate_dirs(self.settings.league_path.as_deref());
    debug!("[Agent] Lockfile search paths: {:?}", dirs);
    let wake = Arc::new(Notify::new());
    // Dropping the watcher stops notifications, so it lives as long as the loop
    let lockfile_watcher = watch_lockfile(&dirs, wake.clone());
    if lockfile_watcher.is_none() {
      info!("[Agent] Lockfile watching unavailable; relying on polling only");
    }

    let mut machine = PollingStateMachine::new(
      LockfileDiscovery::new(dirs),
      probe,
      self.settings.profile_id,
    );

    info!(
      "[Agent] Watching for games every {}s (profile {})",
      self.settings.check_interval_seconds, self.settings.profile_id
    );
    let unsent = watch_games(
      &mut machine,
      self.settings.check_interval(),
      &wake,
      &self.cancel,
      &tx,
    )
    .await;
    for captured in &unsent {
      // Worker is gone; keep the capture on disk instead of losing it
      pipeline.enqueue(captured).await;
    }

    info!("[Agent] Shutting down");
    drop(tx);
    if let Err(e) = worker_handle.await {
      error!("[Agent] Sync worker ended abnormally: {}", e);
    }
    Ok(())
  }
}

/// Drive the watcher every `every`, or sooner when `wake` fires, until
/// `cancel`. A tick in flight is abandoned on cancel; it only yields a match
/// once complete, so nothing half-read escapes. Returns captures the worker
/// could not accept.
pub(crate) async fn watch_games<D, P>(
  machine: &mut PollingStateMachine<D, P>,
  every: Duration,
  wake: &Notify,
  cancel: &CancellationToken,
  tx: &mpsc::Sender<SyncCommand>,
) -> Vec<CapturedMatch>
where
  D: Discovery,
  P: ClientProbe,
{
  let mut interval = tokio::time::interval(every);
  interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
  let mut unsent = Vec::new();

  loop {
    tokio::select! {
      _ = cancel.cancelled() => break,
      _ = interval.tick() => {}
      _ = wake.notified() => debug!("[Agent] Lockfile changed; polling now"),
    }

    let was_idle = matches!(machine.state(), WatchState::Idle);
    let captured = tokio::select! {
      _ = cancel.cancelled() => break,
      captured = machine.tick() => captured,
    };

    // A client that just came up usually means the network is back too
    if was_idle && !matches!(machine.state(), WatchState::Idle) {
      if tx.send(SyncCommand::FlushPending).await.is_err() {
        debug!("[Agent] Sync worker unavailable; skipping flush");
      }
    }

    let Some(captured) = captured else {
      continue;
    };
    if let Err(e) = tx.send(SyncCommand::Submit(captured)).await {
      warn!("[Agent] Sync worker unavailable; queueing capture");
      if let SyncCommand::Submit(captured) = e.0 {
        unsent.push(captured);
      }
    }
  }
  unsent
}
