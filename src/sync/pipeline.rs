// Sync pipeline: submit captured matches exactly once, retry, queue, dead-letter

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::api::{MatchApi, TokenProvider};
use super::store::{JsonFile, SyncState};
use crate::config::Settings;
use crate::error::AgentError;
use crate::milestone::{MilestoneRecorder, RecordOutcome};
use crate::types::{CapturedMatch, PersistedMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub base_delay: Duration,
  pub max_delay: Duration,
}

impl RetryPolicy {
  pub fn from_settings(settings: &Settings) -> Self {
    Self {
      max_attempts: settings.max_submit_attempts.max(1),
      base_delay: Duration::from_millis(settings.retry_base_delay_ms),
      max_delay: Duration::from_millis(settings.retry_max_delay_ms),
    }
  }

  /// Delay after failed attempt `attempt` (1-based): base * 2^(attempt-1), capped.
  pub fn delay_for(&self, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    self
      .base_delay
      .saturating_mul(1u32 << exp)
      .min(self.max_delay)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
  Submitted { match_id: i64 },
  /// Cursor says this game went through before; nothing was sent
  AlreadySynced,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFailure {
  #[error("queued for a later run: {0}")]
  Queued(String),
  #[error("rejected by the tracker ({status}): {reason}")]
  Rejected { status: u16, reason: String },
  #[error("interrupted by shutdown; queued for a later run")]
  Interrupted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
  pub submitted: usize,
  pub rejected: usize,
  pub still_pending: usize,
}

enum SendError {
  Cancelled,
  Failed(AgentError),
}

struct Local {
  file: JsonFile<SyncState>,
  state: SyncState,
}

impl Local {
  fn persist(&self) {
    if let Err(e) = self.file.save(&self.state) {
      error!(
        "[Sync] Failed to save {}: {}",
        self.file.path().display(),
        e
      );
    }
  }
}

pub struct SyncPipeline {
  api: Arc<dyn MatchApi>,
  tokens: Arc<dyn TokenProvider>,
  recorder: Arc<MilestoneRecorder>,
  policy: RetryPolicy,
  cancel: CancellationToken,
  // Single writer for cursor and queues; held for a whole submission so a
  // flush and the worker can never send the same game concurrently
  local: Mutex<Local>,
}

impl SyncPipeline {
  pub fn new(
    api: Arc<dyn MatchApi>,
    tokens: Arc<dyn TokenProvider>,
    recorder: Arc<MilestoneRecorder>,
    file: JsonFile<SyncState>,
    policy: RetryPolicy,
    cancel: CancellationToken,
  ) -> Self {
    let state = file.load();
    if !state.pending.is_empty() {
      info!(
        "[Sync] {} match(es) pending from a previous run",
        state.pending.len()
      );
    }
    Self {
      api,
      tokens,
      recorder,
      policy,
      cancel,
      local: Mutex::new(Local { file, state }),
    }
  }

  pub async fn state(&self) -> SyncState {
    self.local.lock().await.state.clone()
  }

  /// Submit one captured match. Never sends a game the cursor already knows.
  pub async fn submit(&self, captured: CapturedMatch) -> Result<Ack, SyncFailure> {
    let mut local = self.local.lock().await;
    self.submit_locked(&mut local, &captured).await
  }

  /// Persist a match without sending it, e.g. on shutdown.
  pub async fn enqueue(&self, captured: &CapturedMatch) {
    let mut local = self.local.lock().await;
    if local.state.is_synced(&captured.external_game_id) {
      return;
    }
    if local.state.enqueue_pending(captured) {
      info!(
        "[Sync] Game {} queued for a later run",
        captured.external_game_id
      );
      local.persist();
    }
  }

  /// Replay queued matches in capture order. Stops at the first game that
  /// fails transiently, since the rest would fail the same way.
  pub async fn flush_pending(&self) -> FlushReport {
    let mut report = FlushReport::default();
    {
      let mut local = self.local.lock().await;
      let queued = local.state.pending.clone();
      if !queued.is_empty() {
        info!("[Sync] Flushing {} pending match(es)", queued.len());
      }
      for captured in queued {
        if self.cancel.is_cancelled() {
          break;
        }
        match self.submit_locked(&mut local, &captured).await {
          Ok(_) => report.submitted += 1,
          Err(SyncFailure::Rejected { .. }) => report.rejected += 1,
          Err(SyncFailure::Queued(_)) | Err(SyncFailure::Interrupted) => break,
        }
      }
      report.still_pending = local.state.pending.len();
    }

    let delivered = self.recorder.retry_pending().await;
    if delivered > 0 {
      info!("[Sync] Delivered {} deferred milestone(s)", delivered);
    }
    report
  }

  async fn submit_locked(
    &self,
    local: &mut Local,
    captured: &CapturedMatch,
  ) -> Result<Ack, SyncFailure> {
    let game_id = captured.external_game_id.as_str();
    if local.state.is_synced(game_id) {
      debug!("[Sync] Game {} already synced; skipping", game_id);
      local.state.remove_pending(game_id);
      return Ok(Ack::AlreadySynced);
    }

    match self.send_with_retry(captured).await {
      Ok(persisted) => {
        local.state.mark_synced(game_id);
        let previous = local.state.swap_snapshot(persisted.id, captured);
        local.persist();
        info!(
          "[Sync] Game {} stored as match {}",
          game_id, persisted.id
        );

        let outcome = self
          .recorder
          .record_if_changed(captured.profile_id, captured, persisted.id, previous.as_ref())
          .await;
        if let RecordOutcome::Deferred(_) = outcome {
          debug!("[Sync] Milestone for match {} deferred", persisted.id);
        }
        Ok(Ack::Submitted {
          match_id: persisted.id,
        })
      }
      Err(SendError::Cancelled) => {
        local.state.enqueue_pending(captured);
        local.persist();
        info!("[Sync] Shutdown during submission of game {}; queued", game_id);
        Err(SyncFailure::Interrupted)
      }
      Err(SendError::Failed(AgentError::PermanentRejection { status, reason })) => {
        let id = local
          .state
          .dead_letter(captured, format!("HTTP {}: {}", status, reason));
        local.persist();
        error!(
          "[Sync] Tracker rejected game {} ({}): {}. Saved as dead letter {}",
          game_id, status, reason, id
        );
        Err(SyncFailure::Rejected { status, reason })
      }
      Err(SendError::Failed(e)) => {
        local.state.enqueue_pending(captured);
        local.persist();
        warn!("[Sync] Game {} queued after failed submission: {}", game_id, e);
        Err(SyncFailure::Queued(e.to_string()))
      }
    }
  }

  async fn send_with_retry(&self, captured: &CapturedMatch) -> Result<PersistedMatch, SendError> {
    let mut token = self.tokens.token().await;
    let mut refreshed = false;
    let mut attempt = 0;

    loop {
      attempt += 1;
      let result = tokio::select! {
        _ = self.cancel.cancelled() => return Err(SendError::Cancelled),
        result = self.api.create_match(token.as_deref(), captured) => result,
      };

      let err = match result {
        Ok(persisted) => return Ok(persisted),
        Err(e) => e,
      };

      match err {
        AgentError::AuthExpired if !refreshed => {
          refreshed = true;
          // The retry after a refresh does not count as an attempt
          attempt -= 1;
          match self.tokens.refresh().await {
            Ok(fresh) => token = Some(fresh),
            Err(e) => {
              warn!("[Sync] Token refresh failed: {}", e);
              return Err(SendError::Failed(AgentError::AuthExpired));
            }
          }
        }
        e if e.is_transient() => {
          if attempt >= self.policy.max_attempts {
            return Err(SendError::Failed(e));
          }
          let delay = self.policy.delay_for(attempt);
          debug!(
            "[Sync] Attempt {}/{} failed ({}); retrying in {:?}",
            attempt, self.policy.max_attempts, e, delay
          );
          tokio::select! {
            _ = self.cancel.cancelled() => return Err(SendError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
          }
        }
        e => return Err(SendError::Failed(e)),
      }
    }
  }
}
