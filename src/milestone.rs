// Rank milestone recording - one promotion/demotion per rank-changing match

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{AgentError, Result};
use crate::rank::classify;
use crate::sync::api::{MilestoneApi, MilestoneOutcome, TokenProvider};
use crate::sync::store::JsonFile;
use crate::types::{CapturedMatch, RankMilestone, RankSnapshot};

pub const MILESTONE_STATE_FILE: &str = "milestones.json";

// Match ids kept for dedup; the oldest (lowest) ids are dropped first
const RECORDED_WINDOW: usize = 512;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneState {
  /// Match ids that already have a milestone on the server
  #[serde(default)]
  pub recorded: BTreeSet<i64>,
  /// Milestones detected but not yet accepted by the server
  #[serde(default)]
  pub pending: Vec<RankMilestone>,
}

impl MilestoneState {
  fn knows(&self, match_id: i64) -> bool {
    self.recorded.contains(&match_id) || self.pending.iter().any(|m| m.match_id == match_id)
  }

  fn remember(&mut self, match_id: i64) {
    self.recorded.insert(match_id);
    while self.recorded.len() > RECORDED_WINDOW {
      self.recorded.pop_first();
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
  /// No previous match or the rank did not move
  Unchanged,
  Recorded(RankMilestone),
  /// Detected, but the server could not be reached; kept for a later retry
  Deferred(RankMilestone),
  /// A milestone for this match exists already
  Duplicate,
}

pub struct MilestoneRecorder {
  api: Arc<dyn MilestoneApi>,
  tokens: Arc<dyn TokenProvider>,
  file: JsonFile<MilestoneState>,
  state: Mutex<MilestoneState>,
}

impl MilestoneRecorder {
  pub fn new(
    api: Arc<dyn MilestoneApi>,
    tokens: Arc<dyn TokenProvider>,
    file: JsonFile<MilestoneState>,
  ) -> Self {
    let state = file.load();
    Self {
      api,
      tokens,
      file,
      state: Mutex::new(state),
    }
  }

  pub async fn snapshot(&self) -> MilestoneState {
    self.state.lock().await.clone()
  }

  /// Create a milestone when `captured` moved the rank relative to `previous`.
  /// Idempotent per `match_id`.
  pub async fn record_if_changed(
    &self,
    profile_id: i64,
    captured: &CapturedMatch,
    match_id: i64,
    previous: Option<&RankSnapshot>,
  ) -> RecordOutcome {
    let Some(previous) = previous else {
      return RecordOutcome::Unchanged;
    };
    let change = classify(
      Some((previous.tier.as_str(), previous.division)),
      (captured.current_tier.as_str(), captured.current_division),
    );
    let Some(milestone_type) = change.milestone_type() else {
      return RecordOutcome::Unchanged;
    };

    let milestone = RankMilestone {
      profile_id,
      tier: captured.current_tier.clone(),
      division: captured.current_division,
      achieved_at: captured.date,
      match_id,
      milestone_type,
    };

    let mut state = self.state.lock().await;
    if state.knows(match_id) {
      info!("[Milestones] Match {} already has a milestone", match_id);
      return RecordOutcome::Duplicate;
    }

    info!(
      "[Milestones] {:?}: {} {} -> {} {} (match {})",
      milestone_type,
      previous.tier,
      previous.division,
      milestone.tier,
      milestone.division,
      match_id
    );

    let outcome = match self.send(&milestone).await {
      Ok(_) => {
        state.remember(match_id);
        RecordOutcome::Recorded(milestone)
      }
      Err(e) if e.is_transient() || matches!(e, AgentError::AuthExpired) => {
        warn!("[Milestones] Deferring milestone for match {}: {}", match_id, e);
        state.pending.push(milestone.clone());
        RecordOutcome::Deferred(milestone)
      }
      Err(e) => {
        error!("[Milestones] Milestone for match {} rejected: {}", match_id, e);
        // Remember it so a replay of the match does not try again
        state.remember(match_id);
        RecordOutcome::Unchanged
      }
    };
    self.persist(&state);
    outcome
  }

  /// Resend milestones that could not be delivered earlier, oldest first.
  pub async fn retry_pending(&self) -> usize {
    let mut state = self.state.lock().await;
    if state.pending.is_empty() {
      return 0;
    }

    let mut delivered = 0;
    let queued = std::mem::take(&mut state.pending);
    let mut remaining = Vec::new();
    let mut stop = false;
    for milestone in queued {
      if stop {
        remaining.push(milestone);
        continue;
      }
      match self.send(&milestone).await {
        Ok(_) => {
          state.remember(milestone.match_id);
          delivered += 1;
        }
        Err(e) if e.is_transient() || matches!(e, AgentError::AuthExpired) => {
          warn!("[Milestones] Server still unavailable: {}", e);
          remaining.push(milestone);
          stop = true;
        }
        Err(e) => {
          error!(
            "[Milestones] Dropping rejected milestone for match {}: {}",
            milestone.match_id, e
          );
          state.remember(milestone.match_id);
        }
      }
    }
    state.pending = remaining;
    self.persist(&state);
    delivered
  }

  async fn send(&self, milestone: &RankMilestone) -> Result<MilestoneOutcome> {
    let token = self.tokens.token().await;
    match self.api.create_milestone(token.as_deref(), milestone).await {
      Err(AgentError::AuthExpired) => {
        let token = self.tokens.refresh().await?;
        self.api.create_milestone(Some(&token), milestone).await
      }
      other => other,
    }
  }

  fn persist(&self, state: &MilestoneState) {
    if let Err(e) = self.file.save(state) {
      error!(
        "[Milestones] Failed to save {}: {}",
        self.file.path().display(),
        e
      );
    }
  }
}
