// Local persistence for sync progress: cursor, pending queue, dead letters

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::mapper::ranked_queue_key;
use crate::types::{CapturedMatch, RankSnapshot};

pub const SYNC_STATE_FILE: &str = "sync-state.json";

// How many acknowledged game ids are remembered for dedup
const SYNCED_WINDOW: usize = 256;

/// A JSON document on disk, written atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct JsonFile<T> {
  path: PathBuf,
  _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
  T: Serialize + DeserializeOwned + Default,
{
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      _marker: PhantomData,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Missing file yields the default. A corrupt file is moved aside so it can
  /// be inspected, and the default is used.
  pub fn load(&self) -> T {
    let content = match fs::read_to_string(&self.path) {
      Ok(c) => c,
      Err(_) => return T::default(),
    };
    match serde_json::from_str(&content) {
      Ok(value) => value,
      Err(e) => {
        let aside = self.path.with_extension("corrupt.json");
        warn!(
          "[Store] {} is corrupt ({}); moving it to {}",
          self.path.display(),
          e,
          aside.display()
        );
        if let Err(e) = fs::rename(&self.path, &aside) {
          warn!("[Store] Failed to move corrupt file aside: {}", e);
        }
        T::default()
      }
    }
  }

  pub fn save(&self, value: &T) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(value)?;
    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, &self.path)?;
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
  pub id: Uuid,
  #[serde(rename = "match")]
  pub captured: CapturedMatch,
  pub reason: String,
  pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
  /// Last acknowledged external game id
  #[serde(default)]
  pub cursor: Option<String>,
  #[serde(default)]
  pub synced_ids: VecDeque<String>,
  #[serde(default)]
  pub pending: Vec<CapturedMatch>,
  #[serde(default)]
  pub dead_letters: Vec<DeadLetter>,
  /// Rank left by the last acknowledged match, keyed by `profile:ladder`
  #[serde(default)]
  pub last_ranked: HashMap<String, RankSnapshot>,
}

pub fn ladder_key(captured: &CapturedMatch) -> String {
  format!(
    "{}:{}",
    captured.profile_id,
    ranked_queue_key(captured.queue_id)
  )
}

impl SyncState {
  pub fn is_synced(&self, external_game_id: &str) -> bool {
    self.cursor.as_deref() == Some(external_game_id)
      || self.synced_ids.iter().any(|id| id == external_game_id)
  }

  /// Advance the cursor. Only called after the remote acknowledged the game.
  pub fn mark_synced(&mut self, external_game_id: &str) {
    self.cursor = Some(external_game_id.to_string());
    if !self.synced_ids.iter().any(|id| id == external_game_id) {
      self.synced_ids.push_back(external_game_id.to_string());
    }
    while self.synced_ids.len() > SYNCED_WINDOW {
      self.synced_ids.pop_front();
    }
    self.remove_pending(external_game_id);
  }

  /// Queue for a later run. Returns false if the game was already queued.
  pub fn enqueue_pending(&mut self, captured: &CapturedMatch) -> bool {
    if self
      .pending
      .iter()
      .any(|m| m.external_game_id == captured.external_game_id)
    {
      return false;
    }
    self.pending.push(captured.clone());
    true
  }

  pub fn remove_pending(&mut self, external_game_id: &str) {
    self.pending.retain(|m| m.external_game_id != external_game_id);
  }

  pub fn dead_letter(&mut self, captured: &CapturedMatch, reason: String) -> Uuid {
    self.remove_pending(&captured.external_game_id);
    let id = Uuid::new_v4();
    self.dead_letters.push(DeadLetter {
      id,
      captured: captured.clone(),
      reason,
      failed_at: Utc::now(),
    });
    id
  }

  /// Record the rank this match leaves behind and return the one it replaces.
  /// A replayed match older than the stored one neither replaces it nor gets
  /// a "previous", so milestones stay ordered by match date.
  pub fn swap_snapshot(&mut self, match_id: i64, captured: &CapturedMatch) -> Option<RankSnapshot> {
    let key = ladder_key(captured);
    let next = RankSnapshot::from_match(match_id, captured);
    match self.last_ranked.get(&key) {
      Some(prev) if prev.date > captured.date => None,
      _ => self.last_ranked.insert(key, next),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  pub fn sample_match(external_game_id: &str) -> CapturedMatch {
    CapturedMatch {
      champion: "Ashe".into(),
      role: Some("ADC".into()),
      lane_ally: None,
      lane_enemy: None,
      lane_enemy_ally: None,
      kills: 1,
      deaths: 2,
      assists: 3,
      cs: 100,
      game_length_minutes: 25,
      win: true,
      date: Utc::now(),
      current_tier: "Gold".into(),
      current_division: 2,
      current_lp: 10,
      game_mode: "Ranked Solo".into(),
      queue_id: 420,
      profile_id: 7,
      external_game_id: external_game_id.into(),
    }
  }

  #[test]
  fn cursor_window_is_bounded_and_clears_pending() {
    let mut state = SyncState::default();
    state.enqueue_pending(&sample_match("1"));
    state.mark_synced("1");
    assert!(state.pending.is_empty());
    assert!(state.is_synced("1"));

    for id in 2..(SYNCED_WINDOW as u64 + 10) {
      state.mark_synced(&id.to_string());
    }
    assert_eq!(state.synced_ids.len(), SYNCED_WINDOW);
    assert!(!state.is_synced("1"));
    assert_eq!(state.cursor.as_deref(), Some("265"));
  }

  #[test]
  fn pending_queue_has_no_duplicates() {
    let mut state = SyncState::default();
    assert!(state.enqueue_pending(&sample_match("5")));
    assert!(!state.enqueue_pending(&sample_match("5")));
    assert_eq!(state.pending.len(), 1);

    let id = state.dead_letter(&sample_match("5"), "bad payload".into());
    assert!(state.pending.is_empty());
    assert_eq!(state.dead_letters[0].id, id);
  }

  #[test]
  fn older_replays_do_not_replace_snapshot() {
    let mut state = SyncState::default();
    let newer = sample_match("2");
    let mut older = sample_match("1");
    older.date = newer.date - Duration::hours(1);
    older.current_tier = "Silver".into();

    assert!(state.swap_snapshot(20, &newer).is_none());
    assert!(state.swap_snapshot(10, &older).is_none());
    assert_eq!(state.last_ranked[&ladder_key(&newer)].match_id, 20);

    let mut latest = sample_match("3");
    latest.date = newer.date + Duration::hours(1);
    let prev = state.swap_snapshot(30, &latest).unwrap();
    assert_eq!(prev.match_id, 20);
  }

  #[test]
  fn json_file_roundtrip_and_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let file: JsonFile<SyncState> = JsonFile::new(dir.path().join(SYNC_STATE_FILE));
    assert_eq!(file.load(), SyncState::default());

    let mut state = SyncState::default();
    state.mark_synced("42");
    file.save(&state).unwrap();
    assert_eq!(file.load(), state);

    fs::write(file.path(), "{ truncated").unwrap();
    assert_eq!(file.load(), SyncState::default());
    assert!(dir.path().join("sync-state.corrupt.json").exists());
  }
}
