use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Domain records exchanged with the tracker API

/// One finished game for the local player, as submitted to `POST /api/matches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedMatch {
  pub champion: String,
  pub role: Option<String>,
  pub lane_ally: Option<String>,
  pub lane_enemy: Option<String>,
  pub lane_enemy_ally: Option<String>,
  pub kills: u32,
  pub deaths: u32,
  pub assists: u32,
  pub cs: u32,
  pub game_length_minutes: u32,
  pub win: bool,
  pub date: DateTime<Utc>,
  pub current_tier: String,
  pub current_division: u8,
  pub current_lp: i32,
  pub game_mode: String,
  pub queue_id: i64,
  pub profile_id: i64,
  pub external_game_id: String,
}

/// What the tracker API returns for a created (or already existing) match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMatch {
  pub id: i64,
  #[serde(default)]
  pub external_game_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneType {
  Promotion,
  Demotion,
  Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankMilestone {
  pub profile_id: i64,
  pub tier: String,
  pub division: u8,
  pub achieved_at: DateTime<Utc>,
  pub match_id: i64,
  #[serde(rename = "type")]
  pub milestone_type: MilestoneType,
}

/// Rank state left behind by the last acknowledged match of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankSnapshot {
  pub match_id: i64,
  pub tier: String,
  pub division: u8,
  pub lp: i32,
  pub date: DateTime<Utc>,
}

impl RankSnapshot {
  pub fn from_match(match_id: i64, captured: &CapturedMatch) -> Self {
    Self {
      match_id,
      tier: captured.current_tier.clone(),
      division: captured.current_division,
      lp: captured.current_lp,
      date: captured.date,
    }
  }
}
