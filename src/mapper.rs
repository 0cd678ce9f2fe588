// Translation from League client vocabulary into tracker domain values.
//
// Every function here is total: unexpected input degrades to a documented
// default ("Other", 4, None, false, "Unranked") instead of failing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::types::CapturedMatch;

pub const UNRANKED_TIER: &str = "Unranked";
pub const SOLO_QUEUE_KEY: &str = "RANKED_SOLO_5x5";
pub const FLEX_QUEUE_KEY: &str = "RANKED_FLEX_SR";

pub const ROLE_TOP: &str = "Top";
pub const ROLE_JUNGLE: &str = "Jungle";
pub const ROLE_MID: &str = "Mid";
pub const ROLE_ADC: &str = "ADC";
pub const ROLE_SUPPORT: &str = "Support";

const QUEUE_GAME_MODES: &[(i64, &str)] = &[
  (400, "Normal"),
  (420, "Ranked Solo"),
  (430, "Normal"),
  (440, "Ranked Flex"),
  (450, "ARAM"),
  (480, "Swift Play"),
  (900, "ARURF"),
  (1700, "Arena"),
  (1900, "URF"),
  (2400, "ARAM Mayhem"),
];

// Champions conventionally played as the bottom-lane carry
const COMMON_ADC_CHAMPION_IDS: &[i64] = &[
  15,  // Sivir
  18,  // Tristana
  21,  // Miss Fortune
  22,  // Ashe
  29,  // Twitch
  42,  // Corki
  51,  // Caitlyn
  67,  // Vayne
  81,  // Ezreal
  96,  // Kog'Maw
  110, // Varus
  119, // Draven
  145, // Kai'Sa
  202, // Jhin
  221, // Zeri
  222, // Jinx
  236, // Lucian
  360, // Samira
  429, // Kalista
  498, // Xayah
  523, // Aphelios
  895, // Nilah
  901, // Smolder
];

const TIER_NAMES: &[&str] = &[
  "Iron",
  "Bronze",
  "Silver",
  "Gold",
  "Platinum",
  "Emerald",
  "Diamond",
  "Master",
  "Grandmaster",
  "Challenger",
];

pub fn map_queue_id_to_game_mode(queue_id: i64) -> &'static str {
  QUEUE_GAME_MODES
    .iter()
    .find(|(id, _)| *id == queue_id)
    .map(|(_, mode)| *mode)
    .unwrap_or("Other")
}

/// Roman numeral division to number. Anything unrecognised is division 4.
pub fn parse_division(division: Option<&str>) -> u8 {
  match division.map(str::trim) {
    Some("I") => 1,
    Some("II") => 2,
    Some("III") => 3,
    Some("IV") => 4,
    _ => 4,
  }
}

pub fn normalize_position(position: Option<&str>) -> Option<&'static str> {
  let position = position?.trim().to_ascii_uppercase();
  match position.as_str() {
    "TOP" => Some(ROLE_TOP),
    "JUNGLE" => Some(ROLE_JUNGLE),
    "MID" | "MIDDLE" => Some(ROLE_MID),
    "BOT" | "BOTTOM" | "ADC" | "CARRY" => Some(ROLE_ADC),
    "SUPPORT" | "UTILITY" => Some(ROLE_SUPPORT),
    _ => None,
  }
}

pub fn is_common_adc(champion_id: i64) -> bool {
  COMMON_ADC_CHAMPION_IDS.contains(&champion_id)
}

pub fn is_none_or_empty(value: Option<&str>) -> bool {
  match value.map(str::trim) {
    None => true,
    Some(s) => s.is_empty() || s.eq_ignore_ascii_case("none"),
  }
}

/// "GOLD" -> "Gold". Unknown or missing tiers are "Unranked".
pub fn normalize_tier(tier: Option<&str>) -> &'static str {
  let Some(tier) = tier.map(str::trim) else {
    return UNRANKED_TIER;
  };
  TIER_NAMES
    .iter()
    .find(|name| name.eq_ignore_ascii_case(tier))
    .copied()
    .unwrap_or(UNRANKED_TIER)
}

/// Which ranked ladder a queue reports against.
pub fn ranked_queue_key(queue_id: i64) -> &'static str {
  if queue_id == 440 {
    FLEX_QUEUE_KEY
  } else {
    SOLO_QUEUE_KEY
  }
}

fn bot_lane_partner(role: &str) -> Option<&'static str> {
  match role {
    ROLE_ADC => Some(ROLE_SUPPORT),
    ROLE_SUPPORT => Some(ROLE_ADC),
    _ => None,
  }
}

/// Inputs to an end-of-game capture that do not come from the stats block.
pub struct CaptureContext<'a> {
  pub profile_id: i64,
  /// Queue id seen in the gameflow session while the game was running
  pub queue_id_hint: Option<i64>,
  pub game_id_hint: Option<i64>,
  pub champion_names: &'a HashMap<i64, String>,
  pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankReading {
  pub tier: &'static str,
  pub division: u8,
  pub lp: i32,
}

impl Default for RankReading {
  fn default() -> Self {
    Self {
      tier: UNRANKED_TIER,
      division: 4,
      lp: 0,
    }
  }
}

/// Read the ladder entry for `queue_key` from `/lol-ranked/v1/current-ranked-stats`.
pub fn read_ranked_entry(ranked: &Value, queue_key: &str) -> RankReading {
  let entry = ranked
    .get("queueMap")
    .and_then(|m| m.get(queue_key))
    .or_else(|| {
      ranked
        .get("queues")
        .and_then(|q| q.as_array())
        .and_then(|queues| {
          queues
            .iter()
            .find(|q| q.get("queueType").and_then(|t| t.as_str()) == Some(queue_key))
        })
    });

  let Some(entry) = entry else {
    return RankReading::default();
  };

  let tier_raw = entry.get("tier").and_then(|v| v.as_str());
  if is_none_or_empty(tier_raw) {
    return RankReading::default();
  }

  RankReading {
    tier: normalize_tier(tier_raw),
    division: parse_division(entry.get("division").and_then(|v| v.as_str())),
    lp: entry
      .get("leaguePoints")
      .and_then(|v| v.as_i64())
      .map(|lp| i32::try_from(lp).unwrap_or(if lp < 0 { i32::MIN } else { i32::MAX }))
      .unwrap_or(0),
  }
}

#[derive(Debug, Clone)]
struct PlayerView<'a> {
  raw: &'a Value,
  champion_id: i64,
  role: Option<&'static str>,
}

impl<'a> PlayerView<'a> {
  fn new(raw: &'a Value) -> Self {
    let champion_id = raw.get("championId").and_then(|v| v.as_i64()).unwrap_or(0);
    Self {
      raw,
      champion_id,
      role: player_position(raw),
    }
  }

  fn is_same_player(&self, other: &Value) -> bool {
    for key in ["puuid", "summonerId"] {
      if let (Some(a), Some(b)) = (self.raw.get(key), other.get(key)) {
        if !a.is_null() && a == b {
          return true;
        }
      }
    }
    false
  }
}

fn team_players(team: &Value) -> Vec<PlayerView<'_>> {
  team
    .get("players")
    .and_then(|p| p.as_array())
    .map(|players| players.iter().map(PlayerView::new).collect())
    .unwrap_or_default()
}

fn player_position(player: &Value) -> Option<&'static str> {
  ["selectedPosition", "detectedTeamPosition", "teamPosition"]
    .iter()
    .filter_map(|key| player.get(*key).and_then(|v| v.as_str()))
    .find_map(|raw| normalize_position(Some(raw)))
}

fn stat(stats: Option<&Value>, key: &str) -> u32 {
  stats
    .and_then(|s| s.get(key))
    .and_then(|v| v.as_u64())
    .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
    .unwrap_or(0)
}

fn champion_name(player: &Value, champion_id: i64, catalog: &HashMap<i64, String>) -> String {
  if let Some(name) = player.get("championName").and_then(|v| v.as_str()) {
    if !is_none_or_empty(Some(name)) {
      return name.to_string();
    }
  }
  catalog
    .get(&champion_id)
    .cloned()
    .unwrap_or_else(|| format!("Champion {}", champion_id))
}

/// Build the captured match from `/lol-end-of-game/v1/eog-stats-block`.
///
/// Returns `None` when the block does not describe a finished game yet (no
/// local player or no game id), which the watcher treats as "try again".
pub fn map_end_of_game(
  eog: &Value,
  ranked: &Value,
  ctx: &CaptureContext<'_>,
) -> Option<CapturedMatch> {
  let local = eog.get("localPlayer").filter(|v| v.is_object())?;
  let game_id = eog
    .get("gameId")
    .and_then(|v| v.as_i64())
    .filter(|id| *id > 0)
    .or(ctx.game_id_hint)?;

  let queue_id = eog
    .get("queueId")
    .and_then(|v| v.as_i64())
    .or(ctx.queue_id_hint)
    .unwrap_or(-1);

  let me = PlayerView::new(local);
  let teams: Vec<&Value> = eog
    .get("teams")
    .and_then(|v| v.as_array())
    .map(|t| t.iter().collect())
    .unwrap_or_default();

  let local_team_id = local.get("teamId").and_then(|v| v.as_i64());
  let is_my_team = |team: &Value| -> bool {
    if let Some(flag) = team.get("isPlayerTeam").and_then(|v| v.as_bool()) {
      return flag;
    }
    local_team_id.is_some() && team.get("teamId").and_then(|v| v.as_i64()) == local_team_id
  };

  let my_team = teams.iter().copied().find(|t| is_my_team(t));
  let allies: Vec<PlayerView<'_>> = my_team
    .map(team_players)
    .unwrap_or_default()
    .into_iter()
    .filter(|p| !me.is_same_player(p.raw))
    .collect();
  let enemies: Vec<PlayerView<'_>> = teams
    .iter()
    .copied()
    .filter(|t| !is_my_team(t))
    .flat_map(team_players)
    .collect();

  let role = me
    .role
    .or_else(|| is_common_adc(me.champion_id).then_some(ROLE_ADC));
  if me.role.is_none() && role.is_some() {
    debug!(
      "[Mapper] No position reported for champion {}; assuming ADC",
      me.champion_id
    );
  }

  let name_of =
    |p: &PlayerView<'_>| champion_name(p.raw, p.champion_id, ctx.champion_names);

  let find_role = |players: &[PlayerView<'_>], wanted: &str| -> Option<String> {
    players
      .iter()
      .find(|p| p.role == Some(wanted))
      .or_else(|| {
        // Positions are often missing outside draft queues
        (wanted == ROLE_ADC)
          .then(|| players.iter().find(|p| p.role.is_none() && is_common_adc(p.champion_id)))
          .flatten()
      })
      .map(|p| name_of(p))
  };

  let (lane_ally, lane_enemy, lane_enemy_ally) = match role {
    Some(role) => {
      let partner = bot_lane_partner(role);
      (
        partner.and_then(|p| find_role(&allies, p)),
        find_role(&enemies, role),
        partner.and_then(|p| find_role(&enemies, p)),
      )
    }
    None => (None, None, None),
  };

  let stats = local.get("stats");
  let win = my_team
    .and_then(|t| t.get("isWinningTeam"))
    .and_then(|v| v.as_bool())
    .unwrap_or_else(|| stat(stats, "WIN") == 1);

  let game_length_secs = eog.get("gameLength").and_then(|v| v.as_u64()).unwrap_or(0);
  let rank = read_ranked_entry(ranked, ranked_queue_key(queue_id));

  Some(CapturedMatch {
    champion: champion_name(local, me.champion_id, ctx.champion_names),
    role: role.map(str::to_string),
    lane_ally,
    lane_enemy,
    lane_enemy_ally,
    kills: stat(stats, "CHAMPIONS_KILLED"),
    deaths: stat(stats, "NUM_DEATHS"),
    assists: stat(stats, "ASSISTS"),
    cs: stat(stats, "MINIONS_KILLED").saturating_add(stat(stats, "NEUTRAL_MINIONS_KILLED")),
    game_length_minutes: u32::try_from(game_length_secs.saturating_add(30) / 60).unwrap_or(u32::MAX),
    win,
    date: ctx.captured_at,
    current_tier: rank.tier.to_string(),
    current_division: rank.division,
    current_lp: rank.lp,
    game_mode: map_queue_id_to_game_mode(queue_id).to_string(),
    queue_id,
    profile_id: ctx.profile_id,
    external_game_id: game_id.to_string(),
  })
}
