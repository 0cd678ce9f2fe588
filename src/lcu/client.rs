// LCU REST calls used by the watcher

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::types::{ClientPhase, ConnectionInfo};
use crate::error::{AgentError, Result};

const GAMEFLOW_PHASE: &str = "/lol-gameflow/v1/gameflow-phase";
const GAMEFLOW_SESSION: &str = "/lol-gameflow/v1/session";
const EOG_STATS_BLOCK: &str = "/lol-end-of-game/v1/eog-stats-block";
const CURRENT_RANKED_STATS: &str = "/lol-ranked/v1/current-ranked-stats";
const CHAMPION_SUMMARY: &str = "/lol-game-data/assets/v1/champion-summary.json";

/// Read-only view of the client needed to follow a game to its end.
#[async_trait]
pub trait ClientProbe: Send + Sync {
  async fn gameflow_phase(&self, conn: &ConnectionInfo) -> Result<ClientPhase>;
  async fn gameflow_session(&self, conn: &ConnectionInfo) -> Result<Value>;
  async fn end_of_game_stats(&self, conn: &ConnectionInfo) -> Result<Value>;
  async fn ranked_stats(&self, conn: &ConnectionInfo) -> Result<Value>;
  async fn champion_names(&self, conn: &ConnectionInfo) -> Result<HashMap<i64, String>>;
}

#[derive(Clone)]
pub struct LcuClient {
  http: reqwest::Client,
}

impl LcuClient {
  pub fn new() -> Result<Self> {
    // The client serves a self-signed certificate on 127.0.0.1
    let http = reqwest::Client::builder()
      .danger_accept_invalid_certs(true)
      .timeout(Duration::from_secs(5))
      .connect_timeout(Duration::from_secs(2))
      .pool_max_idle_per_host(2)
      .build()
      .map_err(|e| AgentError::Configuration(format!("Failed to create LCU client: {}", e)))?;
    Ok(Self { http })
  }

  async fn get(&self, conn: &ConnectionInfo, path: &str) -> Result<reqwest::Response> {
    let resp = self
      .http
      .get(conn.url(path))
      .header("Authorization", conn.auth_header())
      .send()
      .await
      .map_err(AgentError::from_lcu)?;

    if !resp.status().is_success() {
      // 404 on the stats block just means "not ready yet"
      return Err(AgentError::TransientNetwork(format!(
        "LCU {} returned {}",
        path,
        resp.status()
      )));
    }
    Ok(resp)
  }

  async fn get_json(&self, conn: &ConnectionInfo, path: &str) -> Result<Value> {
    self
      .get(conn, path)
      .await?
      .json::<Value>()
      .await
      .map_err(|e| AgentError::TransientNetwork(format!("Failed to parse {}: {}", path, e)))
  }
}

#[async_trait]
impl ClientProbe for LcuClient {
  async fn gameflow_phase(&self, conn: &ConnectionInfo) -> Result<ClientPhase> {
    let text = self
      .get(conn, GAMEFLOW_PHASE)
      .await?
      .text()
      .await
      .map_err(AgentError::from_lcu)?;
    Ok(ClientPhase::from_gameflow(&text))
  }

  async fn gameflow_session(&self, conn: &ConnectionInfo) -> Result<Value> {
    self.get_json(conn, GAMEFLOW_SESSION).await
  }

  async fn end_of_game_stats(&self, conn: &ConnectionInfo) -> Result<Value> {
    self.get_json(conn, EOG_STATS_BLOCK).await
  }

  async fn ranked_stats(&self, conn: &ConnectionInfo) -> Result<Value> {
    self.get_json(conn, CURRENT_RANKED_STATS).await
  }

  async fn champion_names(&self, conn: &ConnectionInfo) -> Result<HashMap<i64, String>> {
    let summary = self.get_json(conn, CHAMPION_SUMMARY).await?;
    let names = parse_champion_summary(&summary);
    debug!("[LCU Client] Loaded {} champion names", names.len());
    Ok(names)
  }
}

/// `[{ "id": 22, "name": "Ashe", ... }, ...]` -> id to name. The `-1` "None"
/// placeholder entry is skipped.
pub fn parse_champion_summary(summary: &Value) -> HashMap<i64, String> {
  summary
    .as_array()
    .map(|entries| {
      entries
        .iter()
        .filter_map(|entry| {
          let id = entry.get("id").and_then(|v| v.as_i64()).filter(|id| *id > 0)?;
          let name = entry.get("name").and_then(|v| v.as_str())?;
          Some((id, name.to_string()))
        })
        .collect()
    })
    .unwrap_or_default()
}

/// Pull `gameData.gameId` and `gameData.queue.id` out of a gameflow session.
pub fn session_game_ids(session: &Value) -> (Option<i64>, Option<i64>) {
  let game_data = session.get("gameData");
  let game_id = game_data
    .and_then(|g| g.get("gameId"))
    .and_then(|v| v.as_i64())
    .filter(|id| *id > 0);
  let queue_id = game_data
    .and_then(|g| g.get("queue"))
    .and_then(|q| q.get("id"))
    .and_then(|v| v.as_i64())
    .filter(|id| *id > 0);
  (game_id, queue_id)
}
