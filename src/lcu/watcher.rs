// Polling state machine that follows the client through a game and captures
// the end-of-game result exactly once.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::client::{session_game_ids, ClientProbe};
use super::discovery::Discovery;
use super::types::{ClientPhase, ConnectionInfo};
use crate::error::AgentError;
use crate::mapper::{map_end_of_game, CaptureContext};
use crate::types::CapturedMatch;

// Games dropped after a mid-game disconnect that must never be captured later
const DISCARDED_WINDOW: usize = 16;

/// Identifiers of the running game, read from the gameflow session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameContext {
  pub game_id: Option<i64>,
  pub queue_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
  Idle,
  Connected {
    conn: ConnectionInfo,
  },
  InGame {
    conn: ConnectionInfo,
    game: GameContext,
  },
  /// End of game seen; waiting for the stats block to become readable.
  CaptureReady {
    conn: ConnectionInfo,
    game: GameContext,
  },
}

impl WatchState {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Idle => "Idle",
      Self::Connected { .. } => "Connected",
      Self::InGame { .. } => "InGame",
      Self::CaptureReady { .. } => "CaptureReady",
    }
  }
}

enum PhaseRead {
  Phase(ClientPhase),
  /// Endpoint gone; drop back to Idle
  Lost,
  Retry,
}

pub struct PollingStateMachine<D, P>
where
  D: Discovery,
  P: ClientProbe,
{
  discovery: D,
  probe: P,
  profile_id: i64,
  state: WatchState,
  phase: ClientPhase,
  champion_names: HashMap<i64, String>,
  last_captured_game: Option<String>,
  discarded_games: VecDeque<i64>,
  discovery_failures: u64,
}

impl<D, P> PollingStateMachine<D, P>
where
  D: Discovery,
  P: ClientProbe,
{
  pub fn new(discovery: D, probe: P, profile_id: i64) -> Self {
    Self {
      discovery,
      probe,
      profile_id,
      state: WatchState::Idle,
      phase: ClientPhase::None,
      champion_names: HashMap::new(),
      last_captured_game: None,
      discarded_games: VecDeque::new(),
      discovery_failures: 0,
    }
  }

  /// Last phase reported by the client (`None` while disconnected).
  pub fn current_phase(&self) -> ClientPhase {
    self.phase
  }

  pub(crate) fn state(&self) -> &WatchState {
    &self.state
  }

  /// Advance the machine by one poll. Returns a match when a game has just
  /// been captured. Never fails: transient problems are retried next tick.
  pub async fn tick(&mut self) -> Option<CapturedMatch> {
    let state = std::mem::replace(&mut self.state, WatchState::Idle);
    let from = state.name();

    let (next, captured) = match state {
      WatchState::Idle => (self.try_connect().await, None),
      WatchState::Connected { conn } => (self.poll_connected(conn).await, None),
      WatchState::InGame { conn, game } => match self.poll_in_game(conn, game).await {
        // Capture in the same tick the end of game is first seen
        WatchState::CaptureReady { conn, game } => self.capture(conn, game, false).await,
        next => (next, None),
      },
      WatchState::CaptureReady { conn, game } => self.capture(conn, game, true).await,
    };

    if next.name() != from {
      info!("[LCU Watcher] State changed: {} -> {}", from, next.name());
    }
    if matches!(next, WatchState::Idle) {
      self.phase = ClientPhase::None;
    }
    self.state = next;
    captured
  }

  fn discard(&mut self, game: &GameContext) {
    let Some(id) = game.game_id else {
      return;
    };
    if !self.discarded_games.contains(&id) {
      self.discarded_games.push_back(id);
      while self.discarded_games.len() > DISCARDED_WINDOW {
        self.discarded_games.pop_front();
      }
    }
  }

  fn is_discarded(&self, game_id: Option<i64>) -> bool {
    game_id.is_some_and(|id| self.discarded_games.contains(&id))
  }

  async fn try_connect(&mut self) -> WatchState {
    match self.discovery.discover().await {
      Ok(conn) => {
        info!(
          "[LCU Watcher] Found League client (pid {}) on port {}",
          conn.process_id, conn.port
        );
        self.discovery_failures = 0;
        self.champion_names.clear();
        WatchState::Connected { conn }
      }
      Err(e) => {
        self.discovery_failures += 1;
        if self.discovery_failures == 1 {
          info!("[LCU Watcher] Waiting for League client: {}", e);
        } else {
          debug!(
            "[LCU Watcher] League client still not found ({} checks): {}",
            self.discovery_failures, e
          );
        }
        WatchState::Idle
      }
    }
  }

  async fn read_phase(&mut self, conn: &ConnectionInfo) -> PhaseRead {
    match self.probe.gameflow_phase(conn).await {
      Ok(phase) => {
        if phase != self.phase {
          info!("[LCU Watcher] Phase changed: {} -> {}", self.phase, phase);
          self.phase = phase;
        }
        PhaseRead::Phase(phase)
      }
      Err(AgentError::Unreachable(e)) => {
        info!("[LCU Watcher] League client unreachable: {}", e);
        PhaseRead::Lost
      }
      Err(e) => {
        debug!("[LCU Watcher] Phase poll failed, retrying next tick: {}", e);
        PhaseRead::Retry
      }
    }
  }

  async fn game_context(&self, conn: &ConnectionInfo) -> GameContext {
    match self.probe.gameflow_session(conn).await {
      Ok(session) => {
        let (game_id, queue_id) = session_game_ids(&session);
        GameContext { game_id, queue_id }
      }
      Err(e) => {
        debug!("[LCU Watcher] Gameflow session unavailable: {}", e);
        GameContext::default()
      }
    }
  }

  async fn poll_connected(&mut self, conn: ConnectionInfo) -> WatchState {
    let phase = match self.read_phase(&conn).await {
      PhaseRead::Phase(phase) => phase,
      PhaseRead::Lost => return WatchState::Idle,
      PhaseRead::Retry => return WatchState::Connected { conn },
    };

    if phase.is_active_match() {
      let game = self.game_context(&conn).await;
      if self.is_discarded(game.game_id) {
        debug!(
          "[LCU Watcher] Game {:?} was dropped after a disconnect; not following it",
          game.game_id
        );
        return WatchState::Connected { conn };
      }
      info!(
        "[LCU Watcher] Game started (game id {:?}, queue {:?})",
        game.game_id, game.queue_id
      );
      return WatchState::InGame { conn, game };
    }
    WatchState::Connected { conn }
  }

  async fn poll_in_game(&mut self, conn: ConnectionInfo, mut game: GameContext) -> WatchState {
    let phase = match self.read_phase(&conn).await {
      PhaseRead::Phase(phase) => phase,
      PhaseRead::Lost => {
        // A missed game is preferred over a capture built from stale data
        warn!(
          "[LCU Watcher] Client lost mid-game (game id {:?}); this game will not be captured",
          game.game_id
        );
        self.discard(&game);
        return WatchState::Idle;
      }
      PhaseRead::Retry => return WatchState::InGame { conn, game },
    };

    match phase {
      ClientPhase::InProgress | ClientPhase::Reconnect => {
        if game.game_id.is_none() {
          game = self.game_context(&conn).await;
          if self.is_discarded(game.game_id) {
            return WatchState::Connected { conn };
          }
        }
        WatchState::InGame { conn, game }
      }
      ClientPhase::EndOfGame => WatchState::CaptureReady { conn, game },
      ClientPhase::None | ClientPhase::Lobby | ClientPhase::ChampSelect => {
        info!(
          "[LCU Watcher] Game left without an end-of-game screen (phase {}); nothing to capture",
          phase
        );
        WatchState::Connected { conn }
      }
    }
  }

  async fn capture(
    &mut self,
    conn: ConnectionInfo,
    game: GameContext,
    check_phase: bool,
  ) -> (WatchState, Option<CapturedMatch>) {
    if check_phase {
      match self.read_phase(&conn).await {
        PhaseRead::Phase(ClientPhase::EndOfGame) => {}
        PhaseRead::Phase(phase) => {
          warn!(
            "[LCU Watcher] Left end of game (now {}) before stats were available; game {:?} skipped",
            phase, game.game_id
          );
          return (WatchState::Connected { conn }, None);
        }
        PhaseRead::Lost => {
          self.discard(&game);
          return (WatchState::Idle, None);
        }
        PhaseRead::Retry => return (WatchState::CaptureReady { conn, game }, None),
      }
    }

    let eog = match self.probe.end_of_game_stats(&conn).await {
      Ok(block) => block,
      Err(AgentError::Unreachable(e)) => {
        warn!("[LCU Watcher] Client lost before stats were read: {}", e);
        self.discard(&game);
        return (WatchState::Idle, None);
      }
      Err(e) => {
        debug!("[LCU Watcher] End-of-game stats not ready: {}", e);
        return (WatchState::CaptureReady { conn, game }, None);
      }
    };

    // Without the ranked reading the match would report a bogus "Unranked"
    let ranked = match self.probe.ranked_stats(&conn).await {
      Ok(ranked) => ranked,
      Err(AgentError::Unreachable(e)) => {
        warn!("[LCU Watcher] Client lost before ranked stats were read: {}", e);
        self.discard(&game);
        return (WatchState::Idle, None);
      }
      Err(e) => {
        debug!("[LCU Watcher] Ranked stats not ready: {}", e);
        return (WatchState::CaptureReady { conn, game }, None);
      }
    };

    if self.champion_names.is_empty() {
      match self.probe.champion_names(&conn).await {
        Ok(names) => self.champion_names = names,
        Err(e) => debug!("[LCU Watcher] Champion catalog unavailable: {}", e),
      }
    }

    let ctx = CaptureContext {
      profile_id: self.profile_id,
      queue_id_hint: game.queue_id,
      game_id_hint: game.game_id,
      champion_names: &self.champion_names,
      captured_at: Utc::now(),
    };
    let Some(captured) = map_end_of_game(&eog, &ranked, &ctx) else {
      debug!("[LCU Watcher] End-of-game block incomplete, retrying next tick");
      return (WatchState::CaptureReady { conn, game }, None);
    };

    let discarded = captured
      .external_game_id
      .parse::<i64>()
      .ok()
      .is_some_and(|id| self.discarded_games.contains(&id));
    if discarded {
      info!(
        "[LCU Watcher] Game {} was dropped after a disconnect; not capturing it",
        captured.external_game_id
      );
      return (WatchState::Connected { conn }, None);
    }

    if self.last_captured_game.as_deref() == Some(captured.external_game_id.as_str()) {
      info!(
        "[LCU Watcher] Game {} already captured; ignoring repeat end of game",
        captured.external_game_id
      );
      return (WatchState::Connected { conn }, None);
    }

    info!(
      "[LCU Watcher] Captured game {}: {} {} {}/{}/{} ({})",
      captured.external_game_id,
      captured.champion,
      if captured.win { "win" } else { "loss" },
      captured.kills,
      captured.deaths,
      captured.assists,
      captured.game_mode
    );
    self.last_captured_game = Some(captured.external_game_id.clone());
    (WatchState::Connected { conn }, Some(captured))
  }
}
