// Tests for discovery failures and client restarts

use super::super::ClientPhase;
use super::test_helpers::*;

#[cfg(test)]
mod disconnect_tests {
  use super::*;

  #[tokio::test]
  async fn test_client_not_running_stays_idle() {
    let (mut machine, discovery, _probe) = running_machine();
    discovery.set_running(false);

    for _ in 0..4 {
      assert!(machine.tick().await.is_none());
      assert_eq!(machine.state().name(), "Idle");
    }
    assert_eq!(discovery.calls(), 4);
    assert_eq!(machine.current_phase(), ClientPhase::None);

    // Client starts after the agent
    discovery.set_running(true);
    machine.tick().await;
    assert_eq!(machine.state().name(), "Connected");
  }

  /// Scenario: endpoint becomes unreachable while InGame.
  /// Expected: reset to Idle with no capture; the next discovered game still
  /// produces exactly one capture.
  #[tokio::test]
  async fn test_unreachable_mid_game_drops_game_then_recovers() {
    let (mut machine, discovery, probe) = running_machine();
    machine.tick().await;
    probe.set_phase(ClientPhase::InProgress);
    machine.tick().await;
    assert_eq!(machine.state().name(), "InGame");

    // Client crashes
    probe.set(Step::Unreachable);
    discovery.set_running(false);
    assert!(machine.tick().await.is_none());
    assert_eq!(machine.state().name(), "Idle");
    assert_eq!(machine.current_phase(), ClientPhase::None);

    // Client restarts on a new port while the old game's end screen shows up
    discovery.set_running(true);
    discovery.set_port(50_000);
    probe.set_phase(ClientPhase::EndOfGame);
    assert!(machine.tick().await.is_none());
    assert!(machine.tick().await.is_none());
    assert_eq!(probe.eog_calls(), 0);

    // Next game
    probe.set_game_id(1_001);
    let mut captured = Vec::new();
    probe.set_phase(ClientPhase::InProgress);
    captured.extend(machine.tick().await);
    probe.set_phase(ClientPhase::EndOfGame);
    captured.extend(machine.tick().await);
    captured.extend(machine.tick().await);

    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].external_game_id, "1001");
  }

  #[tokio::test]
  async fn test_unreachable_while_waiting_for_stats_drops_game() {
    let (mut machine, _discovery, probe) = running_machine();
    machine.tick().await;
    probe.set_phase(ClientPhase::InProgress);
    machine.tick().await;
    probe.set_stats_ready(false);
    probe.set_phase(ClientPhase::EndOfGame);
    machine.tick().await;
    assert_eq!(machine.state().name(), "CaptureReady");

    probe.set(Step::Unreachable);
    assert!(machine.tick().await.is_none());
    assert_eq!(machine.state().name(), "Idle");
  }

  /// Scenario: client crashes mid-game, restarts and rejoins the same game,
  /// which then reaches its end-of-game screen.
  /// Expected: the dropped game is never captured; a later game still is.
  #[tokio::test]
  async fn test_rejoined_game_after_crash_is_not_captured() {
    let (mut machine, discovery, probe) = running_machine();
    machine.tick().await;
    probe.set_phase(ClientPhase::InProgress);
    machine.tick().await;
    assert_eq!(machine.state().name(), "InGame");

    probe.set(Step::Unreachable);
    assert!(machine.tick().await.is_none());
    assert_eq!(machine.state().name(), "Idle");

    // Same game 1000 after the restart
    discovery.set_port(50_001);
    probe.set_phase(ClientPhase::Reconnect);
    let mut captured = Vec::new();
    for _ in 0..3 {
      captured.extend(machine.tick().await);
    }
    assert_eq!(machine.state().name(), "Connected");
    probe.set_phase(ClientPhase::InProgress);
    captured.extend(machine.tick().await);
    probe.set_phase(ClientPhase::EndOfGame);
    captured.extend(machine.tick().await);
    captured.extend(machine.tick().await);

    assert!(captured.is_empty());
    assert_eq!(probe.eog_calls(), 0);

    probe.set_game_id(1_002);
    probe.set_phase(ClientPhase::InProgress);
    machine.tick().await;
    probe.set_phase(ClientPhase::EndOfGame);
    let next = machine.tick().await;
    assert_eq!(next.map(|m| m.external_game_id).as_deref(), Some("1002"));
  }

  #[tokio::test]
  async fn test_game_lost_while_waiting_for_stats_is_not_captured_later() {
    let (mut machine, _discovery, probe) = running_machine();
    machine.tick().await;
    probe.set_phase(ClientPhase::InProgress);
    machine.tick().await;
    probe.set_stats_ready(false);
    probe.set_phase(ClientPhase::EndOfGame);
    machine.tick().await;
    assert_eq!(machine.state().name(), "CaptureReady");

    probe.set(Step::Unreachable);
    machine.tick().await;
    assert_eq!(machine.state().name(), "Idle");

    probe.set_stats_ready(true);
    probe.set_phase(ClientPhase::InProgress);
    for _ in 0..2 {
      assert!(machine.tick().await.is_none());
    }
    probe.set_phase(ClientPhase::EndOfGame);
    assert!(machine.tick().await.is_none());
    assert!(machine.tick().await.is_none());
  }
}
