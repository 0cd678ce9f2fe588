// Tests for promotion/demotion milestones created after acknowledged matches

use super::super::pipeline::Ack;
use super::test_helpers::*;
use crate::milestone::RecordOutcome;
use crate::types::{MilestoneType, RankSnapshot};

#[cfg(test)]
mod milestone_tests {
  use super::*;

  /// Scenario: Gold III then Gold II on the solo ladder.
  /// Expected: one Promotion milestone linked to the second match.
  #[tokio::test]
  async fn test_division_up_records_promotion_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    h.pipeline.submit(ranked_match("1", "Gold", 3, 10)).await.unwrap();
    assert!(h.milestones.created().is_empty());

    let ack = h.pipeline.submit(ranked_match("2", "Gold", 2, 11)).await.unwrap();
    let Ack::Submitted { match_id } = ack else {
      panic!("expected a submission, got {:?}", ack);
    };

    let created = h.milestones.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].milestone_type, MilestoneType::Promotion);
    assert_eq!(created[0].tier, "Gold");
    assert_eq!(created[0].division, 2);
    assert_eq!(created[0].match_id, match_id);
    assert_eq!(created[0].profile_id, 7);
  }

  /// Scenario: the promoting match is replayed.
  /// Expected: no second milestone, neither through the pipeline nor directly.
  #[tokio::test]
  async fn test_replay_creates_no_duplicate_milestone() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());
    let promoting = ranked_match("2", "Gold", 2, 11);

    h.pipeline.submit(ranked_match("1", "Gold", 3, 10)).await.unwrap();
    let Ack::Submitted { match_id } = h.pipeline.submit(promoting.clone()).await.unwrap() else {
      panic!("expected a submission");
    };
    assert_eq!(h.pipeline.submit(promoting.clone()).await, Ok(Ack::AlreadySynced));

    let previous = RankSnapshot::from_match(1, &ranked_match("1", "Gold", 3, 10));
    let outcome = h
      .recorder
      .record_if_changed(7, &promoting, match_id, Some(&previous))
      .await;
    assert_eq!(outcome, RecordOutcome::Duplicate);
    assert_eq!(h.milestones.created().len(), 1);
  }

  #[tokio::test]
  async fn test_tier_down_records_demotion() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    h.pipeline.submit(ranked_match("1", "Platinum", 4, 10)).await.unwrap();
    h.pipeline.submit(ranked_match("2", "Gold", 1, 11)).await.unwrap();

    let created = h.milestones.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].milestone_type, MilestoneType::Demotion);
    assert_eq!(created[0].tier, "Gold");
    assert_eq!(created[0].division, 1);
  }

  #[tokio::test]
  async fn test_apex_tier_without_change_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    h.pipeline.submit(ranked_match("1", "Challenger", 0, 10)).await.unwrap();
    // Apex divisions are meaningless; LP moves do not count either
    h.pipeline.submit(ranked_match("2", "Challenger", 1, 11)).await.unwrap();

    assert!(h.milestones.created().is_empty());
  }

  #[tokio::test]
  async fn test_flex_and_solo_ladders_are_compared_separately() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    h.pipeline.submit(ranked_match("1", "Gold", 3, 10)).await.unwrap();
    let mut flex = ranked_match("2", "Silver", 1, 11);
    flex.queue_id = 440;
    h.pipeline.submit(flex).await.unwrap();

    assert!(h.milestones.created().is_empty());
  }

  /// Scenario: the milestone endpoint is down when the rank changes.
  /// Expected: the milestone is deferred and delivered by the next flush.
  #[tokio::test]
  async fn test_deferred_milestone_delivered_on_flush() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness_in(
      dir.path(),
      MockMatchApi::scripted(&[]),
      MockMilestoneApi::scripted(&[Reply::Status(503)]),
      MockTokens::new(true),
    );

    h.pipeline.submit(ranked_match("1", "Gold", 3, 10)).await.unwrap();
    h.pipeline.submit(ranked_match("2", "Gold", 2, 11)).await.unwrap();
    assert!(h.milestones.created().is_empty());
    assert_eq!(h.recorder.snapshot().await.pending.len(), 1);

    h.pipeline.flush_pending().await;
    assert_eq!(h.milestones.created().len(), 1);
    let state = h.recorder.snapshot().await;
    assert!(state.pending.is_empty());
    assert_eq!(state.recorded.len(), 1);
  }

  #[tokio::test]
  async fn test_rejected_milestone_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness_in(
      dir.path(),
      MockMatchApi::scripted(&[]),
      MockMilestoneApi::scripted(&[Reply::Status(400)]),
      MockTokens::new(true),
    );

    h.pipeline.submit(ranked_match("1", "Gold", 3, 10)).await.unwrap();
    h.pipeline.submit(ranked_match("2", "Gold", 2, 11)).await.unwrap();
    h.pipeline.flush_pending().await;

    assert!(h.milestones.created().is_empty());
    assert!(h.recorder.snapshot().await.pending.is_empty());
  }

  #[tokio::test]
  async fn test_older_replay_gets_no_milestone() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path());

    h.pipeline.submit(ranked_match("2", "Gold", 2, 11)).await.unwrap();
    // A game played earlier but delivered later
    h.pipeline.submit(ranked_match("1", "Gold", 4, 10)).await.unwrap();

    assert!(h.milestones.created().is_empty());
  }
}
