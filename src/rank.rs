// Ranked ladder ordering and promotion/demotion detection

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::MilestoneType;

static TIER_WEIGHTS: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
  HashMap::from([
    ("iron", 1),
    ("bronze", 2),
    ("silver", 3),
    ("gold", 4),
    ("platinum", 5),
    ("emerald", 6),
    ("diamond", 7),
    ("master", 8),
    ("grandmaster", 9),
    ("challenger", 10),
  ])
});

// Master and above have no divisions
const APEX_MIN_WEIGHT: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankChange {
  None,
  Promotion,
  Demotion,
}

impl RankChange {
  pub fn milestone_type(self) -> Option<MilestoneType> {
    match self {
      Self::None => None,
      Self::Promotion => Some(MilestoneType::Promotion),
      Self::Demotion => Some(MilestoneType::Demotion),
    }
  }
}

pub fn tier_weight(tier: &str) -> i32 {
  TIER_WEIGHTS
    .get(tier.trim().to_ascii_lowercase().as_str())
    .copied()
    .unwrap_or(0)
}

pub fn is_apex_tier(tier: &str) -> bool {
  tier_weight(tier) >= APEX_MIN_WEIGHT
}

/// Single integer that orders every (tier, division) pair on the ladder.
pub fn rank_value(tier: &str, division: u8) -> i32 {
  let weight = tier_weight(tier);
  if weight >= APEX_MIN_WEIGHT {
    return weight * 10;
  }
  weight * 10 + (4 - i32::from(division))
}

/// Compare two consecutive readings. `prev` is `None` for a profile's first match.
pub fn classify(prev: Option<(&str, u8)>, next: (&str, u8)) -> RankChange {
  let Some((prev_tier, prev_division)) = prev else {
    return RankChange::None;
  };
  let before = rank_value(prev_tier, prev_division);
  let after = rank_value(next.0, next.1);
  if after == before {
    RankChange::None
  } else if after > before {
    RankChange::Promotion
  } else {
    RankChange::Demotion
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const LADDER: &[&str] = &[
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

  fn ladder_positions() -> Vec<(&'static str, u8)> {
    let mut out = Vec::new();
    for tier in LADDER {
      if is_apex_tier(tier) {
        out.push((*tier, 4));
      } else {
        for division in (1..=4).rev() {
          out.push((*tier, division));
        }
      }
    }
    out
  }

  #[test]
  fn rank_value_strictly_increases_up_the_ladder() {
    let values: Vec<i32> = ladder_positions()
      .iter()
      .map(|(tier, division)| rank_value(tier, *division))
      .collect();
    for pair in values.windows(2) {
      assert!(pair[0] < pair[1], "{:?}", values);
    }
  }

  #[test]
  fn apex_tiers_ignore_division() {
    for tier in ["Master", "Grandmaster", "Challenger"] {
      let base = rank_value(tier, 1);
      for division in 2..=4 {
        assert_eq!(rank_value(tier, division), base);
      }
    }
    assert!(rank_value("Master", 4) > rank_value("Diamond", 1));
    assert!(rank_value("Grandmaster", 4) > rank_value("Master", 1));
  }

  #[test]
  fn known_values() {
    assert_eq!(rank_value("Gold", 3), 41);
    assert_eq!(rank_value("GOLD", 2), 42);
    assert_eq!(rank_value("Diamond", 1), 73);
    assert_eq!(rank_value("Master", 1), 80);
    assert_eq!(rank_value("Challenger", 4), 100);
    assert_eq!(rank_value("Unranked", 4), 0);
    assert_eq!(tier_weight("wood"), 0);
  }

  #[test]
  fn classify_examples() {
    assert_eq!(
      classify(Some(("Gold", 3)), ("Gold", 2)),
      RankChange::Promotion
    );
    assert_eq!(
      classify(Some(("Platinum", 4)), ("Gold", 1)),
      RankChange::Demotion
    );
    assert_eq!(
      classify(Some(("Challenger", 4)), ("Challenger", 4)),
      RankChange::None
    );
    assert_eq!(classify(None, ("Gold", 1)), RankChange::None);
  }

  #[test]
  fn classify_is_none_when_values_match() {
    // Apex divisions differ but carry no rank meaning
    assert_eq!(
      classify(Some(("Master", 1)), ("master", 4)),
      RankChange::None
    );
    assert_eq!(classify(Some(("gold", 2)), ("Gold", 2)), RankChange::None);
  }

  #[test]
  fn milestone_types() {
    assert_eq!(RankChange::None.milestone_type(), None);
    assert_eq!(
      RankChange::Promotion.milestone_type(),
      Some(MilestoneType::Promotion)
    );
    assert_eq!(
      RankChange::Demotion.milestone_type(),
      Some(MilestoneType::Demotion)
    );
  }
}
