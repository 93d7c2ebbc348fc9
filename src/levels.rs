//! Level resolution over the configured table.
//!
//! The table is expected to be ordered by `required_score` (checked once at
//! config load). Lookups here still scan the whole table and never re-sort.

use crate::domain::Level;

/// Every level the score has unlocked, in table order.
pub fn available_levels(score: u64, levels: &[Level]) -> Vec<Level> {
  levels.iter().filter(|l| l.required_score <= score).cloned().collect()
}

/// Nearest tier above `current` that `score` has unlocked. Equal thresholds
/// resolve to the first one in table order.
pub fn next_level<'a>(current: &Level, score: u64, levels: &'a [Level]) -> Option<&'a Level> {
  levels
    .iter()
    .filter(|l| l.required_score > current.required_score && l.required_score <= score)
    .min_by_key(|l| l.required_score)
}

pub fn find_level(id: u32, levels: &[Level]) -> Option<&Level> {
  levels.iter().find(|l| l.id == id)
}

/// Percent of the way from `current` to the next tier, clamped to [0, 100].
/// 100 when `current` is the top tier.
pub fn level_progress(current: &Level, score: u64, levels: &[Level]) -> f64 {
  let above = levels.iter().filter(|l| l.required_score > current.required_score);
  let Some(next) = above.min_by_key(|l| l.required_score) else {
    return 100.0;
  };
  let span = (next.required_score - current.required_score) as f64;
  let done = score as f64 - current.required_score as f64;
  (done / span * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::default_levels;

  fn tiers(reqs: &[u64]) -> Vec<Level> {
    let base = default_levels().remove(0);
    reqs
      .iter()
      .enumerate()
      .map(|(i, r)| Level { id: i as u32 + 1, required_score: *r, ..base.clone() })
      .collect()
  }

  #[test]
  fn next_level_picks_nearest_unlocked_tier() {
    let levels = tiers(&[0, 50, 150]);
    assert_eq!(next_level(&levels[0], 60, &levels).map(|l| l.id), Some(2));
    assert_eq!(next_level(&levels[0], 40, &levels), None);
    assert_eq!(next_level(&levels[0], 200, &levels).map(|l| l.id), Some(2));
    assert_eq!(next_level(&levels[1], 200, &levels).map(|l| l.id), Some(3));
    assert_eq!(next_level(&levels[2], 10_000, &levels), None);
  }

  #[test]
  fn next_level_searches_unsorted_tables() {
    let levels = tiers(&[0, 150, 50]);
    assert_eq!(next_level(&levels[0], 200, &levels).map(|l| l.id), Some(3));
    assert_eq!(next_level(&levels[0], 60, &levels).map(|l| l.id), Some(3));
    assert_eq!(level_progress(&levels[0], 25, &levels), 50.0);

    let tied = tiers(&[0, 50, 50]);
    assert_eq!(next_level(&tied[0], 60, &tied).map(|l| l.id), Some(2));
  }

  #[test]
  fn available_levels_keeps_table_order() {
    let levels = tiers(&[0, 50, 150]);
    let ids: Vec<u32> = available_levels(50, &levels).iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(available_levels(0, &levels).len(), 1);
  }

  #[test]
  fn progress_is_clamped_and_full_at_top() {
    let levels = tiers(&[0, 50, 150]);
    assert_eq!(level_progress(&levels[0], 25, &levels), 50.0);
    assert_eq!(level_progress(&levels[0], 80, &levels), 100.0);
    assert_eq!(level_progress(&levels[1], 10, &levels), 0.0);
    assert_eq!(level_progress(&levels[2], 0, &levels), 100.0);
  }

  #[test]
  fn find_level_by_id() {
    let levels = default_levels();
    assert_eq!(find_level(3, &levels).map(|l| l.name.as_str()), Some("Adventurer"));
    assert!(find_level(99, &levels).is_none());
  }
}
