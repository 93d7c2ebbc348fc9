//! Domain models: levels and problems for the game core, plus the player and
//! session documents kept by the persistence collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A difficulty tier. Immutable once loaded; the ordered table lives in `GameConfig`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Level {
  pub id: u32,
  pub name: String,
  #[serde(default)] pub emoji: String,
  #[serde(default)] pub description: String,
  /// Inclusive operand bounds.
  pub min_range: u32,
  pub max_range: u32,
  pub points_per_correct: u32,
  pub required_score: u64,
  #[serde(default)] pub color: String,
}

/// One addition problem. Fresh every round, never mutated.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Problem {
  pub operand1: u32,
  pub operand2: u32,
  pub correct_answer: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
  pub sound_enabled: bool,
  pub animations_enabled: bool,
  pub preferred_difficulty: u32,
  pub theme: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parental_pin: Option<String>,
}

impl Default for Preferences {
  fn default() -> Self {
    Self {
      sound_enabled: true,
      animations_enabled: true,
      preferred_difficulty: 1,
      theme: "default".into(),
      parental_pin: None,
    }
  }
}

/// Partial preference update; `None` leaves the stored value alone.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PreferencesPatch {
  #[serde(default)] pub sound_enabled: Option<bool>,
  #[serde(default)] pub animations_enabled: Option<bool>,
  #[serde(default)] pub preferred_difficulty: Option<u32>,
  #[serde(default)] pub theme: Option<String>,
  #[serde(default)] pub parental_pin: Option<String>,
}

impl Preferences {
  pub fn apply(&mut self, patch: PreferencesPatch) {
    if let Some(v) = patch.sound_enabled { self.sound_enabled = v; }
    if let Some(v) = patch.animations_enabled { self.animations_enabled = v; }
    if let Some(v) = patch.preferred_difficulty { self.preferred_difficulty = v; }
    if let Some(v) = patch.theme { self.theme = v; }
    if patch.parental_pin.is_some() { self.parental_pin = patch.parental_pin; }
  }
}

/// Lifetime counters for one player.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayerProgress {
  pub total_problems: u64,
  pub correct_answers: u64,
  pub wrong_answers: u64,
  pub best_streak: u32,
  pub total_coins: u64,
  pub total_withdrawn: u64,
  pub time_spent_secs: u64,
  pub last_played: DateTime<Utc>,
}

impl Default for PlayerProgress {
  fn default() -> Self {
    Self {
      total_problems: 0,
      correct_answers: 0,
      wrong_answers: 0,
      best_streak: 0,
      total_coins: 0,
      total_withdrawn: 0,
      time_spent_secs: 0,
      last_played: Utc::now(),
    }
  }
}

/// Partial progress update; `None` leaves the stored counter alone.
/// `last_played` is always stamped by the store.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ProgressPatch {
  #[serde(default)] pub total_problems: Option<u64>,
  #[serde(default)] pub correct_answers: Option<u64>,
  #[serde(default)] pub wrong_answers: Option<u64>,
  #[serde(default)] pub best_streak: Option<u32>,
  #[serde(default)] pub total_coins: Option<u64>,
  #[serde(default)] pub total_withdrawn: Option<u64>,
  #[serde(default)] pub time_spent_secs: Option<u64>,
}

impl PlayerProgress {
  pub fn apply(&mut self, patch: &ProgressPatch) {
    if let Some(v) = patch.total_problems { self.total_problems = v; }
    if let Some(v) = patch.correct_answers { self.correct_answers = v; }
    if let Some(v) = patch.wrong_answers { self.wrong_answers = v; }
    if let Some(v) = patch.best_streak { self.best_streak = v; }
    if let Some(v) = patch.total_coins { self.total_coins = v; }
    if let Some(v) = patch.total_withdrawn { self.total_withdrawn = v; }
    if let Some(v) = patch.time_spent_secs { self.time_spent_secs = v; }
    self.last_played = Utc::now();
  }

  /// Folds a finished session into the lifetime counters and returns the
  /// full patch to hand to the store.
  pub fn absorb(&self, stats: &SessionStats) -> ProgressPatch {
    ProgressPatch {
      total_problems: Some(self.total_problems + stats.problems_attempted),
      correct_answers: Some(self.correct_answers + stats.correct_answers),
      wrong_answers: Some(self.wrong_answers + stats.wrong_answers),
      best_streak: Some(self.best_streak.max(stats.best_streak)),
      total_coins: Some(self.total_coins + stats.currency_earned),
      total_withdrawn: None,
      time_spent_secs: Some(self.time_spent_secs + stats.time_spent_secs),
    }
  }

  /// Lifetime currency that has not been requested for withdrawal yet.
  pub fn withdrawable_balance(&self) -> u64 {
    self.total_coins.saturating_sub(self.total_withdrawn)
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlayerProfile {
  pub id: String,
  pub name: String,
  pub preferences: Preferences,
  pub progress: PlayerProgress,
  pub created_at: DateTime<Utc>,
  pub last_login_at: DateTime<Utc>,
}

/// Snapshot handed to `end_session`, mirroring the live session at its end.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionStats {
  pub problems_attempted: u64,
  pub correct_answers: u64,
  pub wrong_answers: u64,
  pub best_streak: u32,
  pub total_score: u64,
  pub currency_earned: u64,
  pub time_spent_secs: u64,
  pub average_response_ms: u64,
}

/// One row per play session. Finalized once by `end_session`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
  pub id: String,
  pub profile_id: String,
  pub level_id: u32,
  pub start_time: DateTime<Utc>,
  #[serde(default)] pub end_time: Option<DateTime<Utc>>,
  #[serde(default)] pub stats: SessionStats,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
  Pending,
}

/// A payout request. Recorded as data only; nothing settles it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WithdrawalRequest {
  pub id: String,
  pub profile_id: String,
  pub amount: u64,
  pub status: WithdrawalStatus,
  pub requested_at: DateTime<Utc>,
}
