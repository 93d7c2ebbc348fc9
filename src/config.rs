//! Game configuration: level table, feedback delays and reward settings.
//!
//! Loaded once at startup from `GAME_CONFIG_PATH` (TOML) and an optional
//! `GAME_PRESET`, validated, then shared read-only as `Arc<GameConfig>`.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::Level;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
  #[serde(default = "default_levels")]
  pub levels: Vec<Level>,
  #[serde(default)]
  pub game: GameSettings,
  #[serde(default)]
  pub rewards: RewardSettings,
}

impl Default for GameConfig {
  fn default() -> Self {
    Self { levels: default_levels(), game: GameSettings::default(), rewards: RewardSettings::default() }
  }
}

/// Feedback delays in milliseconds, plus client-side toggles passed through untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
  pub correct_answer_delay_ms: u64,
  pub incorrect_answer_delay_ms: u64,
  pub level_up_delay_ms: u64,
  pub sound_enabled: bool,
  pub animations_enabled: bool,
}

impl Default for GameSettings {
  fn default() -> Self {
    Self {
      correct_answer_delay_ms: 1500,
      incorrect_answer_delay_ms: 2000,
      level_up_delay_ms: 3000,
      sound_enabled: true,
      animations_enabled: true,
    }
  }
}

impl GameSettings {
  pub fn correct_delay(&self) -> Duration { Duration::from_millis(self.correct_answer_delay_ms) }
  pub fn incorrect_delay(&self) -> Duration { Duration::from_millis(self.incorrect_answer_delay_ms) }
  pub fn level_up_delay(&self) -> Duration { Duration::from_millis(self.level_up_delay_ms) }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSettings {
  pub coin_name: String,
  pub coin_emoji: String,
  /// Applied on every 5th consecutive correct answer.
  pub streak_multiplier: f64,
  /// Carried for clients; no scoring rule reads it.
  pub perfection_bonus: u64,
  pub minimum_withdrawal: u64,
  /// Currency per point.
  pub conversion_rate: f64,
}

impl Default for RewardSettings {
  fn default() -> Self {
    Self {
      coin_name: "NinjaCoins".into(),
      coin_emoji: "🪙".into(),
      streak_multiplier: 1.5,
      perfection_bonus: 100,
      minimum_withdrawal: 50,
      conversion_rate: 0.1,
    }
  }
}

fn level(
  id: u32, name: &str, emoji: &str, description: &str,
  min_range: u32, max_range: u32, points_per_correct: u32, required_score: u64, color: &str,
) -> Level {
  Level {
    id,
    name: name.into(),
    emoji: emoji.into(),
    description: description.into(),
    min_range,
    max_range,
    points_per_correct,
    required_score,
    color: color.into(),
  }
}

pub fn default_levels() -> Vec<Level> {
  vec![
    level(1, "Beginner", "🐣", "Super easy sums to get started", 1, 10, 5, 0, "from-green-400 to-green-600"),
    level(2, "Explorer", "🔍", "A little more challenge", 5, 20, 10, 50, "from-blue-400 to-blue-600"),
    level(3, "Adventurer", "⚡", "Now it gets interesting!", 10, 50, 15, 150, "from-purple-400 to-purple-600"),
    level(4, "Warrior", "⚔️", "For brave ninjas", 20, 100, 20, 300, "from-orange-400 to-orange-600"),
    level(5, "Master", "🥷", "The level of true ninjas!", 50, 200, 30, 500, "from-red-400 to-red-600"),
    level(6, "Legend", "👑", "Only for the greatest masters!", 100, 500, 50, 800, "from-yellow-400 to-yellow-600"),
  ]
}

/// Level-table problems caught at load time. Nothing re-checks these per round.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
  #[error("level table is empty")]
  EmptyLevels,
  #[error("level {0}: id must be > 0")]
  ZeroId(usize),
  #[error("duplicate level id {0}")]
  DuplicateId(u32),
  #[error("level {0}: name must not be blank")]
  BlankName(u32),
  #[error("level {id}: max_range {max} must exceed min_range {min}")]
  BadRange { id: u32, min: u32, max: u32 },
  #[error("level {0}: points_per_correct must be > 0")]
  ZeroPoints(u32),
  #[error("level {id}: required_score {required} is below the previous level's {previous}")]
  DecreasingScore { id: u32, required: u64, previous: u64 },
  #[error("reward rate {0} must be finite and >= 0")]
  BadRate(f64),
}

impl GameConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.levels.is_empty() {
      return Err(ConfigError::EmptyLevels);
    }
    let mut seen = HashSet::new();
    let mut previous = 0u64;
    for (idx, l) in self.levels.iter().enumerate() {
      if l.id == 0 { return Err(ConfigError::ZeroId(idx)); }
      if !seen.insert(l.id) { return Err(ConfigError::DuplicateId(l.id)); }
      if l.name.trim().is_empty() { return Err(ConfigError::BlankName(l.id)); }
      if l.max_range <= l.min_range {
        return Err(ConfigError::BadRange { id: l.id, min: l.min_range, max: l.max_range });
      }
      if l.points_per_correct == 0 { return Err(ConfigError::ZeroPoints(l.id)); }
      if l.required_score < previous {
        return Err(ConfigError::DecreasingScore { id: l.id, required: l.required_score, previous });
      }
      previous = l.required_score;
    }
    for rate in [self.rewards.streak_multiplier, self.rewards.conversion_rate] {
      if !rate.is_finite() || rate < 0.0 {
        return Err(ConfigError::BadRate(rate));
      }
    }
    Ok(())
  }

  /// First entry of the table; the level a fresh or reset game starts on.
  /// `validate` guarantees the table is non-empty.
  pub fn first_level(&self) -> &Level {
    &self.levels[0]
  }
}

/// Ready-made tunings for different ages/skills.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
  Beginner,
  Intermediate,
  Advanced,
  Challenge,
}

impl Preset {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "beginner" => Some(Self::Beginner),
      "intermediate" => Some(Self::Intermediate),
      "advanced" => Some(Self::Advanced),
      "challenge" => Some(Self::Challenge),
      _ => None,
    }
  }

  pub fn apply(self, mut cfg: GameConfig) -> GameConfig {
    match self {
      Preset::Beginner => {
        for l in &mut cfg.levels {
          l.max_range = l.max_range.min(20);
          // keep the range non-empty once the cap bites
          l.min_range = l.min_range.min(l.max_range.saturating_sub(1));
          l.points_per_correct = l.points_per_correct.saturating_mul(2);
        }
      }
      Preset::Intermediate => {
        for l in &mut cfg.levels {
          l.required_score = (l.required_score as f64 * 0.8).floor() as u64;
        }
      }
      Preset::Advanced => {}
      Preset::Challenge => {
        for l in &mut cfg.levels {
          l.max_range = l.max_range.saturating_mul(2);
          l.points_per_correct = (l.points_per_correct as f64 * 1.5).floor() as u32;
          l.required_score = l.required_score.saturating_mul(2);
        }
        cfg.game.correct_answer_delay_ms = 1000;
        cfg.game.incorrect_answer_delay_ms = 1500;
      }
    }
    cfg
  }
}

fn read_config_file(path: &str) -> Option<GameConfig> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<GameConfig>(&s) {
      Ok(cfg) => {
        info!(target: "numberninja", %path, levels = cfg.levels.len(), "Loaded game config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "numberninja", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "numberninja", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Build the config from GAME_CONFIG_PATH / GAME_PRESET. Any read, parse or
/// validation failure falls back to the built-in table.
pub fn load_game_config_from_env() -> GameConfig {
  let mut cfg = std::env::var("GAME_CONFIG_PATH")
    .ok()
    .and_then(|path| read_config_file(&path))
    .unwrap_or_default();

  if let Ok(raw) = std::env::var("GAME_PRESET") {
    match Preset::parse(&raw) {
      Some(preset) => {
        cfg = preset.apply(cfg);
        info!(target: "numberninja", ?preset, "Applied game preset");
      }
      None => warn!(target: "numberninja", preset = %raw, "Unknown GAME_PRESET; ignoring"),
    }
  }

  match cfg.validate() {
    Ok(()) => cfg,
    Err(e) => {
      error!(target: "numberninja", error = %e, "Invalid game config; using built-in defaults");
      GameConfig::default()
    }
  }
}
