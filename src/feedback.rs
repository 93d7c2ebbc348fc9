//! Feedback messages. One template is picked at random from a fixed pool per
//! outcome; repeats are allowed.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::Level;
use crate::util::fill_template;

const SUCCESS_BONUS: &[&str] = &[
  "Amazing! +{points} points (streak bonus!) 🎉",
  "What a streak! +{points} points 🔥",
  "Unstoppable! +{points} points ⚡",
];

const SUCCESS: &[&str] = &[
  "Excellent! +{points} points 🎉",
  "Well done! +{points} points ⭐",
  "Correct! +{points} points 👏",
];

const ERROR: &[&str] = &[
  "Oops! The right answer is {answer} 🤔",
  "So close! It was {answer} 💭",
  "Try again! The answer is {answer} 🔄",
];

const LEVEL_UP: &[&str] = &[
  "🎉 LEVEL UP! You are now {emoji} {name}!",
  "🚀 New level unlocked: {emoji} {name}!",
];

#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
  SuccessWithBonus { points: u32 },
  Success { points: u32 },
  Error { correct_answer: i64 },
  LevelUp { level: &'a Level },
}

pub fn select_feedback<R: Rng + ?Sized>(outcome: Outcome<'_>, rng: &mut R) -> String {
  let pool = match outcome {
    Outcome::SuccessWithBonus { .. } => SUCCESS_BONUS,
    Outcome::Success { .. } => SUCCESS,
    Outcome::Error { .. } => ERROR,
    Outcome::LevelUp { .. } => LEVEL_UP,
  };
  let tpl = pool.choose(rng).copied().unwrap_or(pool[0]);
  match outcome {
    Outcome::SuccessWithBonus { points } | Outcome::Success { points } => {
      fill_template(tpl, &[("points", &points.to_string())])
    }
    Outcome::Error { correct_answer } => fill_template(tpl, &[("answer", &correct_answer.to_string())]),
    Outcome::LevelUp { level } => fill_template(tpl, &[("emoji", &level.emoji), ("name", &level.name)]),
  }
}
