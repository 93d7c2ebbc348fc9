//! Game state machine.
//!
//! One `GameMachine` owns one session's `GameState` and is the only writer.
//! Callers feed it `GameEvent`s through `dispatch`; every change is published on
//! a `tokio::sync::watch` channel for the presentation layer.
//!
//! Delayed transitions (post-success, post-error, post-level-up) are handed back
//! as `ScheduledTimer`s. The caller sleeps and dispatches `GameEvent::TimerFired`
//! with the token. Tokens carry the generation they were issued for; start,
//! level changes, reset and every new verdict bump the generation, so a token
//! from a superseded problem is ignored when it fires.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::GameConfig;
use crate::domain::{Level, Problem, SessionStats};
use crate::feedback::{select_feedback, Outcome};
use crate::levels::{available_levels, find_level, level_progress, next_level};
use crate::problem::{generate_problem, validate_answer};
use crate::scoring::{compute_points, points_to_currency};

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    AwaitingInput,
    /// Verdict shown, waiting for its timer.
    Evaluating,
    LevelingUp,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
    Unknown,
    Correct,
    Incorrect,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct GameState {
    pub phase: Phase,
    pub problem: Option<Problem>,
    pub user_answer: String,
    pub score: u64,
    pub streak: u32,
    pub coins: u64,
    pub level: Level,
    pub feedback: String,
    pub correctness: Correctness,
    pub show_level_selector: bool,
    pub game_started: bool,
}

impl GameState {
    fn initial(level: Level) -> Self {
        Self {
            phase: Phase::NotStarted,
            problem: None,
            user_answer: String::new(),
            score: 0,
            streak: 0,
            coins: 0,
            level,
            feedback: String::new(),
            correctness: Correctness::Unknown,
            show_level_selector: false,
            game_started: false,
        }
    }

    /// Non-empty input, a live problem, and no verdict pending.
    pub fn can_submit(&self) -> bool {
        self.game_started
            && self.problem.is_some()
            && self.correctness == Correctness::Unknown
            && !self.user_answer.trim().is_empty()
    }

    pub fn available_levels(&self, levels: &[Level]) -> Vec<Level> {
        available_levels(self.score, levels)
    }

    pub fn next_level<'a>(&self, levels: &'a [Level]) -> Option<&'a Level> {
        next_level(&self.level, self.score, levels)
    }

    pub fn level_progress(&self, levels: &[Level]) -> f64 {
        level_progress(&self.level, self.score, levels)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("unknown level id {0}")]
    UnknownLevel(u32),
}

#[derive(Clone, Debug)]
pub enum GameEvent {
    Start,
    Input(String),
    Submit,
    ChangeLevel(u32),
    ToggleLevelSelector,
    Reset,
    TimerFired(TimerToken),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    AfterSuccess,
    AfterError,
    AfterLevelUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerToken {
    generation: u64,
    pub kind: TimerKind,
}

#[derive(Clone, Copy, Debug)]
pub struct ScheduledTimer {
    pub token: TimerToken,
    pub delay: Duration,
}

/// Result of one `dispatch`: the state after the event and, when the event
/// produced a verdict, the timer the caller must arm.
#[derive(Clone, Debug)]
pub struct Dispatched {
    pub state: GameState,
    pub timer: Option<ScheduledTimer>,
}

#[derive(Debug, Default)]
struct Tally {
    started_at: Option<Instant>,
    answerable_since: Option<Instant>,
    attempted: u64,
    correct: u64,
    wrong: u64,
    best_streak: u32,
    response_total: Duration,
}

pub struct GameMachine {
    config: Arc<GameConfig>,
    state: GameState,
    generation: u64,
    tally: Tally,
    rng: StdRng,
    tx: watch::Sender<GameState>,
}

impl GameMachine {
    pub fn new(config: Arc<GameConfig>) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: Arc<GameConfig>, rng: StdRng) -> Self {
        let state = GameState::initial(config.first_level().clone());
        let (tx, _rx) = watch::channel(state.clone());
        Self { config, state, generation: 0, tally: Tally::default(), rng, tx }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Receiver that sees every state published after this call.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.tx.subscribe()
    }

    /// Snapshot for the session record. Currency is derived from the score.
    pub fn session_stats(&self) -> SessionStats {
        let responses = self.tally.attempted.max(1) as u128;
        SessionStats {
            problems_attempted: self.tally.attempted,
            correct_answers: self.tally.correct,
            wrong_answers: self.tally.wrong,
            best_streak: self.tally.best_streak,
            total_score: self.state.score,
            currency_earned: self.state.coins,
            time_spent_secs: self.tally.started_at.map(|t| t.elapsed().as_secs()).unwrap_or(0),
            average_response_ms: (self.tally.response_total.as_millis() / responses) as u64,
        }
    }

    #[instrument(level = "debug", target = "game", skip(self), fields(generation = self.generation))]
    pub fn dispatch(&mut self, event: GameEvent) -> Result<Dispatched, GameError> {
        let timer = match event {
            GameEvent::Start => {
                self.start();
                None
            }
            GameEvent::Input(text) => {
                self.state.user_answer = text;
                None
            }
            GameEvent::Submit => self.submit(),
            GameEvent::ChangeLevel(id) => {
                self.change_level(id)?;
                None
            }
            GameEvent::ToggleLevelSelector => {
                self.state.show_level_selector = !self.state.show_level_selector;
                None
            }
            GameEvent::Reset => {
                self.reset();
                None
            }
            GameEvent::TimerFired(token) => {
                self.timer_fired(token);
                None
            }
        };
        self.tx.send_replace(self.state.clone());
        Ok(Dispatched { state: self.state.clone(), timer })
    }

    fn supersede(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn present_new_problem(&mut self) {
        self.state.problem = Some(generate_problem(&self.state.level, &mut self.rng));
        self.state.user_answer.clear();
        self.state.feedback.clear();
        self.state.correctness = Correctness::Unknown;
        self.state.phase = Phase::AwaitingInput;
        self.tally.answerable_since = Some(Instant::now());
    }

    fn start(&mut self) {
        if self.state.game_started {
            debug!(target: "game", "start ignored: already in progress");
            return;
        }
        self.supersede();
        self.state.game_started = true;
        self.tally = Tally { started_at: Some(Instant::now()), ..Tally::default() };
        self.present_new_problem();
        info!(target: "game", level = self.state.level.id, "game started");
    }

    fn change_level(&mut self, id: u32) -> Result<(), GameError> {
        let level = find_level(id, &self.config.levels).cloned().ok_or(GameError::UnknownLevel(id))?;
        self.supersede();
        self.state.level = level;
        self.state.show_level_selector = false;
        self.state.user_answer.clear();
        self.state.feedback.clear();
        self.state.correctness = Correctness::Unknown;
        if self.state.game_started {
            self.present_new_problem();
        }
        info!(target: "game", level = id, started = self.state.game_started, "level changed");
        Ok(())
    }

    fn reset(&mut self) {
        self.supersede();
        self.state = GameState::initial(self.config.first_level().clone());
        self.tally = Tally::default();
        info!(target: "game", "game reset");
    }

    fn submit(&mut self) -> Option<ScheduledTimer> {
        if !self.state.can_submit() {
            debug!(target: "game", "submit ignored: not submittable");
            return None;
        }
        let problem = self.state.problem?;
        let generation = self.supersede();

        self.tally.attempted += 1;
        if let Some(since) = self.tally.answerable_since.take() {
            self.tally.response_total += since.elapsed();
        }

        if !validate_answer(&self.state.user_answer, problem.correct_answer) {
            self.tally.wrong += 1;
            self.state.streak = 0;
            self.state.correctness = Correctness::Incorrect;
            self.state.phase = Phase::Evaluating;
            self.state.feedback =
                select_feedback(Outcome::Error { correct_answer: problem.correct_answer }, &mut self.rng);
            debug!(target: "game", expected = problem.correct_answer, "wrong answer");
            return Some(ScheduledTimer {
                token: TimerToken { generation, kind: TimerKind::AfterError },
                delay: self.config.game.incorrect_delay(),
            });
        }

        // The bonus is judged on the streak this answer completes, so the 5th,
        // 10th, ... correct answer in a row is the one multiplied.
        let base = self.state.level.points_per_correct;
        let streak = self.state.streak + 1;
        let points = compute_points(base, streak, self.config.rewards.streak_multiplier);

        self.tally.correct += 1;
        self.tally.best_streak = self.tally.best_streak.max(streak);
        self.state.score += points as u64;
        self.state.streak = streak;
        self.state.coins = points_to_currency(self.state.score, self.config.rewards.conversion_rate);
        self.state.correctness = Correctness::Correct;
        debug!(target: "game", points, streak, score = self.state.score, "correct answer");

        if let Some(next) = next_level(&self.state.level, self.state.score, &self.config.levels).cloned() {
            info!(target: "game", from = self.state.level.id, to = next.id, score = self.state.score, "level up");
            self.state.feedback = select_feedback(Outcome::LevelUp { level: &next }, &mut self.rng);
            self.state.level = next;
            self.state.phase = Phase::LevelingUp;
            return Some(ScheduledTimer {
                token: TimerToken { generation, kind: TimerKind::AfterLevelUp },
                delay: self.config.game.level_up_delay(),
            });
        }

        let outcome = if points > base {
            Outcome::SuccessWithBonus { points }
        } else {
            Outcome::Success { points }
        };
        self.state.feedback = select_feedback(outcome, &mut self.rng);
        self.state.phase = Phase::Evaluating;
        Some(ScheduledTimer {
            token: TimerToken { generation, kind: TimerKind::AfterSuccess },
            delay: self.config.game.correct_delay(),
        })
    }

    fn timer_fired(&mut self, token: TimerToken) {
        if token.generation != self.generation {
            debug!(target: "game", token_generation = token.generation, kind = ?token.kind, "stale timer dropped");
            return;
        }
        match token.kind {
            TimerKind::AfterSuccess | TimerKind::AfterLevelUp => self.present_new_problem(),
            // The same problem stays up for another try.
            TimerKind::AfterError => {
                self.state.feedback.clear();
                self.state.correctness = Correctness::Unknown;
                self.state.phase = Phase::AwaitingInput;
                self.tally.answerable_since = Some(Instant::now());
            }
        }
    }
}
