//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::domain::{Level, PlayerProfile, Preferences, PreferencesPatch, WithdrawalRequest};
use crate::game::{Correctness, GameState, Phase};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    CreateProfile {
        name: String,
        #[serde(default)]
        preferences: Option<Preferences>,
    },
    LoadProfile {
        id: String,
    },
    LoadProfileByName {
        name: String,
    },
    UpdatePreferences {
        #[serde(flatten)]
        patch: PreferencesPatch,
    },
    Start,
    Input {
        text: String,
    },
    Submit,
    ChangeLevel {
        #[serde(rename = "levelId")]
        level_id: u32,
    },
    ToggleLevelSelector,
    Reset,
    RequestWithdrawal,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        game: GameView,
    },
    Profile {
        profile: PlayerProfile,
    },
    SessionStarted {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SessionEnded {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Withdrawal {
        request: WithdrawalRequest,
    },
    Error {
        message: String,
    },
}

/// Operands only; the answer stays on the server.
#[derive(Debug, Serialize)]
pub struct ProblemOut {
    pub operand1: u32,
    pub operand2: u32,
}

/// What the presentation layer renders. Derived fields are recomputed from
/// the state on every push.
#[derive(Debug, Serialize)]
pub struct GameView {
    pub phase: Phase,
    pub problem: Option<ProblemOut>,
    pub user_answer: String,
    pub score: u64,
    pub streak: u32,
    pub coins: u64,
    pub coin_name: String,
    pub coin_emoji: String,
    pub level: Level,
    pub feedback: String,
    pub correctness: Correctness,
    pub show_level_selector: bool,
    pub game_started: bool,
    pub available_levels: Vec<Level>,
    pub next_level: Option<Level>,
    pub level_progress: f64,
    pub can_submit: bool,
}

pub fn to_view(s: &GameState, cfg: &GameConfig) -> GameView {
    GameView {
        phase: s.phase,
        problem: s.problem.map(|p| ProblemOut { operand1: p.operand1, operand2: p.operand2 }),
        user_answer: s.user_answer.clone(),
        score: s.score,
        streak: s.streak,
        coins: s.coins,
        coin_name: cfg.rewards.coin_name.clone(),
        coin_emoji: cfg.rewards.coin_emoji.clone(),
        level: s.level.clone(),
        feedback: s.feedback.clone(),
        correctness: s.correctness,
        show_level_selector: s.show_level_selector,
        game_started: s.game_started,
        available_levels: s.available_levels(&cfg.levels),
        next_level: s.next_level(&cfg.levels).cloned(),
        level_progress: s.level_progress(&cfg.levels),
        can_submit: s.can_submit(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    #[serde(default)]
    pub score: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileIn {
    pub name: String,
    #[serde(default)]
    pub preferences: Option<Preferences>,
}
#[derive(Serialize)]
pub struct CreatedOut {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ByNameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}
