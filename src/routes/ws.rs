//! WebSocket upgrade + per-connection game loop.
//!
//! Each socket owns one `GameMachine`. The loop multiplexes four sources:
//! client messages, fired feedback timers, state changes from the machine's
//! watch channel (pushed as `state` messages), and persistence notices.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::domain::PlayerProfile;
use crate::game::{GameEvent, GameMachine, GameState, TimerToken};
use crate::protocol::{to_view, ClientWsMessage, ServerWsMessage};
use crate::session::{request_withdrawal, Notice, SessionRecorder};
use crate::state::AppState;
use crate::util::trunc_for_log;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "numberninja", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Receivers the socket loop selects over.
struct Channels {
  timers: mpsc::UnboundedReceiver<TimerToken>,
  notices: mpsc::UnboundedReceiver<Notice>,
  views: watch::Receiver<GameState>,
}

struct Connection {
  app: Arc<AppState>,
  game: GameMachine,
  recorder: SessionRecorder,
  profile: Option<PlayerProfile>,
  timers: mpsc::UnboundedSender<TimerToken>,
}

impl Connection {
  fn new(app: Arc<AppState>) -> (Self, Channels) {
    let game = GameMachine::new(app.config.clone());
    let views = game.subscribe();
    let (timer_tx, timers) = mpsc::unbounded_channel();
    let (notice_tx, notices) = mpsc::unbounded_channel();
    let recorder = SessionRecorder::spawn(app.store.clone(), notice_tx);
    let conn = Self { app, game, recorder, profile: None, timers: timer_tx };
    (conn, Channels { timers, notices, views })
  }

  fn state_message(&self, s: &GameState) -> ServerWsMessage {
    ServerWsMessage::State { game: to_view(s, &self.app.config) }
  }

  /// Dispatches and arms the returned timer, if any.
  fn apply(&mut self, event: GameEvent) -> Vec<ServerWsMessage> {
    match self.game.dispatch(event) {
      Ok(out) => {
        if let Some(t) = out.timer {
          let tx = self.timers.clone();
          tokio::spawn(async move {
            tokio::time::sleep(t.delay).await;
            let _ = tx.send(t.token);
          });
        }
        vec![]
      }
      Err(e) => vec![ServerWsMessage::Error { message: e.to_string() }],
    }
  }

  fn on_timer(&mut self, token: TimerToken) {
    self.apply(GameEvent::TimerFired(token));
  }

  fn on_notice(&mut self, notice: Notice) -> Vec<ServerWsMessage> {
    match notice {
      Notice::SessionStarted { session_id } => vec![ServerWsMessage::SessionStarted { session_id }],
      Notice::SessionEnded { session_id, profile } => {
        if self.profile.as_ref().map(|p| p.id == profile.id).unwrap_or(false) {
          self.profile = Some(profile.clone());
        }
        vec![ServerWsMessage::SessionEnded { session_id }, ServerWsMessage::Profile { profile }]
      }
      Notice::Failed { message } => vec![ServerWsMessage::Error { message }],
    }
  }

  fn profile_loaded(&mut self, profile: PlayerProfile) -> Vec<ServerWsMessage> {
    info!(target: "numberninja", id = %profile.id, name = %profile.name, "Profile loaded");
    self.profile = Some(profile.clone());
    vec![ServerWsMessage::Profile { profile }]
  }

  fn end_open_session(&self) {
    if self.game.state().game_started && self.profile.is_some() {
      self.recorder.end(self.game.session_stats());
    }
  }

  async fn handle_client(&mut self, msg: ClientWsMessage) -> Vec<ServerWsMessage> {
    let store = self.app.store.clone();
    match msg {
      ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

      ClientWsMessage::CreateProfile { name, preferences } => {
        if name.trim().is_empty() {
          return vec![ServerWsMessage::Error { message: "Name must not be empty".into() }];
        }
        let created = match store.create_profile(&name, preferences.unwrap_or_default()).await {
          Ok(id) => store.get_profile(&id).await,
          Err(e) => Err(e),
        };
        match created {
          Ok(profile) => self.profile_loaded(profile),
          Err(e) => vec![ServerWsMessage::Error { message: e.to_string() }],
        }
      }

      ClientWsMessage::LoadProfile { id } => match store.get_profile(&id).await {
        Ok(profile) => self.profile_loaded(profile),
        Err(e) => vec![ServerWsMessage::Error { message: e.to_string() }],
      },

      ClientWsMessage::LoadProfileByName { name } => match store.get_profile_by_name(&name).await {
        Ok(profile) => self.profile_loaded(profile),
        Err(e) => vec![ServerWsMessage::Error { message: e.to_string() }],
      },

      ClientWsMessage::UpdatePreferences { patch } => {
        let Some(id) = self.profile.as_ref().map(|p| p.id.clone()) else {
          return vec![ServerWsMessage::Error { message: "No player loaded".into() }];
        };
        let updated = match store.update_preferences(&id, patch).await {
          Ok(()) => store.get_profile(&id).await,
          Err(e) => Err(e),
        };
        match updated {
          Ok(profile) => self.profile_loaded(profile),
          Err(e) => vec![ServerWsMessage::Error { message: e.to_string() }],
        }
      }

      ClientWsMessage::Start => {
        let was_started = self.game.state().game_started;
        let out = self.apply(GameEvent::Start);
        if !was_started {
          if let Some(p) = &self.profile {
            self.recorder.start(p.id.clone(), self.game.state().level.id);
          }
        }
        out
      }

      ClientWsMessage::Input { text } => self.apply(GameEvent::Input(text)),
      ClientWsMessage::Submit => self.apply(GameEvent::Submit),
      ClientWsMessage::ChangeLevel { level_id } => self.apply(GameEvent::ChangeLevel(level_id)),
      ClientWsMessage::ToggleLevelSelector => self.apply(GameEvent::ToggleLevelSelector),

      ClientWsMessage::Reset => {
        self.end_open_session();
        self.apply(GameEvent::Reset)
      }

      ClientWsMessage::RequestWithdrawal => {
        let Some(id) = self.profile.as_ref().map(|p| p.id.clone()) else {
          return vec![ServerWsMessage::Error { message: "No player loaded".into() }];
        };
        match request_withdrawal(store.as_ref(), &self.app.config.rewards, &id).await {
          Ok(request) => {
            let mut out = vec![ServerWsMessage::Withdrawal { request }];
            match store.get_profile(&id).await {
              Ok(profile) => out.extend(self.profile_loaded(profile)),
              Err(e) => warn!(target: "numberninja", %id, error = %e, "Profile refresh after withdrawal failed"),
            }
            out
          }
          Err(e) => vec![ServerWsMessage::Error { message: e.to_string() }],
        }
      }
    }
  }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "numberninja", "WebSocket connected");
  let (mut conn, mut ch) = Connection::new(state);

  let initial = conn.state_message(conn.game.state());
  if send(&mut socket, &initial).await.is_err() {
    return;
  }

  'conn: loop {
    let replies = tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(msg) => {
            debug!(target: "numberninja", ?msg, "WS received");
            conn.handle_client(msg).await
          }
          Err(e) => {
            warn!(target: "numberninja", error = %e, payload = %trunc_for_log(&txt, 200), "Invalid WS message");
            vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }]
          }
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None => break,
        Some(Err(e)) => {
          warn!(target: "numberninja", error = %e, "WS receive error");
          break;
        }
        Some(Ok(_)) => continue,
      },
      Some(token) = ch.timers.recv() => {
        conn.on_timer(token);
        continue;
      }
      Ok(()) = ch.views.changed() => {
        let view = conn.state_message(&ch.views.borrow_and_update());
        vec![view]
      }
      Some(notice) = ch.notices.recv() => conn.on_notice(notice),
    };

    for msg in &replies {
      if let Err(e) = send(&mut socket, msg).await {
        error!(target: "numberninja", error = %e, "WS send error");
        break 'conn;
      }
    }
  }

  conn.end_open_session();
  info!(target: "numberninja", "WebSocket disconnected");
}
