//! Session layer between the game core and the player store.
//!
//! Gameplay never waits on persistence: each connection owns a
//! `SessionRecorder`, a background task that applies start/end commands in
//! order and reports failures back as user-visible `Notice`s.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::config::RewardSettings;
use crate::domain::{PlayerProfile, SessionStats, WithdrawalRequest};
use crate::store::{PlayerStore, StoreError};
use crate::util::{accuracy_percent, format_minutes};

#[derive(Debug)]
enum Command {
  Start { profile_id: String, level_id: u32 },
  End { stats: SessionStats },
}

/// Outcome reports from the recorder task.
#[derive(Debug, Clone)]
pub enum Notice {
  SessionStarted { session_id: String },
  SessionEnded { session_id: String, profile: PlayerProfile },
  Failed { message: String },
}

pub struct SessionRecorder {
  tx: mpsc::UnboundedSender<Command>,
}

impl SessionRecorder {
  pub fn spawn(store: Arc<dyn PlayerStore>, notices: mpsc::UnboundedSender<Notice>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_recorder(store, rx, notices));
    Self { tx }
  }

  pub fn start(&self, profile_id: String, level_id: u32) {
    let _ = self.tx.send(Command::Start { profile_id, level_id });
  }

  pub fn end(&self, stats: SessionStats) {
    let _ = self.tx.send(Command::End { stats });
  }
}

async fn run_recorder(
  store: Arc<dyn PlayerStore>,
  mut rx: mpsc::UnboundedReceiver<Command>,
  notices: mpsc::UnboundedSender<Notice>,
) {
  let mut open: Option<String> = None;

  while let Some(cmd) = rx.recv().await {
    match cmd {
      Command::Start { profile_id, level_id } => {
        if let Some(sid) = &open {
          warn!(target: "store", session_id = %sid, "start while a session is open; keeping the open one");
          continue;
        }
        match store.start_session(&profile_id, level_id).await {
          Ok(session_id) => {
            info!(target: "store", %session_id, %profile_id, level_id, "session started");
            let _ = notices.send(Notice::SessionStarted { session_id: session_id.clone() });
            open = Some(session_id);
          }
          Err(e) => {
            error!(target: "store", %profile_id, error = %e, "start_session failed");
            let _ = notices.send(Notice::Failed { message: format!("Could not start session: {e}") });
          }
        }
      }
      Command::End { stats } => {
        let Some(session_id) = open.take() else {
          continue;
        };
        match finish_session(store.as_ref(), &session_id, stats).await {
          Ok(profile) => {
            let _ = notices.send(Notice::SessionEnded { session_id, profile });
          }
          Err(e) => {
            error!(target: "store", %session_id, error = %e, "end_session failed");
            let _ = notices.send(Notice::Failed { message: format!("Could not save session: {e}") });
          }
        }
      }
    }
  }
}

/// Finalizes the session record and folds its stats into the owner's
/// lifetime progress. Returns the refreshed profile.
#[instrument(level = "info", target = "store", skip(store, stats))]
pub async fn finish_session(
  store: &dyn PlayerStore,
  session_id: &str,
  stats: SessionStats,
) -> Result<PlayerProfile, StoreError> {
  let profile = store.close_session(session_id, stats.clone()).await?;
  info!(
    target: "store", %session_id, problems = stats.problems_attempted, score = stats.total_score,
    played = %format_minutes(stats.time_spent_secs), "session finalized"
  );
  Ok(profile)
}

/// Requests the player's whole withdrawable balance. Only recorded, never paid.
#[instrument(level = "info", target = "store", skip(store, rewards))]
pub async fn request_withdrawal(
  store: &dyn PlayerStore,
  rewards: &RewardSettings,
  profile_id: &str,
) -> Result<WithdrawalRequest, StoreError> {
  let req = store.withdraw_balance(profile_id, rewards.minimum_withdrawal).await?;
  info!(target: "store", %profile_id, amount = req.amount, id = %req.id, "withdrawal recorded");
  Ok(req)
}

/// Aggregate over a player's completed sessions.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlayerStats {
  pub total_sessions: u64,
  pub total_time_spent_secs: u64,
  pub total_problems_attempted: u64,
  pub total_correct_answers: u64,
  pub average_accuracy: f64,
  pub average_session_secs: u64,
  pub favorite_level: u32,
}

pub async fn player_stats(store: &dyn PlayerStore, profile_id: &str) -> Result<PlayerStats, StoreError> {
  store.get_profile(profile_id).await?;
  let sessions = store.list_sessions(profile_id, usize::MAX).await?;
  let done: Vec<_> = sessions.iter().filter(|s| s.end_time.is_some()).collect();

  let total_sessions = done.len() as u64;
  let total_time_spent_secs: u64 = done.iter().map(|s| s.stats.time_spent_secs).sum();
  let total_problems_attempted: u64 = done.iter().map(|s| s.stats.problems_attempted).sum();
  let total_correct_answers: u64 = done.iter().map(|s| s.stats.correct_answers).sum();

  let mut per_level: HashMap<u32, u64> = HashMap::new();
  for s in &done {
    *per_level.entry(s.level_id).or_default() += 1;
  }
  // ties go to the lower level id
  let favorite_level = per_level
    .into_iter()
    .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
    .map(|(level, _)| level)
    .unwrap_or(1);

  Ok(PlayerStats {
    total_sessions,
    total_time_spent_secs,
    total_problems_attempted,
    total_correct_answers,
    average_accuracy: accuracy_percent(total_correct_answers, total_problems_attempted),
    average_session_secs: if total_sessions == 0 { 0 } else { total_time_spent_secs / total_sessions },
    favorite_level,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use crate::domain::{Preferences, PreferencesPatch, ProgressPatch, SessionRecord};
  use crate::store::MemoryStore;

  /// Suspends once before every call, the way a networked store would.
  #[derive(Default)]
  struct SlowStore(MemoryStore);

  #[async_trait]
  impl PlayerStore for SlowStore {
    async fn create_profile(&self, name: &str, preferences: Preferences) -> Result<String, StoreError> {
      tokio::task::yield_now().await;
      self.0.create_profile(name, preferences).await
    }
    async fn get_profile(&self, id: &str) -> Result<PlayerProfile, StoreError> {
      tokio::task::yield_now().await;
      self.0.get_profile(id).await
    }
    async fn get_profile_by_name(&self, name: &str) -> Result<PlayerProfile, StoreError> {
      tokio::task::yield_now().await;
      self.0.get_profile_by_name(name).await
    }
    async fn update_progress(&self, id: &str, patch: ProgressPatch) -> Result<(), StoreError> {
      tokio::task::yield_now().await;
      self.0.update_progress(id, patch).await
    }
    async fn update_preferences(&self, id: &str, patch: PreferencesPatch) -> Result<(), StoreError> {
      tokio::task::yield_now().await;
      self.0.update_preferences(id, patch).await
    }
    async fn start_session(&self, profile_id: &str, level_id: u32) -> Result<String, StoreError> {
      tokio::task::yield_now().await;
      self.0.start_session(profile_id, level_id).await
    }
    async fn end_session(&self, session_id: &str, stats: SessionStats) -> Result<(), StoreError> {
      tokio::task::yield_now().await;
      self.0.end_session(session_id, stats).await
    }
    async fn close_session(&self, session_id: &str, stats: SessionStats) -> Result<PlayerProfile, StoreError> {
      tokio::task::yield_now().await;
      self.0.close_session(session_id, stats).await
    }
    async fn list_sessions(&self, profile_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
      tokio::task::yield_now().await;
      self.0.list_sessions(profile_id, limit).await
    }
    async fn withdraw_balance(&self, profile_id: &str, minimum: u64) -> Result<WithdrawalRequest, StoreError> {
      tokio::task::yield_now().await;
      self.0.withdraw_balance(profile_id, minimum).await
    }
  }

  fn stats(attempted: u64, correct: u64, coins: u64, secs: u64) -> SessionStats {
    SessionStats {
      problems_attempted: attempted,
      correct_answers: correct,
      wrong_answers: attempted - correct,
      best_streak: correct as u32,
      total_score: coins * 10,
      currency_earned: coins,
      time_spent_secs: secs,
      average_response_ms: 900,
    }
  }

  #[tokio::test]
  async fn recorder_starts_and_ends_in_order() {
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new());
    let pid = store.create_profile("Ivy", Preferences::default()).await.unwrap();
    let (ntx, mut nrx) = mpsc::unbounded_channel();
    let recorder = SessionRecorder::spawn(store.clone(), ntx);

    recorder.start(pid.clone(), 2);
    recorder.end(stats(6, 5, 3, 120));

    let Some(Notice::SessionStarted { session_id }) = nrx.recv().await else { panic!("expected start") };
    let Some(Notice::SessionEnded { session_id: ended, profile }) = nrx.recv().await else { panic!("expected end") };
    assert_eq!(session_id, ended);
    assert_eq!(profile.progress.total_problems, 6);
    assert_eq!(profile.progress.correct_answers, 5);
    assert_eq!(profile.progress.total_coins, 3);
    assert_eq!(profile.progress.best_streak, 5);

    let sessions = store.list_sessions(&pid, 10).await.unwrap();
    assert!(sessions[0].end_time.is_some());
  }

  #[tokio::test]
  async fn recorder_reports_failures_without_panicking() {
    let store: Arc<dyn PlayerStore> = Arc::new(MemoryStore::new());
    let (ntx, mut nrx) = mpsc::unbounded_channel();
    let recorder = SessionRecorder::spawn(store, ntx);

    recorder.start("ghost".into(), 1);
    recorder.end(SessionStats::default());
    match nrx.recv().await {
      Some(Notice::Failed { message }) => assert!(message.contains("ghost")),
      other => panic!("unexpected notice {other:?}"),
    }
  }

  #[tokio::test]
  async fn progress_accumulates_across_sessions() {
    let store = MemoryStore::new();
    let pid = store.create_profile("Noa", Preferences::default()).await.unwrap();
    for s in [stats(4, 4, 2, 60), stats(10, 6, 5, 240)] {
      let sid = store.start_session(&pid, 1).await.unwrap();
      finish_session(&store, &sid, s).await.unwrap();
    }
    let p = store.get_profile(&pid).await.unwrap().progress;
    assert_eq!((p.total_problems, p.correct_answers, p.wrong_answers), (14, 10, 4));
    assert_eq!(p.total_coins, 7);
    assert_eq!(p.time_spent_secs, 300);
    assert_eq!(p.best_streak, 6);
  }

  #[tokio::test]
  async fn stats_aggregate_completed_sessions_only() {
    let store = MemoryStore::new();
    let pid = store.create_profile("Eli", Preferences::default()).await.unwrap();
    for (level, s) in [(2, stats(10, 8, 1, 100)), (2, stats(10, 6, 1, 200)), (1, stats(5, 5, 1, 60))] {
      let sid = store.start_session(&pid, level).await.unwrap();
      store.end_session(&sid, s).await.unwrap();
    }
    store.start_session(&pid, 3).await.unwrap();

    let st = player_stats(&store, &pid).await.unwrap();
    assert_eq!(st.total_sessions, 3);
    assert_eq!(st.total_problems_attempted, 25);
    assert_eq!(st.total_correct_answers, 19);
    assert_eq!(st.average_accuracy, 76.0);
    assert_eq!(st.total_time_spent_secs, 360);
    assert_eq!(st.average_session_secs, 120);
    assert_eq!(st.favorite_level, 2);
  }

  #[tokio::test]
  async fn stats_for_new_player_default_to_level_one() {
    let store = MemoryStore::new();
    let pid = store.create_profile("Zoe", Preferences::default()).await.unwrap();
    let st = player_stats(&store, &pid).await.unwrap();
    assert_eq!(st.total_sessions, 0);
    assert_eq!(st.average_accuracy, 0.0);
    assert_eq!(st.favorite_level, 1);
  }

  #[tokio::test]
  async fn withdrawal_needs_minimum_balance() {
    let store = MemoryStore::new();
    let rewards = RewardSettings::default();
    let pid = store.create_profile("Max", Preferences::default()).await.unwrap();
    let sid = store.start_session(&pid, 1).await.unwrap();
    finish_session(&store, &sid, stats(40, 40, 45, 600)).await.unwrap();

    assert!(matches!(
      request_withdrawal(&store, &rewards, &pid).await,
      Err(StoreError::BelowMinimum { balance: 45, minimum: 50 })
    ));

    let sid = store.start_session(&pid, 1).await.unwrap();
    finish_session(&store, &sid, stats(10, 10, 10, 60)).await.unwrap();
    let req = request_withdrawal(&store, &rewards, &pid).await.unwrap();
    assert_eq!(req.amount, 55);
    let p = store.get_profile(&pid).await.unwrap();
    assert_eq!(p.progress.withdrawable_balance(), 0);
  }

  #[tokio::test]
  async fn overlapping_sessions_both_count() {
    let store = SlowStore::default();
    let pid = store.create_profile("Tess", Preferences::default()).await.unwrap();
    let a = store.start_session(&pid, 1).await.unwrap();
    let b = store.start_session(&pid, 1).await.unwrap();

    let (ra, rb) = tokio::join!(
      finish_session(&store, &a, stats(5, 5, 3, 60)),
      finish_session(&store, &b, stats(5, 5, 3, 60)),
    );
    ra.unwrap();
    rb.unwrap();

    let p = store.get_profile(&pid).await.unwrap().progress;
    assert_eq!(p.total_problems, 10);
    assert_eq!(p.total_coins, 6);
  }

  #[tokio::test]
  async fn overlapping_withdrawals_pay_out_once() {
    let store = SlowStore::default();
    let rewards = RewardSettings::default();
    let pid = store.create_profile("Rui", Preferences::default()).await.unwrap();
    let sid = store.start_session(&pid, 1).await.unwrap();
    finish_session(&store, &sid, stats(60, 60, 60, 600)).await.unwrap();

    let (ra, rb) = tokio::join!(
      request_withdrawal(&store, &rewards, &pid),
      request_withdrawal(&store, &rewards, &pid),
    );
    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let p = store.get_profile(&pid).await.unwrap().progress;
    assert_eq!(p.total_coins, 60);
    assert_eq!(p.total_withdrawn, 60);
  }
}
