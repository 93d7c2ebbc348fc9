//! Player/session persistence.
//!
//! `PlayerStore` is the document-store contract the session layer talks to.
//! Two backends implement it over the same `Documents` model:
//!   - `MemoryStore`: process-local maps, lost on restart
//!   - `JsonFileStore`: the same maps flushed to a JSON file after every write
//!
//! Callers never branch on which backend is active.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
  PlayerProfile, PlayerProgress, Preferences, PreferencesPatch, ProgressPatch, SessionRecord,
  SessionStats, WithdrawalRequest, WithdrawalStatus,
};
use crate::scoring::can_withdraw;

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("a player named '{0}' already exists")]
  DuplicateName(String),
  #[error("player not found: {0}")]
  ProfileNotFound(String),
  #[error("session not found: {0}")]
  SessionNotFound(String),
  #[error("session {0} has already ended")]
  SessionClosed(String),
  #[error("balance {balance} is below the minimum withdrawal of {minimum}")]
  BelowMinimum { balance: u64, minimum: u64 },
  #[error("storage I/O failed: {0}")]
  Io(#[from] std::io::Error),
  #[error("storage encoding failed: {0}")]
  Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait PlayerStore: Send + Sync {
  async fn create_profile(&self, name: &str, preferences: Preferences) -> Result<String, StoreError>;
  async fn get_profile(&self, id: &str) -> Result<PlayerProfile, StoreError>;
  async fn get_profile_by_name(&self, name: &str) -> Result<PlayerProfile, StoreError>;
  async fn update_progress(&self, id: &str, patch: ProgressPatch) -> Result<(), StoreError>;
  async fn update_preferences(&self, id: &str, patch: PreferencesPatch) -> Result<(), StoreError>;
  async fn start_session(&self, profile_id: &str, level_id: u32) -> Result<String, StoreError>;
  async fn end_session(&self, session_id: &str, stats: SessionStats) -> Result<(), StoreError>;
  /// Ends the session and adds its stats to the owner's lifetime progress in
  /// one write. Returns the updated profile.
  async fn close_session(&self, session_id: &str, stats: SessionStats) -> Result<PlayerProfile, StoreError>;
  /// Newest first.
  async fn list_sessions(&self, profile_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError>;
  /// Withdraws the whole balance when it reaches `minimum`, checked and
  /// recorded in one write.
  async fn withdraw_balance(&self, profile_id: &str, minimum: u64) -> Result<WithdrawalRequest, StoreError>;
}

/// The whole persisted document set. Backends wrap this in a lock.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Documents {
  #[serde(default)] pub players: HashMap<String, PlayerProfile>,
  #[serde(default)] pub sessions: HashMap<String, SessionRecord>,
  #[serde(default)] pub withdrawals: Vec<WithdrawalRequest>,
}

impl Documents {
  pub fn create_profile(&mut self, name: &str, preferences: Preferences) -> Result<String, StoreError> {
    let name = name.trim();
    if self.players.values().any(|p| p.name == name) {
      return Err(StoreError::DuplicateName(name.to_string()));
    }
    let now = Utc::now();
    let id = format!("player_{}", Uuid::new_v4().simple());
    self.players.insert(
      id.clone(),
      PlayerProfile {
        id: id.clone(),
        name: name.to_string(),
        preferences,
        progress: PlayerProgress::default(),
        created_at: now,
        last_login_at: now,
      },
    );
    Ok(id)
  }

  pub fn profile(&self, id: &str) -> Result<PlayerProfile, StoreError> {
    self.players.get(id).cloned().ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))
  }

  pub fn profile_by_name(&self, name: &str) -> Result<PlayerProfile, StoreError> {
    self.players
      .values()
      .find(|p| p.name == name.trim())
      .cloned()
      .ok_or_else(|| StoreError::ProfileNotFound(name.to_string()))
  }

  fn profile_mut(&mut self, id: &str) -> Result<&mut PlayerProfile, StoreError> {
    self.players.get_mut(id).ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))
  }

  pub fn update_progress(&mut self, id: &str, patch: &ProgressPatch) -> Result<(), StoreError> {
    let p = self.profile_mut(id)?;
    p.progress.apply(patch);
    p.last_login_at = Utc::now();
    Ok(())
  }

  pub fn update_preferences(&mut self, id: &str, patch: PreferencesPatch) -> Result<(), StoreError> {
    self.profile_mut(id)?.preferences.apply(patch);
    Ok(())
  }

  pub fn start_session(&mut self, profile_id: &str, level_id: u32) -> Result<String, StoreError> {
    self.profile_mut(profile_id)?;
    let id = format!("session_{}", Uuid::new_v4().simple());
    self.sessions.insert(
      id.clone(),
      SessionRecord {
        id: id.clone(),
        profile_id: profile_id.to_string(),
        level_id,
        start_time: Utc::now(),
        end_time: None,
        stats: SessionStats::default(),
      },
    );
    Ok(id)
  }

  pub fn end_session(&mut self, session_id: &str, stats: SessionStats) -> Result<(), StoreError> {
    let s = self
      .sessions
      .get_mut(session_id)
      .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
    if s.end_time.is_some() {
      return Err(StoreError::SessionClosed(session_id.to_string()));
    }
    s.stats = stats;
    s.end_time = Some(Utc::now());
    Ok(())
  }

  pub fn close_session(&mut self, session_id: &str, stats: SessionStats) -> Result<PlayerProfile, StoreError> {
    let owner = self
      .sessions
      .get(session_id)
      .map(|s| s.profile_id.clone())
      .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
    self.profile_mut(&owner)?;
    self.end_session(session_id, stats.clone())?;
    let p = self.profile_mut(&owner)?;
    let patch = p.progress.absorb(&stats);
    p.progress.apply(&patch);
    Ok(p.clone())
  }

  pub fn list_sessions(&self, profile_id: &str, limit: usize) -> Vec<SessionRecord> {
    let mut out: Vec<SessionRecord> =
      self.sessions.values().filter(|s| s.profile_id == profile_id).cloned().collect();
    out.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    out.truncate(limit);
    out
  }

  pub fn withdraw_balance(&mut self, profile_id: &str, minimum: u64) -> Result<WithdrawalRequest, StoreError> {
    let p = self.profile_mut(profile_id)?;
    let amount = p.progress.withdrawable_balance();
    if !can_withdraw(amount, minimum) {
      return Err(StoreError::BelowMinimum { balance: amount, minimum });
    }
    p.progress.total_withdrawn += amount;
    let req = WithdrawalRequest {
      id: format!("withdrawal_{}", Uuid::new_v4().simple()),
      profile_id: profile_id.to_string(),
      amount,
      status: WithdrawalStatus::Pending,
      requested_at: Utc::now(),
    };
    self.withdrawals.push(req.clone());
    Ok(req)
  }
}
