//! In-memory backend. Used when no STORE_PATH is configured, and in tests.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{Documents, PlayerStore, StoreError};
use crate::domain::{
  PlayerProfile, Preferences, PreferencesPatch, ProgressPatch, SessionRecord, SessionStats, WithdrawalRequest,
};

#[derive(Default)]
pub struct MemoryStore {
  docs: RwLock<Documents>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl PlayerStore for MemoryStore {
  #[instrument(level = "debug", target = "store", skip(self, preferences))]
  async fn create_profile(&self, name: &str, preferences: Preferences) -> Result<String, StoreError> {
    let id = self.docs.write().await.create_profile(name, preferences)?;
    debug!(target: "store", %id, "profile created");
    Ok(id)
  }

  async fn get_profile(&self, id: &str) -> Result<PlayerProfile, StoreError> {
    self.docs.read().await.profile(id)
  }

  async fn get_profile_by_name(&self, name: &str) -> Result<PlayerProfile, StoreError> {
    self.docs.read().await.profile_by_name(name)
  }

  async fn update_progress(&self, id: &str, patch: ProgressPatch) -> Result<(), StoreError> {
    self.docs.write().await.update_progress(id, &patch)
  }

  async fn update_preferences(&self, id: &str, patch: PreferencesPatch) -> Result<(), StoreError> {
    self.docs.write().await.update_preferences(id, patch)
  }

  async fn start_session(&self, profile_id: &str, level_id: u32) -> Result<String, StoreError> {
    self.docs.write().await.start_session(profile_id, level_id)
  }

  async fn end_session(&self, session_id: &str, stats: SessionStats) -> Result<(), StoreError> {
    self.docs.write().await.end_session(session_id, stats)
  }

  #[instrument(level = "debug", target = "store", skip(self, stats))]
  async fn close_session(&self, session_id: &str, stats: SessionStats) -> Result<PlayerProfile, StoreError> {
    self.docs.write().await.close_session(session_id, stats)
  }

  async fn list_sessions(&self, profile_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
    Ok(self.docs.read().await.list_sessions(profile_id, limit))
  }

  async fn withdraw_balance(&self, profile_id: &str, minimum: u64) -> Result<WithdrawalRequest, StoreError> {
    self.docs.write().await.withdraw_balance(profile_id, minimum)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn profile_round_trip_and_progress_patch() {
    let store = MemoryStore::new();
    let id = store.create_profile("Mia", Preferences::default()).await.unwrap();
    assert_eq!(store.get_profile_by_name("Mia").await.unwrap().id, id);

    store
      .update_progress(&id, ProgressPatch { correct_answers: Some(9), ..Default::default() })
      .await
      .unwrap();
    let p = store.get_profile(&id).await.unwrap();
    assert_eq!(p.progress.correct_answers, 9);
    assert_eq!(p.progress.total_problems, 0);

    assert!(matches!(store.get_profile("missing").await, Err(StoreError::ProfileNotFound(_))));
  }

  #[tokio::test]
  async fn withdrawal_is_recorded_as_pending() {
    let store = MemoryStore::new();
    let id = store.create_profile("Sam", Preferences::default()).await.unwrap();
    let sid = store.start_session(&id, 1).await.unwrap();
    let profile = store
      .close_session(&sid, SessionStats { currency_earned: 50, ..Default::default() })
      .await
      .unwrap();
    assert_eq!(profile.progress.total_coins, 50);

    let req = store.withdraw_balance(&id, 50).await.unwrap();
    assert_eq!(req.amount, 50);
    assert_eq!(req.status, crate::domain::WithdrawalStatus::Pending);
    assert_eq!(store.get_profile(&id).await.unwrap().progress.total_withdrawn, 50);
  }
}
