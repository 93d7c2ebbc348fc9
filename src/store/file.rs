//! JSON-file backend: the full document set is loaded at open and rewritten
//! after every successful mutation (write to a sibling temp file, then rename).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{error, info, instrument};

use super::{Documents, PlayerStore, StoreError};
use crate::domain::{
  PlayerProfile, Preferences, PreferencesPatch, ProgressPatch, SessionRecord, SessionStats, WithdrawalRequest,
};

pub struct JsonFileStore {
  path: PathBuf,
  docs: RwLock<Documents>,
}

impl JsonFileStore {
  /// Opens `path`, starting empty when the file does not exist yet.
  #[instrument(level = "info", target = "store", skip_all, fields(path = %path.as_ref().display()))]
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let path = path.as_ref().to_path_buf();
    let docs = match tokio::fs::read(&path).await {
      Ok(bytes) => serde_json::from_slice::<Documents>(&bytes)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::default(),
      Err(e) => return Err(e.into()),
    };
    info!(target: "store", players = docs.players.len(), sessions = docs.sessions.len(), "Opened JSON store");
    Ok(Self { path, docs: RwLock::new(docs) })
  }

  async fn flush(&self, docs: &Documents) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(docs)?;
    let tmp = self.path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
      error!(target: "store", path = %self.path.display(), error = %e, "Failed to persist store");
      StoreError::from(e)
    })
  }

  /// Applies `f` to a copy under the write lock. The copy replaces the live
  /// documents only once it is on disk.
  async fn mutate<T>(&self, f: impl FnOnce(&mut Documents) -> Result<T, StoreError>) -> Result<T, StoreError> {
    let mut docs = self.docs.write().await;
    let mut next = docs.clone();
    let out = f(&mut next)?;
    self.flush(&next).await?;
    *docs = next;
    Ok(out)
  }
}

#[async_trait]
impl PlayerStore for JsonFileStore {
  async fn create_profile(&self, name: &str, preferences: Preferences) -> Result<String, StoreError> {
    self.mutate(|d| d.create_profile(name, preferences)).await
  }

  async fn get_profile(&self, id: &str) -> Result<PlayerProfile, StoreError> {
    self.docs.read().await.profile(id)
  }

  async fn get_profile_by_name(&self, name: &str) -> Result<PlayerProfile, StoreError> {
    self.docs.read().await.profile_by_name(name)
  }

  async fn update_progress(&self, id: &str, patch: ProgressPatch) -> Result<(), StoreError> {
    self.mutate(|d| d.update_progress(id, &patch)).await
  }

  async fn update_preferences(&self, id: &str, patch: PreferencesPatch) -> Result<(), StoreError> {
    self.mutate(|d| d.update_preferences(id, patch)).await
  }

  async fn start_session(&self, profile_id: &str, level_id: u32) -> Result<String, StoreError> {
    self.mutate(|d| d.start_session(profile_id, level_id)).await
  }

  async fn end_session(&self, session_id: &str, stats: SessionStats) -> Result<(), StoreError> {
    self.mutate(|d| d.end_session(session_id, stats)).await
  }

  async fn close_session(&self, session_id: &str, stats: SessionStats) -> Result<PlayerProfile, StoreError> {
    self.mutate(|d| d.close_session(session_id, stats)).await
  }

  async fn list_sessions(&self, profile_id: &str, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
    Ok(self.docs.read().await.list_sessions(profile_id, limit))
  }

  async fn withdraw_balance(&self, profile_id: &str, minimum: u64) -> Result<WithdrawalRequest, StoreError> {
    self.mutate(|d| d.withdraw_balance(profile_id, minimum)).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn survives_reopen() {
    let path = std::env::temp_dir().join(format!("numberninja-store-{}.json", uuid::Uuid::new_v4()));
    let id = {
      let store = JsonFileStore::open(&path).await.unwrap();
      let id = store.create_profile("Kai", Preferences::default()).await.unwrap();
      let sid = store.start_session(&id, 1).await.unwrap();
      store
        .end_session(&sid, SessionStats { total_score: 30, ..Default::default() })
        .await
        .unwrap();
      id
    };

    let reopened = JsonFileStore::open(&path).await.unwrap();
    assert_eq!(reopened.get_profile(&id).await.unwrap().name, "Kai");
    let sessions = reopened.list_sessions(&id, 5).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].stats.total_score, 30);
    let _ = std::fs::remove_file(&path);
  }

  #[tokio::test]
  async fn failed_flush_leaves_documents_unchanged() {
    let dir = std::env::temp_dir().join(format!("numberninja-missing-{}", uuid::Uuid::new_v4()));
    let store = JsonFileStore::open(dir.join("store.json")).await.unwrap();

    for _ in 0..2 {
      assert!(matches!(
        store.create_profile("Kai", Preferences::default()).await,
        Err(StoreError::Io(_))
      ));
    }
    assert!(matches!(store.get_profile_by_name("Kai").await, Err(StoreError::ProfileNotFound(_))));
  }
}
