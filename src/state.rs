//! Application state shared by every handler: the immutable game config and
//! the player store. Game sessions themselves live per WebSocket connection.

use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::config::{load_game_config_from_env, GameConfig};
use crate::store::{JsonFileStore, MemoryStore, PlayerStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GameConfig>,
    pub store: Arc<dyn PlayerStore>,
}

impl AppState {
    pub fn new(config: GameConfig, store: Arc<dyn PlayerStore>) -> Self {
        Self { config: Arc::new(config), store }
    }

    /// Build state from env: GAME_CONFIG_PATH / GAME_PRESET for the config,
    /// STORE_PATH for the JSON store. An unreadable store falls back to memory.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env() -> Self {
        let config = load_game_config_from_env();
        for l in &config.levels {
            info!(target: "game", id = l.id, name = %l.name, min = l.min_range, max = l.max_range, required = l.required_score, "Level loaded");
        }

        let store: Arc<dyn PlayerStore> = match std::env::var("STORE_PATH") {
            Ok(path) => match JsonFileStore::open(&path).await {
                Ok(s) => {
                    info!(target: "numberninja", %path, "Using JSON file store.");
                    Arc::new(s)
                }
                Err(e) => {
                    error!(target: "numberninja", %path, error = %e, "Cannot open JSON store; using in-memory store");
                    Arc::new(MemoryStore::new())
                }
            },
            Err(_) => {
                info!(target: "numberninja", "STORE_PATH not set. Using in-memory store.");
                Arc::new(MemoryStore::new())
            }
        };

        Self::new(config, store)
    }
}
