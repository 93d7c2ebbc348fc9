//! NumberNinja · arithmetic practice game backend
//!
//! - Axum HTTP + WebSocket API
//! - One game state machine per WebSocket connection
//! - Player profiles and session records in a pluggable store
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   GAME_CONFIG_PATH  : TOML file with levels / game delays / rewards
//!   GAME_PRESET       : beginner | intermediate | advanced | challenge
//!   STORE_PATH        : JSON file for player/session documents (default: in-memory)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod config;
mod domain;
mod feedback;
mod game;
mod levels;
mod problem;
mod protocol;
mod routes;
mod scoring;
mod session;
mod state;
mod store;
mod telemetry;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let state = Arc::new(AppState::from_env().await);
    let app = build_router(state);

    let addr: SocketAddr = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

    let listener = TcpListener::bind(addr).await?;
    info!(target: "numberninja", %addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "numberninja", "Shutdown signal received");
        })
        .await?;
    Ok(())
}
