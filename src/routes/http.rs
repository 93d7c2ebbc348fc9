//! HTTP endpoint handlers: config, level lookup, and player/session documents.
//! Thin wrappers over the store and session layer.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::PreferencesPatch;
use crate::levels::available_levels;
use crate::protocol::*;
use crate::session::{player_stats, request_withdrawal};
use crate::state::AppState;
use crate::store::StoreError;

const DEFAULT_SESSION_LIMIT: usize = 10;

#[derive(Debug)]
pub enum ApiError {
  BadRequest(String),
  Store(StoreError),
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self { ApiError::Store(e) }
}

fn store_status(e: &StoreError) -> StatusCode {
  match e {
    StoreError::DuplicateName(_) | StoreError::SessionClosed(_) => StatusCode::CONFLICT,
    StoreError::ProfileNotFound(_) | StoreError::SessionNotFound(_) => StatusCode::NOT_FOUND,
    StoreError::BelowMinimum { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    StoreError::Io(_) | StoreError::Serde(_) => StatusCode::SERVICE_UNAVAILABLE,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
      ApiError::Store(e) => (store_status(&e), e.to_string()),
    };
    if status.is_server_error() {
      warn!(target: "numberninja", %status, error = %message, "HTTP request failed");
    }
    (status, Json(ErrorOut { error: message })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.config.as_ref().clone())
}

#[instrument(level = "info", skip(state), fields(score = q.score))]
pub async fn http_get_available_levels(
  State(state): State<Arc<AppState>>,
  Query(q): Query<AvailableQuery>,
) -> impl IntoResponse {
  Json(available_levels(q.score, &state.config.levels))
}

#[instrument(level = "info", skip(state, body), fields(name = %body.name))]
pub async fn http_create_player(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateProfileIn>,
) -> Result<impl IntoResponse, ApiError> {
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  let id = state.store.create_profile(&body.name, body.preferences.unwrap_or_default()).await?;
  info!(target: "numberninja", %id, "HTTP player created");
  Ok((StatusCode::CREATED, Json(CreatedOut { id })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_player(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(state.store.get_profile(&id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_player_by_name(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ByNameQuery>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(state.store.get_profile_by_name(&q.name).await?))
}

#[instrument(level = "info", skip(state, patch))]
pub async fn http_patch_preferences(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(patch): Json<PreferencesPatch>,
) -> Result<impl IntoResponse, ApiError> {
  state.store.update_preferences(&id, patch).await?;
  Ok(Json(state.store.get_profile(&id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_sessions(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(q): Query<SessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
  state.store.get_profile(&id).await?;
  let limit = q.limit.unwrap_or(DEFAULT_SESSION_LIMIT);
  Ok(Json(state.store.list_sessions(&id, limit).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(player_stats(state.store.as_ref(), &id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_withdrawal(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let req = request_withdrawal(state.store.as_ref(), &state.config.rewards, &id).await?;
  Ok((StatusCode::CREATED, Json(req)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::{to_bytes, Body};
  use axum::http::Request;
  use serde_json::Value;
  use tower::ServiceExt;

  use crate::config::GameConfig;
  use crate::domain::SessionStats;
  use crate::routes::build_router;
  use crate::session::finish_session;
  use crate::store::MemoryStore;

  fn app_state() -> Arc<AppState> {
    Arc::new(AppState::new(GameConfig::default(), Arc::new(MemoryStore::new())))
  }

  async fn call(state: &Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        req = req.header("content-type", "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = build_router(state.clone()).oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  #[tokio::test]
  async fn health_and_config() {
    let state = app_state();
    let (status, body) = call(&state, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, body) = call(&state, "GET", "/api/v1/config", None).await;
    assert_eq!(body["levels"].as_array().map(|l| l.len()), Some(6));
    assert_eq!(body["rewards"]["minimum_withdrawal"], 50);

    let (_, body) = call(&state, "GET", "/api/v1/levels/available?score=160", None).await;
    assert_eq!(body.as_array().map(|l| l.len()), Some(3));
  }

  #[tokio::test]
  async fn player_lifecycle() {
    let state = app_state();
    let (status, body) = call(&state, "POST", "/api/v1/players", Some(serde_json::json!({ "name": "Ana" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = call(&state, "POST", "/api/v1/players", Some(serde_json::json!({ "name": "Ana" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = call(&state, "POST", "/api/v1/players", Some(serde_json::json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&state, "GET", "/api/v1/players?name=Ana", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (status, body) = call(
      &state,
      "PATCH",
      &format!("/api/v1/players/{id}/preferences"),
      Some(serde_json::json!({ "theme": "space" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preferences"]["theme"], "space");

    let (status, _) = call(&state, "GET", "/api/v1/players/nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn sessions_stats_and_withdrawal() {
    let state = app_state();
    let id = state.store.create_profile("Leo", Default::default()).await.unwrap();

    let (status, _) = call(&state, "POST", &format!("/api/v1/players/{id}/withdrawals"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let sid = state.store.start_session(&id, 2).await.unwrap();
    let stats = SessionStats { problems_attempted: 4, correct_answers: 3, wrong_answers: 1, currency_earned: 60, ..Default::default() };
    finish_session(state.store.as_ref(), &sid, stats).await.unwrap();

    let (_, body) = call(&state, "GET", &format!("/api/v1/players/{id}/sessions?limit=5"), None).await;
    assert_eq!(body.as_array().map(|s| s.len()), Some(1));

    let (_, body) = call(&state, "GET", &format!("/api/v1/players/{id}/stats"), None).await;
    assert_eq!(body["total_sessions"], 1);
    assert_eq!(body["average_accuracy"], 75.0);
    assert_eq!(body["favorite_level"], 2);

    let (status, body) = call(&state, "POST", &format!("/api/v1/players/{id}/withdrawals"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["amount"], 60);
    assert_eq!(body["status"], "pending");

    let (status, body) = call(&state, "POST", &format!("/api/v1/players/{id}/withdrawals"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap_or_default().contains("below the minimum"));
  }
}
