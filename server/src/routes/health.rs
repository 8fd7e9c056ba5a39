//! `/health` and `/health/db`, carried over verbatim from the teacher's
//! old `server/src/main.rs` (liveness + store readiness probes).

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use tracing::instrument;

#[instrument(name = "health")]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
struct DbStatus {
    db: &'static str,
}

#[instrument(name = "health_db", skip(state))]
pub async fn health_db(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, axum::Json(DbStatus { db: "ok" })),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, axum::Json(DbStatus { db: "down" })),
    }
}
